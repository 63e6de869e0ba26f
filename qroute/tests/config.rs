use std::time::Duration;

use qroute::config::{NeighbourConfig, RouteMapping, RouterConfig};
use qroute::feedback::ConfigError;
use qroute::framework::ProtocolParams;
use qroute::router::Router;

use crate::common::virtual_network::VirtualSystem;

mod common;

fn parse(json: &str) -> RouterConfig<VirtualSystem> {
    serde_json::from_str(json).unwrap()
}

fn neighbour(id: &str) -> NeighbourConfig<VirtualSystem> {
    NeighbourConfig {
        id: id.to_string(),
        ip: format!("phy-{id}"),
        port: None,
        interface: None,
        bandwidth: None,
        prefix: None,
    }
}

#[test]
fn minimal_config_uses_defaults() {
    let config = parse(r#"{"router_id": "A", "neighbors": [{"id": "B", "ip": "10.0.0.2"}]}"#);
    config.validate().unwrap();

    assert_eq!(config.listen_port, 55000);
    assert_eq!(config.protocol_params(), ProtocolParams::default());
    assert_eq!(config.neighbour_port(&config.neighbours[0]), 55000);
    assert!(config.route_mappings.is_none());
    assert!(config.managed_prefixes().is_none());
}

#[test]
fn full_config() {
    let config = parse(
        r#"{
            "router_id": "A",
            "listen_port": 6000,
            "hello_interval": 1.5,
            "metric_interval": 10,
            "probe_interval": 0.25,
            "weights": {"latency": 40, "jitter": 20, "loss": 30, "bandwidth": 10},
            "neighbors": [
                {"id": "B", "ip": "10.0.0.2", "port": 6001, "interface": "eth0", "bandwidth": 50},
                {"id": "C", "ip": "10.0.1.2", "prefix": "10.0.1.0/24"}
            ],
            "prefixes": ["192.168.1.0/24"],
            "bandwidth": [{"a": "C", "b": "A", "mbps": 100}],
            "route_mappings": {
                "B": "10.2.0.0/16",
                "C": {"prefix": "10.3.0.0/16", "interface": "eth1"}
            }
        }"#,
    );
    config.validate().unwrap();

    assert_eq!(config.hello_interval, Duration::from_millis(1500));
    assert_eq!(config.metric_interval, Duration::from_secs(10));
    assert_eq!(config.probe_interval, Duration::from_millis(250));
    assert_eq!(config.protocol_params().dead_interval(), Duration::from_millis(4500));
    assert_eq!(config.neighbour_port(&config.neighbours[0]), 6001);
    assert_eq!(config.neighbour_port(&config.neighbours[1]), 6000);
    assert_eq!(config.cost_model().unwrap().weights().latency, 40);

    let mappings = config.route_mappings.as_ref().unwrap();
    assert_eq!(
        mappings["B"],
        RouteMapping {
            prefix: "10.2.0.0/16".to_string(),
            interface: None
        }
    );
    assert_eq!(mappings["C"].interface.as_deref(), Some("eth1"));
    assert_eq!(
        config.managed_prefixes().unwrap().into_iter().collect::<Vec<_>>(),
        vec!["10.2.0.0/16".to_string(), "10.3.0.0/16".to_string()]
    );

    let router = Router::from_config(&config).unwrap();
    assert_eq!(router.neighbours.len(), 2);
    assert_eq!(router.prefixes, vec!["192.168.1.0/24".to_string()]);
    assert_eq!(router.metrics.bandwidth_for(&"B".to_string()), 50.0);
    assert_eq!(router.metrics.bandwidth_for(&"C".to_string()), 100.0);
    let c = router.neighbours.get(&"C".to_string()).unwrap();
    assert_eq!(c.link_prefix.as_deref(), Some("10.0.1.0/24"));
    assert_eq!(router.neighbours.get(&"B".to_string()).unwrap().itf.as_deref(), Some("eth0"));
}

#[test]
fn unknown_fields_are_rejected() {
    let res = serde_json::from_str::<RouterConfig<VirtualSystem>>(
        r#"{"router_id": "A", "neighbors": [], "helo_interval": 3}"#,
    );
    assert!(res.is_err());

    let res = serde_json::from_str::<RouterConfig<VirtualSystem>>(
        r#"{"router_id": "A", "neighbors": [{"id": "B", "ip": "x", "cost": 3}]}"#,
    );
    assert!(res.is_err());
}

#[test]
fn required_fields_are_required() {
    assert!(serde_json::from_str::<RouterConfig<VirtualSystem>>(r#"{"neighbors": []}"#).is_err());
    assert!(serde_json::from_str::<RouterConfig<VirtualSystem>>(r#"{"router_id": "A"}"#).is_err());
}

#[test]
fn validation_errors() {
    let mut config = RouterConfig::<VirtualSystem>::new("A".to_string());
    config.neighbours = vec![neighbour("B"), neighbour("C")];
    assert_eq!(config.validate(), Ok(()));

    let mut bad = config.clone();
    bad.weights.bandwidth = 0;
    assert_eq!(bad.validate(), Err(ConfigError::WeightsSum(90)));

    let mut bad = config.clone();
    bad.neighbours.push(neighbour("B"));
    assert_eq!(bad.validate(), Err(ConfigError::DuplicateNeighbour("B".to_string())));

    let mut bad = config.clone();
    bad.neighbours.push(neighbour("A"));
    assert_eq!(bad.validate(), Err(ConfigError::SelfNeighbour("A".to_string())));

    let mut bad = config.clone();
    bad.dead_multiplier = 1;
    assert_eq!(bad.validate(), Err(ConfigError::DeadMultiplier(1)));

    let mut bad = config.clone();
    bad.hello_interval = Duration::ZERO;
    assert_eq!(bad.validate(), Err(ConfigError::ZeroValue("hello_interval")));

    let mut bad = config.clone();
    bad.probe_count = 0;
    assert_eq!(bad.validate(), Err(ConfigError::ZeroValue("probe_count")));

    let mut bad = config.clone();
    bad.cost_hysteresis = -1.0;
    assert_eq!(bad.validate(), Err(ConfigError::Hysteresis(-1.0)));

    let mut bad = config.clone();
    bad.neighbours[0].bandwidth = Some(-5.0);
    assert!(matches!(bad.validate(), Err(ConfigError::Bandwidth { .. })));

    let mapping = |prefix: &str| RouteMapping {
        prefix: prefix.to_string(),
        interface: None,
    };
    let mut bad = config.clone();
    bad.route_mappings = Some([("A".to_string(), mapping("10.0.0.0/8"))].into_iter().collect());
    assert_eq!(bad.validate(), Err(ConfigError::SelfMapping("A".to_string())));

    let mut bad = config.clone();
    bad.route_mappings = Some(
        [
            ("B".to_string(), mapping("10.0.0.0/8")),
            ("C".to_string(), mapping("10.0.0.0/8")),
        ]
        .into_iter()
        .collect(),
    );
    assert_eq!(bad.validate(), Err(ConfigError::DuplicateMapping("10.0.0.0/8".to_string())));

    assert!(Router::from_config(&bad).is_err());
}

#[test]
fn huge_weights_do_not_wrap_around() {
    let config = parse(
        r#"{
            "router_id": "A",
            "weights": {"latency": 4294967295, "jitter": 1, "loss": 100, "bandwidth": 0},
            "neighbors": [{"id": "B", "ip": "10.0.0.2"}]
        }"#,
    );
    assert_eq!(
        config.validate(),
        Err(ConfigError::WeightsSum(u32::MAX as u64 + 101))
    );
    assert!(config.cost_model().is_err());
}
