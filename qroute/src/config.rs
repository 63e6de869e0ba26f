use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use educe::Educe;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};

use crate::cost::{CostModel, CostThresholds, CostWeights};
use crate::feedback::ConfigError;
use crate::framework::{ProtocolParams, RoutingSystem};
use crate::metrics::BandwidthCatalogue;

mod defaults {
    use std::time::Duration;

    use crate::framework::ProtocolParams;

    pub fn listen_port() -> u16 {
        55000
    }
    pub fn hello_interval() -> Duration {
        ProtocolParams::default().hello_interval
    }
    pub fn dead_multiplier() -> u32 {
        ProtocolParams::default().dead_multiplier
    }
    pub fn metric_interval() -> Duration {
        ProtocolParams::default().metric_interval
    }
    pub fn refresh_interval() -> Duration {
        ProtocolParams::default().refresh_interval
    }
    pub fn recompute_interval() -> Duration {
        ProtocolParams::default().recompute_interval
    }
    pub fn probe_count() -> u32 {
        ProtocolParams::default().probe_count
    }
    pub fn probe_interval() -> Duration {
        ProtocolParams::default().probe_interval
    }
    pub fn probe_timeout() -> Duration {
        ProtocolParams::default().probe_timeout
    }
    pub fn cost_hysteresis() -> f64 {
        ProtocolParams::default().cost_hysteresis
    }
}

/// Startup configuration of a router. Loaded once, never changed afterwards.
///
/// Durations are given in (fractional) seconds. Unknown fields are rejected.
#[serde_as]
#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()))]
#[serde(bound = "", deny_unknown_fields)]
pub struct RouterConfig<T: RoutingSystem + ?Sized> {
    pub router_id: T::NodeAddress,
    /// address to bind to, all addresses if unset
    #[serde(default)]
    pub listen_ip: Option<T::PhysicalAddress>,
    #[serde(default = "defaults::listen_port")]
    pub listen_port: u16,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "defaults::hello_interval")]
    pub hello_interval: Duration,
    #[serde(default = "defaults::dead_multiplier")]
    pub dead_multiplier: u32,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "defaults::metric_interval")]
    pub metric_interval: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "defaults::refresh_interval")]
    pub refresh_interval: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "defaults::recompute_interval")]
    pub recompute_interval: Duration,
    #[serde(default = "defaults::probe_count")]
    pub probe_count: u32,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "defaults::probe_interval")]
    pub probe_interval: Duration,
    /// how long to wait for each probe reply
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "defaults::probe_timeout")]
    pub probe_timeout: Duration,
    #[serde(default = "defaults::cost_hysteresis")]
    pub cost_hysteresis: f64,
    #[serde(default)]
    pub weights: CostWeights,
    #[serde(default)]
    pub thresholds: CostThresholds,
    #[serde(rename = "neighbors")]
    pub neighbours: Vec<NeighbourConfig<T>>,
    /// stub prefixes attached to this router
    #[serde(default)]
    pub prefixes: Vec<T::Prefix>,
    /// static bandwidth catalogue
    #[serde(default)]
    pub bandwidth: Vec<BandwidthEntry<T>>,
    /// remote router -> prefix to install towards it. Absent means compute-only mode.
    #[serde(default)]
    pub route_mappings: Option<BTreeMap<T::NodeAddress, RouteMapping<T>>>,
}

#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()))]
#[serde(bound = "", deny_unknown_fields)]
pub struct NeighbourConfig<T: RoutingSystem + ?Sized> {
    pub id: T::NodeAddress,
    pub ip: T::PhysicalAddress,
    /// defaults to our own listen port
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub interface: Option<T::InterfaceId>,
    /// overrides the catalogue
    #[serde(default)]
    pub bandwidth: Option<f64>,
    /// subnet of the link to this neighbour
    #[serde(default)]
    pub prefix: Option<T::Prefix>,
}

#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()))]
#[serde(bound = "", deny_unknown_fields)]
pub struct BandwidthEntry<T: RoutingSystem + ?Sized> {
    pub a: T::NodeAddress,
    pub b: T::NodeAddress,
    pub mbps: f64,
}

/// Either a bare prefix, or `{prefix, interface}`
#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[serde(bound = "", from = "RouteMappingRepr<T>")]
pub struct RouteMapping<T: RoutingSystem + ?Sized> {
    pub prefix: T::Prefix,
    pub interface: Option<T::InterfaceId>,
}

#[derive(Deserialize)]
#[serde(bound = "", untagged)]
enum RouteMappingRepr<T: RoutingSystem + ?Sized> {
    Prefix(T::Prefix),
    Full {
        prefix: T::Prefix,
        #[serde(default)]
        interface: Option<T::InterfaceId>,
    },
}

impl<T: RoutingSystem + ?Sized> From<RouteMappingRepr<T>> for RouteMapping<T> {
    fn from(repr: RouteMappingRepr<T>) -> Self {
        match repr {
            RouteMappingRepr::Prefix(prefix) => RouteMapping {
                prefix,
                interface: None,
            },
            RouteMappingRepr::Full { prefix, interface } => RouteMapping { prefix, interface },
        }
    }
}

impl<T: RoutingSystem + ?Sized> RouterConfig<T> {
    /// A configuration with every optional field at its default
    pub fn new(router_id: T::NodeAddress) -> Self {
        Self {
            router_id,
            listen_ip: None,
            listen_port: defaults::listen_port(),
            hello_interval: defaults::hello_interval(),
            dead_multiplier: defaults::dead_multiplier(),
            metric_interval: defaults::metric_interval(),
            refresh_interval: defaults::refresh_interval(),
            recompute_interval: defaults::recompute_interval(),
            probe_count: defaults::probe_count(),
            probe_interval: defaults::probe_interval(),
            probe_timeout: defaults::probe_timeout(),
            cost_hysteresis: defaults::cost_hysteresis(),
            weights: CostWeights::default(),
            thresholds: CostThresholds::default(),
            neighbours: Vec::new(),
            prefixes: Vec::new(),
            bandwidth: Vec::new(),
            route_mappings: None,
        }
    }

    /// Checks everything that can be checked without touching the network
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cost_model()?;

        for (name, value) in [
            ("hello_interval", self.hello_interval),
            ("metric_interval", self.metric_interval),
            ("refresh_interval", self.refresh_interval),
            ("recompute_interval", self.recompute_interval),
            ("probe_interval", self.probe_interval),
            ("probe_timeout", self.probe_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroValue(name));
            }
        }
        if self.probe_count == 0 {
            return Err(ConfigError::ZeroValue("probe_count"));
        }
        if self.listen_port == 0 {
            return Err(ConfigError::ZeroValue("listen_port"));
        }
        if self.dead_multiplier < 2 {
            return Err(ConfigError::DeadMultiplier(self.dead_multiplier));
        }
        if !self.cost_hysteresis.is_finite() || self.cost_hysteresis < 0.0 {
            return Err(ConfigError::Hysteresis(self.cost_hysteresis));
        }

        let mut seen = HashSet::new();
        for neigh in &self.neighbours {
            if neigh.id == self.router_id {
                return Err(ConfigError::SelfNeighbour(neigh.id.to_string()));
            }
            if !seen.insert(&neigh.id) {
                return Err(ConfigError::DuplicateNeighbour(neigh.id.to_string()));
            }
            if neigh.port == Some(0) {
                return Err(ConfigError::ZeroValue("neighbour port"));
            }
            if let Some(mbps) = neigh.bandwidth {
                check_bandwidth(&self.router_id, &neigh.id, mbps)?;
            }
        }
        for entry in &self.bandwidth {
            check_bandwidth(&entry.a, &entry.b, entry.mbps)?;
        }

        if let Some(mappings) = &self.route_mappings {
            let mut prefixes = HashSet::new();
            for (dest, mapping) in mappings {
                if *dest == self.router_id {
                    return Err(ConfigError::SelfMapping(dest.to_string()));
                }
                if !prefixes.insert(&mapping.prefix) {
                    return Err(ConfigError::DuplicateMapping(mapping.prefix.to_string()));
                }
            }
        }
        Ok(())
    }

    pub fn cost_model(&self) -> Result<CostModel, ConfigError> {
        CostModel::new(self.weights, self.thresholds)
    }

    pub fn protocol_params(&self) -> ProtocolParams {
        ProtocolParams {
            hello_interval: self.hello_interval,
            dead_multiplier: self.dead_multiplier,
            metric_interval: self.metric_interval,
            refresh_interval: self.refresh_interval,
            recompute_interval: self.recompute_interval,
            probe_count: self.probe_count,
            probe_interval: self.probe_interval,
            probe_timeout: self.probe_timeout,
            cost_hysteresis: self.cost_hysteresis,
        }
    }

    pub fn bandwidth_catalogue(&self) -> BandwidthCatalogue<T> {
        let mut catalogue = BandwidthCatalogue::default();
        for entry in &self.bandwidth {
            catalogue.insert(&entry.a, &entry.b, entry.mbps);
        }
        catalogue
    }

    /// Prefixes the router may install into the kernel, `None` in compute-only mode
    pub fn managed_prefixes(&self) -> Option<BTreeSet<T::Prefix>> {
        self.route_mappings
            .as_ref()
            .map(|mappings| mappings.values().map(|m| m.prefix.clone()).collect())
    }

    pub fn neighbour_port(&self, neigh: &NeighbourConfig<T>) -> u16 {
        neigh.port.unwrap_or(self.listen_port)
    }
}

fn check_bandwidth<A: ToString>(a: &A, b: &A, mbps: f64) -> Result<(), ConfigError> {
    if !mbps.is_finite() || mbps < 0.0 {
        return Err(ConfigError::Bandwidth {
            a: a.to_string(),
            b: b.to_string(),
            mbps,
        });
    }
    Ok(())
}
