use std::time::{Duration, Instant};

use qroute::metrics::{BandwidthCatalogue, LinkMetricSample, MetricsCollector, ProbeReport};

use crate::common::fakes::FakeProber;
use crate::common::virtual_network::VirtualSystem;

mod common;

fn collector() -> MetricsCollector<VirtualSystem> {
    let mut catalogue = BandwidthCatalogue::default();
    catalogue.insert(&"B".to_string(), &"A".to_string(), 100.0);
    catalogue.insert(&"A".to_string(), &"C".to_string(), 1000.0);
    MetricsCollector::new("A".to_string(), 5, Duration::from_millis(200), catalogue)
}

#[test]
fn jitter_is_the_population_standard_deviation() {
    let report = ProbeReport {
        sent: 5,
        rtts_ms: vec![10.0, 12.0, 8.0, 11.0, 9.0],
        mdev_ms: Some(99.0),
    };
    let sample = LinkMetricSample::from_report(&report, 0.0, Instant::now());

    assert!((sample.latency_ms.unwrap() - 10.0).abs() < 1e-9);
    assert!((sample.jitter_ms.unwrap() - 2f64.sqrt()).abs() < 1e-9);
    assert_eq!(sample.loss_percent, 0.0);
}

#[test]
fn single_reply_falls_back_to_the_tool_deviation() {
    let report = ProbeReport {
        sent: 4,
        rtts_ms: vec![7.0],
        mdev_ms: Some(0.4),
    };
    let sample = LinkMetricSample::from_report(&report, 0.0, Instant::now());
    assert_eq!(sample.jitter_ms, Some(0.4));
    assert_eq!(sample.latency_ms, Some(7.0));
    assert_eq!(sample.loss_percent, 75.0);

    let report = ProbeReport { mdev_ms: None, ..report };
    let sample = LinkMetricSample::from_report(&report, 0.0, Instant::now());
    assert_eq!(sample.jitter_ms, Some(0.0));
}

#[test]
fn total_loss_is_still_a_sample() {
    let sample = LinkMetricSample::from_report(&ProbeReport::total_loss(10), 100.0, Instant::now());
    assert_eq!(sample.latency_ms, None);
    assert_eq!(sample.jitter_ms, None);
    assert_eq!(sample.loss_percent, 100.0);
    assert_eq!(sample.bandwidth_mbps, 100.0);

    let nothing_sent = LinkMetricSample::from_report(&ProbeReport::default(), 0.0, Instant::now());
    assert_eq!(nothing_sent.loss_percent, 100.0);
}

#[test]
fn nonsensical_rtts_count_as_lost() {
    let report = ProbeReport {
        sent: 4,
        rtts_ms: vec![10.0, -1.0, f64::NAN, 20.0],
        mdev_ms: None,
    };
    assert_eq!(report.answered(), vec![10.0, 20.0]);
    assert_eq!(report.lost(), 2);

    let sample = LinkMetricSample::from_report(&report, 0.0, Instant::now());
    assert_eq!(sample.latency_ms, Some(15.0));
    assert_eq!(sample.loss_percent, 50.0);
}

#[test]
fn bandwidth_comes_from_the_catalogue() {
    let mut metrics = collector();
    assert_eq!(metrics.bandwidth_for(&"B".to_string()), 100.0);
    assert_eq!(metrics.bandwidth_for(&"C".to_string()), 1000.0);
    assert_eq!(metrics.bandwidth_for(&"D".to_string()), 0.0);

    metrics.set_bandwidth(&"B".to_string(), 40.0);
    assert_eq!(metrics.bandwidth_for(&"B".to_string()), 40.0);
}

#[test]
fn measure_probes_the_physical_address() {
    let mut metrics = collector();
    let mut prober = FakeProber::replying(&[10.0, 12.0, 8.0, 11.0, 9.0], 5);
    let sample = metrics
        .measure(&"B".to_string(), &"phy-B".to_string(), &mut prober, Instant::now())
        .clone();

    assert_eq!(prober.calls, vec![("phy-B".to_string(), 5, Duration::from_millis(200))]);
    assert_eq!(sample.bandwidth_mbps, 100.0);
    assert_eq!(metrics.latest(&"B".to_string()), Some(&sample));
}

#[test]
fn failing_probe_counts_as_total_loss() {
    let mut metrics = collector();
    let mut prober = FakeProber::failing();
    let sample = metrics.measure(&"C".to_string(), &"phy-C".to_string(), &mut prober, Instant::now());
    assert_eq!(sample.loss_percent, 100.0);
    assert_eq!(sample.latency_ms, None);
}

#[test]
fn new_sample_replaces_the_old_one() {
    let mut metrics = collector();
    let start = Instant::now();
    metrics.record(&"B".to_string(), &ProbeReport::total_loss(5), start);
    let later = start + Duration::from_secs(30);
    let report = ProbeReport {
        sent: 5,
        rtts_ms: vec![1.0; 5],
        mdev_ms: None,
    };
    metrics.record(&"B".to_string(), &report, later);

    let latest = metrics.latest(&"B".to_string()).unwrap();
    assert_eq!(latest.timestamp, later);
    assert_eq!(latest.loss_percent, 0.0);

    metrics.forget(&"B".to_string());
    assert!(metrics.latest(&"B".to_string()).is_none());
}

#[test]
fn router_turns_probe_results_into_link_cost() {
    let mut network = common::graphs::vnet_line();
    network.tick_n(10);
    let now = network.now;

    let router = network.get_node("A");
    let seqno = router.seqno;
    let mut prober = FakeProber::failing();
    let cost = router.measure_link(&"B".to_string(), &mut prober, now);

    // nothing came back and nothing is catalogued: the worst possible link
    assert_eq!(cost.map(|c| c.value()), Some(100.0));
    assert_eq!(router.seqno, seqno + 1);

    assert_eq!(router.measure_link(&"Z".to_string(), &mut prober, now), None);
}
