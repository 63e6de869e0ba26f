use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use educe::Educe;
use log::{debug, warn};

use crate::framework::{Prober, RoutingSystem};
use crate::util::{mean, population_std_dev, range};

/// What came back from probing a neighbour
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbeReport {
    /// number of probes sent
    pub sent: u32,
    /// round-trip time of every answered probe
    pub rtts_ms: Vec<f64>,
    /// deviation statistic reported by the probing tool itself, if any
    pub mdev_ms: Option<f64>,
}

impl ProbeReport {
    /// A report where nothing was answered
    pub fn total_loss(sent: u32) -> Self {
        Self {
            sent,
            rtts_ms: Vec::new(),
            mdev_ms: None,
        }
    }

    /// RTTs that make sense, negative or non-finite values count as unanswered
    pub fn answered(&self) -> Vec<f64> {
        self.rtts_ms
            .iter()
            .copied()
            .filter(|rtt| rtt.is_finite() && *rtt >= 0.0)
            .collect()
    }

    pub fn lost(&self) -> u32 {
        let answered = u32::try_from(self.answered().len()).unwrap_or(u32::MAX);
        self.sent.saturating_sub(answered)
    }
}

/// Link quality towards a neighbour as of `timestamp`. A new sample replaces the previous one.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkMetricSample {
    /// mean round-trip time, `None` if no probe was answered
    pub latency_ms: Option<f64>,
    /// `None` if no probe was answered
    pub jitter_ms: Option<f64>,
    pub loss_percent: f64,
    /// from the static catalogue, 0 if the link is not catalogued
    pub bandwidth_mbps: f64,
    pub timestamp: Instant,
}

impl LinkMetricSample {
    pub fn from_report(report: &ProbeReport, bandwidth_mbps: f64, timestamp: Instant) -> Self {
        let rtts = report.answered();

        let jitter_ms = if rtts.is_empty() {
            None
        } else {
            Some(
                population_std_dev(&rtts)
                    .or(report.mdev_ms)
                    .or_else(|| range(&rtts))
                    .unwrap_or(0.0),
            )
        };

        let loss_percent = if report.sent == 0 {
            100.0
        } else {
            report.lost() as f64 / report.sent as f64 * 100.0
        };

        Self {
            latency_ms: mean(&rtts),
            jitter_ms,
            loss_percent,
            bandwidth_mbps,
            timestamp,
        }
    }
}

/// Static per-link bandwidth, bandwidth is never measured.
/// Links are undirected, `(a, b)` and `(b, a)` are the same entry.
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()))]
pub struct BandwidthCatalogue<T: RoutingSystem + ?Sized> {
    links: HashMap<(T::NodeAddress, T::NodeAddress), f64>,
}

impl<T: RoutingSystem + ?Sized> Default for BandwidthCatalogue<T> {
    fn default() -> Self {
        Self {
            links: HashMap::new(),
        }
    }
}

impl<T: RoutingSystem + ?Sized> BandwidthCatalogue<T> {
    fn key(a: &T::NodeAddress, b: &T::NodeAddress) -> (T::NodeAddress, T::NodeAddress) {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }

    pub fn insert(&mut self, a: &T::NodeAddress, b: &T::NodeAddress, mbps: f64) {
        self.links.insert(Self::key(a, b), mbps);
    }

    pub fn lookup(&self, a: &T::NodeAddress, b: &T::NodeAddress) -> Option<f64> {
        self.links.get(&Self::key(a, b)).copied()
    }
}

/// Owns the latest metric sample of every neighbour
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()))]
pub struct MetricsCollector<T: RoutingSystem + ?Sized> {
    local: T::NodeAddress,
    probe_count: u32,
    probe_interval: Duration,
    catalogue: BandwidthCatalogue<T>,
    /// per-neighbour bandwidth, takes precedence over the catalogue
    overrides: HashMap<T::NodeAddress, f64>,
    samples: HashMap<T::NodeAddress, LinkMetricSample>,
}

impl<T: RoutingSystem + ?Sized> MetricsCollector<T> {
    pub fn new(
        local: T::NodeAddress,
        probe_count: u32,
        probe_interval: Duration,
        catalogue: BandwidthCatalogue<T>,
    ) -> Self {
        Self {
            local,
            probe_count,
            probe_interval,
            catalogue,
            overrides: HashMap::new(),
            samples: HashMap::new(),
        }
    }

    pub fn set_bandwidth(&mut self, neighbour: &T::NodeAddress, mbps: f64) {
        self.overrides.insert(neighbour.clone(), mbps);
    }

    pub fn bandwidth_for(&self, neighbour: &T::NodeAddress) -> f64 {
        self.overrides
            .get(neighbour)
            .copied()
            .or_else(|| self.catalogue.lookup(&self.local, neighbour))
            .unwrap_or(0.0)
    }

    /// Probes the neighbour and stores the resulting sample.
    /// A failing probe is not an error, it is recorded as total loss and retried next cycle.
    pub fn measure<P: Prober<T> + ?Sized>(
        &mut self,
        neighbour: &T::NodeAddress,
        target: &T::PhysicalAddress,
        prober: &mut P,
        now: Instant,
    ) -> &LinkMetricSample {
        let report = match prober.probe(target, self.probe_count, self.probe_interval) {
            Ok(report) => report,
            Err(err) => {
                warn!("Probing {neighbour} at {target} failed, counting it as total loss: {err:#}");
                ProbeReport::total_loss(self.probe_count)
            }
        };
        self.record(neighbour, &report, now)
    }

    /// Derives a sample from a report produced elsewhere and replaces the stored one
    pub fn record(
        &mut self,
        neighbour: &T::NodeAddress,
        report: &ProbeReport,
        now: Instant,
    ) -> &LinkMetricSample {
        let sample = LinkMetricSample::from_report(report, self.bandwidth_for(neighbour), now);
        debug!(
            "Sampled {neighbour}: latency={:?}ms jitter={:?}ms loss={:.1}% bandwidth={}Mbps ({} of {} answered)",
            sample.latency_ms,
            sample.jitter_ms,
            sample.loss_percent,
            sample.bandwidth_mbps,
            report.rtts_ms.len(),
            report.sent
        );
        match self.samples.entry(neighbour.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(sample);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(sample),
        }
    }

    pub fn latest(&self, neighbour: &T::NodeAddress) -> Option<&LinkMetricSample> {
        self.samples.get(neighbour)
    }

    pub fn forget(&mut self, neighbour: &T::NodeAddress) {
        self.samples.remove(neighbour);
    }
}
