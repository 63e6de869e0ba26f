use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use anyhow::anyhow;
use qroute::framework::{KernelRoutes, Prober};
use qroute::metrics::ProbeReport;

use crate::common::virtual_network::VirtualSystem;

/// Hands out canned probe results in order
#[derive(Default)]
pub struct FakeProber {
    pub reports: VecDeque<anyhow::Result<ProbeReport>>,
    /// (target, count, interval) of every call
    pub calls: Vec<(String, u32, Duration)>,
}

impl FakeProber {
    pub fn replying(rtts_ms: &[f64], sent: u32) -> Self {
        let mut prober = Self::default();
        prober.reports.push_back(Ok(ProbeReport {
            sent,
            rtts_ms: rtts_ms.to_vec(),
            mdev_ms: None,
        }));
        prober
    }

    pub fn failing() -> Self {
        let mut prober = Self::default();
        prober.reports.push_back(Err(anyhow!("network is unreachable")));
        prober
    }
}

impl Prober<VirtualSystem> for FakeProber {
    fn probe(&mut self, target: &String, count: u32, interval: Duration) -> anyhow::Result<ProbeReport> {
        self.calls.push((target.clone(), count, interval));
        self.reports
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no more canned reports")))
    }
}

/// In-memory forwarding table that can be told to fail
#[derive(Default)]
pub struct FakeKernel {
    /// prefix -> (next hop, interface)
    pub routes: BTreeMap<String, (String, Option<String>)>,
    pub adds: usize,
    pub removes: usize,
    pub fail_adds: BTreeSet<String>,
    pub fail_removes: BTreeSet<String>,
}

impl FakeKernel {
    pub fn mutations(&self) -> usize {
        self.adds + self.removes
    }
}

impl KernelRoutes<VirtualSystem> for FakeKernel {
    fn add(&mut self, prefix: &String, next_hop: &String, itf: Option<&String>) -> anyhow::Result<()> {
        if self.fail_adds.contains(prefix) {
            return Err(anyhow!("RTNETLINK answers: Network is unreachable"));
        }
        self.adds += 1;
        self.routes
            .insert(prefix.clone(), (next_hop.clone(), itf.cloned()));
        Ok(())
    }

    fn remove(&mut self, prefix: &String) -> anyhow::Result<()> {
        if self.fail_removes.contains(prefix) {
            return Err(anyhow!("RTNETLINK answers: Operation not permitted"));
        }
        self.removes += 1;
        self.routes.remove(prefix);
        Ok(())
    }
}
