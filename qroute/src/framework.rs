use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::metrics::ProbeReport;

pub trait RoutingSystem {
    /// Address of the router on the routing network, MUST be globally unique.
    /// Its ordering is the tie-break order used by path computation.
    type NodeAddress: Ord + Display + RootData + RootKey;
    /// Address of a directly connected neighbour on the physical network, also used as the kernel next-hop
    type PhysicalAddress: Display + RootData + RootKey;
    /// A destination that routers advertise and that may be installed into the kernel
    type Prefix: Ord + Display + RootData + RootKey;
    /// Egress interface handed to the kernel
    type InterfaceId: Display + RootData + RootKey;
}

pub trait RootData: Clone + Debug + Serialize + DeserializeOwned + Sized {}
pub trait RootKey: Eq + PartialEq + Hash {}
impl<T: Eq + PartialEq + Hash> RootKey for T {}
impl<T: Clone + Debug + Serialize + DeserializeOwned + Sized> RootData for T {}

/// Active link probing, e.g. ICMP echo. Implementations must bound every probe with a timeout.
pub trait Prober<T: RoutingSystem + ?Sized> {
    fn probe(
        &mut self,
        target: &T::PhysicalAddress,
        count: u32,
        interval: Duration,
    ) -> anyhow::Result<ProbeReport>;
}

/// Mutation of the host forwarding table.
///
/// `add` has replace semantics: adding a prefix that is already present overwrites its next-hop.
pub trait KernelRoutes<T: RoutingSystem + ?Sized> {
    fn add(
        &mut self,
        prefix: &T::Prefix,
        next_hop: &T::PhysicalAddress,
        itf: Option<&T::InterfaceId>,
    ) -> anyhow::Result<()>;
    fn remove(&mut self, prefix: &T::Prefix) -> anyhow::Result<()>;
}

/// Timers and thresholds that drive the protocol
#[derive(Clone, Debug, PartialEq)]
pub struct ProtocolParams {
    pub hello_interval: Duration,
    /// a neighbour is declared down after `dead_multiplier` hello intervals of silence
    pub dead_multiplier: u32,
    pub metric_interval: Duration,
    /// periodic re-origination of the self advertisement
    pub refresh_interval: Duration,
    /// fallback recompute timer, in case no LSDB mutation triggers one
    pub recompute_interval: Duration,
    pub probe_count: u32,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    /// minimum change in link cost that causes a new advertisement
    pub cost_hysteresis: f64,
}

impl ProtocolParams {
    pub fn dead_interval(&self) -> Duration {
        self.hello_interval * self.dead_multiplier
    }
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            hello_interval: Duration::from_secs(5),
            dead_multiplier: 3,
            metric_interval: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(30),
            recompute_interval: Duration::from_secs(10),
            probe_count: 10,
            probe_interval: Duration::from_millis(200),
            probe_timeout: Duration::from_secs(1),
            cost_hysteresis: 5.0,
        }
    }
}
