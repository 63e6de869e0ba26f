use std::collections::BTreeMap;

use educe::Educe;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::framework::RoutingSystem;

#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[serde(bound = "")]
pub struct RouteEntry<T: RoutingSystem + ?Sized> {
    pub prefix: T::Prefix,
    /// the router the prefix belongs to
    pub destination: T::NodeAddress,
    /// the adjacent router traffic is handed to
    pub next_hop: T::NodeAddress,
    pub next_hop_phy: T::PhysicalAddress,
    pub itf: Option<T::InterfaceId>,
    /// cumulative path cost
    pub metric: f64,
}

impl<T: RoutingSystem + ?Sized> RouteEntry<T> {
    /// Whether both entries forward the same way, the metric does not matter to the kernel
    pub fn same_forwarding(&self, other: &Self) -> bool {
        self.next_hop_phy == other.next_hop_phy && self.itf == other.itf
    }
}

/// Destination prefix -> route. Rebuilt from scratch on every recompute.
#[serde_as]
#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()), Default(bound()))]
#[serde(bound = "")]
pub struct RoutingTable<T: RoutingSystem + ?Sized> {
    #[serde_as(as = "Vec<(_, _)>")]
    pub entries: BTreeMap<T::Prefix, RouteEntry<T>>,
}

impl<T: RoutingSystem + ?Sized> RoutingTable<T> {
    pub fn get(&self, prefix: &T::Prefix) -> Option<&RouteEntry<T>> {
        self.entries.get(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry<T>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
