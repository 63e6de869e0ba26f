use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::cost::LinkCost;
use crate::framework::RoutingSystem;

/// Periodic liveness message, sent to every configured neighbour
#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[serde(bound = "")]
pub struct Hello<T: RoutingSystem + ?Sized> {
    pub router: T::NodeAddress,
    /// every router the sender currently hears, used for two-way confirmation
    pub neighbours: Vec<T::NodeAddress>,
    #[serde(default)]
    pub prefixes: Vec<T::Prefix>,
}

#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[serde(bound = "")]
pub struct LinkAdvert<T: RoutingSystem + ?Sized> {
    pub neighbour: T::NodeAddress,
    pub cost: LinkCost,
    #[serde(default)]
    pub prefix: Option<T::Prefix>,
}

/// A router's view of its own links, flooded to every router
#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[serde(bound = "")]
pub struct Advertisement<T: RoutingSystem + ?Sized> {
    pub origin: T::NodeAddress,
    /// strictly increasing per origin, the only thing that decides which advertisement is newer
    pub seqno: u64,
    /// number of flooding hops travelled, informational only
    pub age: u16,
    pub links: Vec<LinkAdvert<T>>,
    /// stub prefixes attached to the origin
    #[serde(default)]
    pub prefixes: Vec<T::Prefix>,
}

#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[serde(bound = "")]
pub enum Packet<T: RoutingSystem + ?Sized> {
    Hello(Hello<T>),
    Advertisement(Advertisement<T>),
}

#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()))]
pub struct OutboundPacket<T: RoutingSystem + ?Sized> {
    /// to this neighbour
    pub dest: T::NodeAddress,
    pub packet: Packet<T>,
}
