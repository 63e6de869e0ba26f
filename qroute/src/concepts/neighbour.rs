use std::fmt::{Display, Formatter};
use std::time::Instant;

use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::cost::LinkCost;
use crate::framework::RoutingSystem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjacencyState {
    /// nothing heard within the dead interval
    Down,
    /// we hear the neighbour, but it does not list us yet
    Init,
    /// both sides hear each other, the link may carry traffic
    TwoWay,
}

impl AdjacencyState {
    /// The single steps needed to get from `self` to `target`.
    /// Adjacencies only ever move Down -> Init -> TwoWay -> Down, or fall back to Down from Init.
    pub fn path_to(self, target: AdjacencyState) -> &'static [(AdjacencyState, AdjacencyState)] {
        use AdjacencyState::*;
        match (self, target) {
            (Down, Init) => &[(Down, Init)],
            (Down, TwoWay) => &[(Down, Init), (Init, TwoWay)],
            (Init, TwoWay) => &[(Init, TwoWay)],
            (Init, Down) => &[(Init, Down)],
            (TwoWay, Down) => &[(TwoWay, Down)],
            (TwoWay, Init) => &[(TwoWay, Down), (Down, Init)],
            _ => &[],
        }
    }
}

impl Display for AdjacencyState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjacencyState::Down => write!(f, "Down"),
            AdjacencyState::Init => write!(f, "Init"),
            AdjacencyState::TwoWay => write!(f, "TwoWay"),
        }
    }
}

/// A configured, directly connected router
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()))]
pub struct Neighbour<T: RoutingSystem + ?Sized> {
    /// the routing network address
    pub addr: T::NodeAddress,
    /// the physical address, packets and forwarded traffic go here
    pub addr_phy: T::PhysicalAddress,
    /// egress interface towards this neighbour, if pinned
    pub itf: Option<T::InterfaceId>,
    /// subnet of the link itself, advertised together with the link cost
    pub link_prefix: Option<T::Prefix>,
    pub state: AdjacencyState,
    pub last_seen: Option<Instant>,
    /// prefixes announced in the neighbour's last hello
    pub prefixes: Vec<T::Prefix>,
    /// cost derived from the latest metric sample, None until the link has been measured
    pub link_cost: Option<LinkCost>,
    /// cost carried by our last advertisement, the baseline for hysteresis
    pub advertised_cost: Option<LinkCost>,
}

impl<T: RoutingSystem + ?Sized> Neighbour<T> {
    pub fn new(addr: T::NodeAddress, addr_phy: T::PhysicalAddress) -> Self {
        Self {
            addr,
            addr_phy,
            itf: None,
            link_prefix: None,
            state: AdjacencyState::Down,
            last_seen: None,
            prefixes: Vec::new(),
            link_cost: None,
            advertised_cost: None,
        }
    }

    pub fn with_interface(mut self, itf: Option<T::InterfaceId>) -> Self {
        self.itf = itf;
        self
    }

    pub fn with_link_prefix(mut self, prefix: Option<T::Prefix>) -> Self {
        self.link_prefix = prefix;
        self
    }

    pub fn is_two_way(&self) -> bool {
        self.state == AdjacencyState::TwoWay
    }

    /// Moves to `target` through the legal intermediate states, returns every step taken
    pub fn transition(&mut self, target: AdjacencyState) -> Vec<(AdjacencyState, AdjacencyState)> {
        let steps = self.state.path_to(target).to_vec();
        if !steps.is_empty() {
            self.state = target;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::AdjacencyState::*;

    #[test]
    fn never_skips_init() {
        assert_eq!(Down.path_to(TwoWay), &[(Down, Init), (Init, TwoWay)]);
        assert_eq!(TwoWay.path_to(Init), &[(TwoWay, Down), (Down, Init)]);
        assert!(TwoWay.path_to(TwoWay).is_empty());
        assert!(Down.path_to(Down).is_empty());
    }
}
