use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use educe::Educe;

use crate::concepts::neighbour::{AdjacencyState, Neighbour};
use crate::concepts::packet::Hello;
use crate::framework::RoutingSystem;

/// An adjacency moved from one state to another
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub struct AdjacencyChange<T: RoutingSystem + ?Sized> {
    pub neighbour: T::NodeAddress,
    pub from: AdjacencyState,
    pub to: AdjacencyState,
}

impl<T: RoutingSystem + ?Sized> AdjacencyChange<T> {
    /// Whether the change adds or removes an edge from our advertisement
    pub fn affects_topology(&self) -> bool {
        self.from == AdjacencyState::TwoWay || self.to == AdjacencyState::TwoWay
    }
}

/// Hello handling result
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()))]
pub enum HelloOutcome<T: RoutingSystem + ?Sized> {
    Accepted(Vec<AdjacencyChange<T>>),
    /// the sender is not a configured neighbour
    Unauthorised,
    /// the hello claims to come from a different router than the one that sent it
    Mismatched,
}

/// Every configured neighbour, keyed by routing address.
/// Neighbours are never created from the wire, only configured ones take part.
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), Default(bound()))]
pub struct NeighbourTable<T: RoutingSystem + ?Sized> {
    neighbours: BTreeMap<T::NodeAddress, Neighbour<T>>,
}

impl<T: RoutingSystem + ?Sized> NeighbourTable<T> {
    pub fn insert(&mut self, neighbour: Neighbour<T>) {
        self.neighbours.insert(neighbour.addr.clone(), neighbour);
    }

    pub fn get(&self, addr: &T::NodeAddress) -> Option<&Neighbour<T>> {
        self.neighbours.get(addr)
    }

    pub fn get_mut(&mut self, addr: &T::NodeAddress) -> Option<&mut Neighbour<T>> {
        self.neighbours.get_mut(addr)
    }

    pub fn contains(&self, addr: &T::NodeAddress) -> bool {
        self.neighbours.contains_key(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbour<T>> {
        self.neighbours.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Neighbour<T>> {
        self.neighbours.values_mut()
    }

    pub fn two_way(&self) -> impl Iterator<Item = &Neighbour<T>> {
        self.neighbours.values().filter(|n| n.is_two_way())
    }

    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }

    /// Routers we currently hear from, this is what goes into our hellos
    pub fn heard(&self) -> Vec<T::NodeAddress> {
        self.neighbours
            .values()
            .filter(|n| n.state != AdjacencyState::Down)
            .map(|n| n.addr.clone())
            .collect()
    }

    /// Processes a hello from `from`: Init if it does not list us yet, TwoWay if it does.
    pub fn on_hello(
        &mut self,
        local: &T::NodeAddress,
        from: &T::NodeAddress,
        hello: &Hello<T>,
        now: Instant,
    ) -> HelloOutcome<T> {
        if hello.router != *from {
            return HelloOutcome::Mismatched;
        }
        let Some(neigh) = self.neighbours.get_mut(from) else {
            return HelloOutcome::Unauthorised;
        };

        neigh.last_seen = Some(now);
        neigh.prefixes = hello.prefixes.clone();

        let target = if hello.neighbours.contains(local) {
            AdjacencyState::TwoWay
        } else {
            AdjacencyState::Init
        };

        let changes = neigh
            .transition(target)
            .into_iter()
            .map(|(from_state, to_state)| AdjacencyChange {
                neighbour: from.clone(),
                from: from_state,
                to: to_state,
            })
            .collect();
        HelloOutcome::Accepted(changes)
    }

    /// Declares every neighbour that has been silent for `dead_interval` or longer as Down
    pub fn sweep(&mut self, now: Instant, dead_interval: Duration) -> Vec<AdjacencyChange<T>> {
        let mut changes = Vec::new();
        for neigh in self.neighbours.values_mut() {
            if neigh.state == AdjacencyState::Down {
                continue;
            }
            let expired = match neigh.last_seen {
                Some(seen) => now.saturating_duration_since(seen) >= dead_interval,
                None => true,
            };
            if expired {
                for (from, to) in neigh.transition(AdjacencyState::Down) {
                    changes.push(AdjacencyChange {
                        neighbour: neigh.addr.clone(),
                        from,
                        to,
                    });
                }
            }
        }
        changes
    }
}
