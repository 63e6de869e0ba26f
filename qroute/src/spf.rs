use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use educe::Educe;

use crate::cost::LinkCost;
use crate::framework::RoutingSystem;
use crate::lsdb::LinkStateDatabase;
use crate::util::Distance;

/// Directed, weighted graph derived from an LSDB snapshot.
/// Nodes are advertised routers, edges are advertised link costs.
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), Default(bound()))]
pub struct Topology<T: RoutingSystem + ?Sized> {
    edges: BTreeMap<T::NodeAddress, Vec<(T::NodeAddress, LinkCost)>>,
    prefixes: BTreeMap<T::NodeAddress, Vec<T::Prefix>>,
}

impl<T: RoutingSystem + ?Sized> Topology<T> {
    pub fn from_lsdb(lsdb: &LinkStateDatabase<T>) -> Self {
        let mut topology = Self::default();
        for adv in lsdb.iter() {
            let links = adv
                .links
                .iter()
                .filter(|link| link.neighbour != adv.origin)
                .map(|link| (link.neighbour.clone(), link.cost))
                .collect();
            topology.edges.insert(adv.origin.clone(), links);

            let mut prefixes: Vec<T::Prefix> = adv
                .prefixes
                .iter()
                .cloned()
                .chain(adv.links.iter().filter_map(|link| link.prefix.clone()))
                .collect();
            prefixes.sort();
            prefixes.dedup();
            topology.prefixes.insert(adv.origin.clone(), prefixes);
        }
        topology
    }

    pub fn edges_from(&self, node: &T::NodeAddress) -> &[(T::NodeAddress, LinkCost)] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_cost(&self, from: &T::NodeAddress, to: &T::NodeAddress) -> Option<LinkCost> {
        self.edges_from(from)
            .iter()
            .find(|(neigh, _)| neigh == to)
            .map(|(_, cost)| *cost)
    }

    pub fn has_edge(&self, from: &T::NodeAddress, to: &T::NodeAddress) -> bool {
        self.edge_cost(from, to).is_some()
    }

    pub fn prefixes_of(&self, node: &T::NodeAddress) -> &[T::Prefix] {
        self.prefixes.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every router that is either advertised or referenced by an advertisement
    pub fn nodes(&self) -> BTreeSet<T::NodeAddress> {
        self.edges
            .iter()
            .flat_map(|(origin, links)| {
                std::iter::once(origin.clone()).chain(links.iter().map(|(n, _)| n.clone()))
            })
            .collect()
    }

    /// Dijkstra from `source`.
    ///
    /// When several paths share the minimal cost, the one whose first hop (then parent) sorts
    /// lowest wins, so the result only depends on the graph. Unreachable routers are omitted.
    /// Equal distances leave the frontier lowest first hop first, which keeps the first hop
    /// tie-break exact across zero cost links. Parents only compete among routers settled earlier.
    pub fn shortest_paths(&self, source: &T::NodeAddress) -> ShortestPaths<T> {
        struct Candidate<A> {
            dist: f64,
            first_hop: Option<A>,
            parent: Option<A>,
        }

        let mut best: BTreeMap<T::NodeAddress, Candidate<T::NodeAddress>> = BTreeMap::new();
        let mut settled: BTreeSet<T::NodeAddress> = BTreeSet::new();
        let mut frontier = BinaryHeap::new();

        best.insert(
            source.clone(),
            Candidate {
                dist: 0.0,
                first_hop: None,
                parent: None,
            },
        );
        frontier.push(Reverse((Distance(0.0), None, source.clone())));

        while let Some(Reverse((Distance(dist), _, node))) = frontier.pop() {
            if !settled.insert(node.clone()) {
                continue;
            }
            let node_first_hop = best.get(&node).and_then(|c| c.first_hop.clone());

            for (next, cost) in self.edges_from(&node) {
                if settled.contains(next) {
                    continue;
                }
                let new_dist = dist + cost.value();
                let via = node_first_hop.clone().unwrap_or_else(|| next.clone());

                let better = match best.get(next) {
                    None => true,
                    Some(cand) => {
                        new_dist < cand.dist
                            || (new_dist == cand.dist
                                && (Some(&via), Some(&node))
                                    < (cand.first_hop.as_ref(), cand.parent.as_ref()))
                    }
                };
                if better {
                    frontier.push(Reverse((Distance(new_dist), Some(via.clone()), next.clone())));
                    best.insert(
                        next.clone(),
                        Candidate {
                            dist: new_dist,
                            first_hop: Some(via),
                            parent: Some(node.clone()),
                        },
                    );
                }
            }
        }

        let entries = best
            .into_iter()
            .filter_map(|(node, cand)| {
                Some((
                    node,
                    PathEntry {
                        cost: cand.dist,
                        first_hop: cand.first_hop?,
                        parent: cand.parent?,
                    },
                ))
            })
            .collect();
        ShortestPaths { entries }
    }
}

#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub struct PathEntry<T: RoutingSystem + ?Sized> {
    /// cumulative cost from the source
    pub cost: f64,
    /// the adjacent router on the path
    pub first_hop: T::NodeAddress,
    /// the router right before the destination on the path
    pub parent: T::NodeAddress,
}

/// Result of a path computation, one entry per reachable router other than the source
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()), Default(bound()))]
pub struct ShortestPaths<T: RoutingSystem + ?Sized> {
    entries: BTreeMap<T::NodeAddress, PathEntry<T>>,
}

impl<T: RoutingSystem + ?Sized> ShortestPaths<T> {
    pub fn get(&self, dest: &T::NodeAddress) -> Option<&PathEntry<T>> {
        self.entries.get(dest)
    }

    pub fn next_hop(&self, dest: &T::NodeAddress) -> Option<&T::NodeAddress> {
        self.entries.get(dest).map(|e| &e.first_hop)
    }

    pub fn cost_to(&self, dest: &T::NodeAddress) -> Option<f64> {
        self.entries.get(dest).map(|e| e.cost)
    }

    /// Routers along the path, excluding the source and including `dest`
    pub fn path_to(&self, dest: &T::NodeAddress) -> Vec<T::NodeAddress> {
        let mut path = Vec::new();
        let mut cur = dest.clone();
        while let Some(entry) = self.entries.get(&cur) {
            path.push(cur.clone());
            if path.len() > self.entries.len() {
                break;
            }
            cur = entry.parent.clone();
        }
        path.reverse();
        path
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T::NodeAddress, &PathEntry<T>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
