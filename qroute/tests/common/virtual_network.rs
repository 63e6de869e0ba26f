use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use qroute::concepts::neighbour::{AdjacencyState, Neighbour};
use qroute::concepts::packet::Packet;
use qroute::cost::{CostModel, LinkCost};
use qroute::framework::{ProtocolParams, RoutingSystem};
use qroute::router::Router;
use qroute::spf::Topology;

pub struct VirtualSystem {}

impl RoutingSystem for VirtualSystem {
    type NodeAddress = String;
    type PhysicalAddress = String;
    type Prefix = String;
    type InterfaceId = String;
}

pub fn phy(node: &str) -> String {
    format!("phy-{node}")
}

pub fn net(node: &str) -> String {
    format!("net-{node}")
}

pub fn cost(value: f64) -> LinkCost {
    LinkCost::try_from(value).unwrap()
}

/// Routers wired together in memory. Every tick advances the clock by one hello interval,
/// delivers what was sent during the previous tick and lets every router run its timers.
pub struct VirtualNetwork {
    pub routers: Vec<Router<VirtualSystem>>,
    /// destination -> (sender, packet)
    pub packets: BTreeMap<String, Vec<(String, Packet<VirtualSystem>)>>,
    pub now: Instant,
    /// routers that neither send nor receive anything
    pub silenced: BTreeSet<String>,
}

impl VirtualNetwork {
    /// `links` are undirected `(a, b, cost)`, every router advertises the stub prefix `net-<id>`
    pub fn create(nodes: &[&str], links: &[(&str, &str, f64)]) -> VirtualNetwork {
        let routers = nodes
            .iter()
            .map(|id| {
                let mut router = Router::new(
                    id.to_string(),
                    ProtocolParams::default(),
                    CostModel::default(),
                );
                router.prefixes = vec![net(id)];
                for (a, b, metric) in links {
                    if a == id || b == id {
                        let nid = if a == id { b } else { a };
                        router
                            .neighbours
                            .insert(Neighbour::new(nid.to_string(), phy(nid)));
                        router.update_link_cost(&nid.to_string(), cost(*metric));
                    }
                }
                router
            })
            .collect();
        VirtualNetwork {
            routers,
            packets: BTreeMap::new(),
            now: Instant::now(),
            silenced: BTreeSet::new(),
        }
    }

    pub fn hello_interval(&self) -> Duration {
        ProtocolParams::default().hello_interval
    }

    pub fn get_node(&mut self, node: &str) -> &mut Router<VirtualSystem> {
        self.routers
            .iter_mut()
            .find(|r| r.address == node)
            .unwrap_or_else(|| panic!("No node {node} found"))
    }

    pub fn node(&self, node: &str) -> &Router<VirtualSystem> {
        self.routers
            .iter()
            .find(|r| r.address == node)
            .unwrap_or_else(|| panic!("No node {node} found"))
    }

    /// Changes the cost of a link on both of its ends
    pub fn set_link_cost(&mut self, a: &str, b: &str, metric: f64) {
        self.get_node(a).update_link_cost(&b.to_string(), cost(metric));
        self.get_node(b).update_link_cost(&a.to_string(), cost(metric));
        self.flush_packets();
    }

    pub fn silence(&mut self, node: &str) {
        self.silenced.insert(node.to_string());
        self.packets.remove(node);
        for queued in self.packets.values_mut() {
            queued.retain(|(from, _)| from != node);
        }
    }

    /// Replaces `node` with a fresh router that only keeps its configuration, as after a process restart.
    /// It also stops being silenced.
    pub fn restart(&mut self, node: &str) {
        let old = self.get_node(node);
        let mut router = Router::new(old.address.clone(), old.params.clone(), old.cost_model);
        router.prefixes = old.prefixes.clone();
        let links: Vec<(String, String, Option<LinkCost>)> = old
            .neighbours
            .iter()
            .map(|n| (n.addr.clone(), n.addr_phy.clone(), n.link_cost))
            .collect();
        for (addr, addr_phy, link_cost) in links {
            router.neighbours.insert(Neighbour::new(addr.clone(), addr_phy));
            if let Some(link_cost) = link_cost {
                router.update_link_cost(&addr, link_cost);
            }
        }
        *old = router;
        self.silenced.remove(node);
    }

    pub fn adjacency(&self, cur: &str, neigh: &str) -> AdjacencyState {
        self.node(cur)
            .neighbours
            .get(&neigh.to_string())
            .unwrap_or_else(|| panic!("{neigh} is not a neighbour of {cur}"))
            .state
    }

    pub fn get_next_hop(&self, cur: &str, dest: &str) -> String {
        self.node(cur)
            .paths
            .next_hop(&dest.to_string())
            .unwrap_or_else(|| panic!("No route found to {dest}"))
            .to_string()
    }

    pub fn get_metric_to(&self, cur: &str, dest: &str) -> f64 {
        self.node(cur)
            .paths
            .cost_to(&dest.to_string())
            .unwrap_or_else(|| panic!("No route found to {dest}"))
    }

    pub fn reachable(&self, cur: &str, dest: &str) -> bool {
        self.node(cur).paths.get(&dest.to_string()).is_some()
    }

    pub fn topology(&self, cur: &str) -> Topology<VirtualSystem> {
        Topology::from_lsdb(&self.node(cur).lsdb)
    }

    pub fn flush_packets(&mut self) {
        for router in &mut self.routers {
            let silenced = self.silenced.contains(&router.address);
            for packet in router.outbound_packets.drain(..) {
                if silenced || self.silenced.contains(&packet.dest) {
                    continue;
                }
                self.packets
                    .entry(packet.dest)
                    .or_default()
                    .push((router.address.clone(), packet.packet));
            }
        }
    }

    pub fn tick(&mut self) {
        self.now += self.hello_interval();
        let now = self.now;

        let packets = std::mem::take(&mut self.packets);
        for (node, packets) in packets {
            if let Some(router) = self.routers.iter_mut().find(|r| r.address == node) {
                for (from, packet) in packets {
                    router.handle_packet(&packet, &from, now);
                }
            }
        }
        for router in &mut self.routers {
            if self.silenced.contains(&router.address) {
                continue;
            }
            router.send_hello();
            router.sweep_neighbours(now);
            if router.needs_recompute() {
                router.recompute();
            }
        }
        self.flush_packets()
    }

    pub fn tick_n(&mut self, times: i32) {
        for _ in 0..times {
            self.tick();
        }
    }
}
