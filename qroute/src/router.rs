use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::concepts::neighbour::{AdjacencyState, Neighbour};
use crate::concepts::packet::{Advertisement, Hello, LinkAdvert, OutboundPacket, Packet};
use crate::concepts::route::{RouteEntry, RoutingTable};
use crate::config::{RouteMapping, RouterConfig};
use crate::cost::{CostModel, LinkCost};
use crate::feedback::{ConfigError, RoutingWarning};
use crate::framework::{Prober, ProtocolParams, RoutingSystem};
use crate::lsdb::{InstallOutcome, LinkStateDatabase};
use crate::metrics::{BandwidthCatalogue, MetricsCollector, ProbeReport};
use crate::neighbours::{AdjacencyChange, HelloOutcome, NeighbourTable};
use crate::spf::{ShortestPaths, Topology};
use crate::util::Distance;

/// Counters kept for diagnosing a router that does not converge
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    pub malformed: u64,
    pub unauthorised: u64,
    pub stale_advertisements: u64,
    pub accepted_advertisements: u64,
    pub originated_advertisements: u64,
}

/// The protocol engine of a single router.
///
/// The router never touches the network or a clock itself: inbound packets, probe results and
/// timer ticks are fed in, and packets to send pile up in `outbound_packets` for the caller to
/// drain. A single owner drives it, which serialises every LSDB write.
pub struct Router<T: RoutingSystem + ?Sized> {
    pub address: T::NodeAddress,
    pub params: ProtocolParams,
    pub cost_model: CostModel,
    pub neighbours: NeighbourTable<T>,
    pub metrics: MetricsCollector<T>,
    pub lsdb: LinkStateDatabase<T>,
    /// stub prefixes of this router
    pub prefixes: Vec<T::Prefix>,
    pub mappings: BTreeMap<T::NodeAddress, RouteMapping<T>>,
    pub paths: ShortestPaths<T>,
    pub table: RoutingTable<T>,
    /// seqno of our latest advertisement
    pub seqno: u64,
    pub outbound_packets: Vec<OutboundPacket<T>>,
    pub warnings: Vec<RoutingWarning<T>>,
    pub stats: RouterStats,
    topology_dirty: bool,
}

impl<T: RoutingSystem + ?Sized> Router<T> {
    pub fn new(address: T::NodeAddress, params: ProtocolParams, cost_model: CostModel) -> Self {
        let metrics = MetricsCollector::new(
            address.clone(),
            params.probe_count,
            params.probe_interval,
            BandwidthCatalogue::default(),
        );
        Self {
            address,
            params,
            cost_model,
            neighbours: NeighbourTable::default(),
            metrics,
            lsdb: LinkStateDatabase::default(),
            prefixes: Vec::new(),
            mappings: BTreeMap::new(),
            paths: ShortestPaths::default(),
            table: RoutingTable::default(),
            seqno: 0,
            outbound_packets: Vec::new(),
            warnings: Vec::new(),
            stats: RouterStats::default(),
            topology_dirty: false,
        }
    }

    /// Builds a router from a validated configuration
    pub fn from_config(config: &RouterConfig<T>) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = config.protocol_params();
        let mut router = Self::new(config.router_id.clone(), params, config.cost_model()?);
        router.metrics = MetricsCollector::new(
            config.router_id.clone(),
            config.probe_count,
            config.probe_interval,
            config.bandwidth_catalogue(),
        );
        for neigh in &config.neighbours {
            router.neighbours.insert(
                Neighbour::new(neigh.id.clone(), neigh.ip.clone())
                    .with_interface(neigh.interface.clone())
                    .with_link_prefix(neigh.prefix.clone()),
            );
            if let Some(mbps) = neigh.bandwidth {
                router.metrics.set_bandwidth(&neigh.id, mbps);
            }
        }
        router.prefixes = config.prefixes.clone();
        router.mappings = config.route_mappings.clone().unwrap_or_default();
        Ok(router)
    }

    // region Hello

    /// Queues a hello for every configured neighbour, whatever its state
    pub fn send_hello(&mut self) {
        let hello = Hello {
            router: self.address.clone(),
            neighbours: self.neighbours.heard(),
            prefixes: self.prefixes.clone(),
        };
        let dests: Vec<T::NodeAddress> = self.neighbours.iter().map(|n| n.addr.clone()).collect();
        for dest in dests {
            self.outbound_packets.push(OutboundPacket {
                dest,
                packet: Packet::Hello(hello.clone()),
            });
        }
    }

    /// Marks every neighbour that went silent as Down
    pub fn sweep_neighbours(&mut self, now: Instant) {
        let changes = self.neighbours.sweep(now, self.params.dead_interval());
        self.apply_adjacency_changes(changes);
    }

    fn apply_adjacency_changes(&mut self, changes: Vec<AdjacencyChange<T>>) {
        let mut originate = false;
        for change in changes {
            info!(
                "Adjacency {} -> {}: {} -> {}",
                json!(self.address),
                json!(change.neighbour),
                change.from,
                change.to
            );
            if change.to == AdjacencyState::TwoWay {
                self.send_database(&change.neighbour);
            }
            originate |= change.affects_topology();
        }
        if originate {
            self.originate();
        }
    }

    /// Hands a freshly adjacent neighbour every advertisement we know, so it does not have to wait for refreshes.
    /// This includes the neighbour's own, which is how a restarted router learns its previous seqno.
    fn send_database(&mut self, dest: &T::NodeAddress) {
        for adv in self.lsdb.iter() {
            self.outbound_packets.push(OutboundPacket {
                dest: dest.clone(),
                packet: Packet::Advertisement(adv.clone()),
            });
        }
    }

    // endregion

    // region Metrics

    /// Probes a neighbour through `prober` and feeds the result into the link cost
    pub fn measure_link<P: Prober<T> + ?Sized>(
        &mut self,
        neigh: &T::NodeAddress,
        prober: &mut P,
        now: Instant,
    ) -> Option<LinkCost> {
        let target = self.neighbours.get(neigh)?.addr_phy.clone();
        self.metrics.measure(neigh, &target, prober, now);
        self.refresh_link_cost(neigh)
    }

    /// Feeds a probe report gathered elsewhere into the link cost
    pub fn handle_probe_report(
        &mut self,
        neigh: &T::NodeAddress,
        report: &ProbeReport,
        now: Instant,
    ) -> Option<LinkCost> {
        if !self.neighbours.contains(neigh) {
            warn!("Ignoring probe report for unknown neighbour {}", json!(neigh));
            return None;
        }
        self.metrics.record(neigh, report, now);
        self.refresh_link_cost(neigh)
    }

    fn refresh_link_cost(&mut self, neigh: &T::NodeAddress) -> Option<LinkCost> {
        let sample = self.metrics.latest(neigh)?;
        let breakdown = self.cost_model.breakdown(sample);
        debug!(
            "Cost of {} -> {}: {}",
            json!(self.address),
            json!(neigh),
            json!(breakdown)
        );
        self.update_link_cost(neigh, breakdown.total);
        Some(breakdown.total)
    }

    /// Sets the cost of the link towards `neigh`.
    /// Re-originates when the cost moved more than the hysteresis margin away from the advertised one.
    pub fn update_link_cost(&mut self, neigh: &T::NodeAddress, cost: LinkCost) {
        let hysteresis = self.params.cost_hysteresis;
        let Some(neighbour) = self.neighbours.get_mut(neigh) else {
            return;
        };
        neighbour.link_cost = Some(cost);
        if !neighbour.is_two_way() {
            return;
        }
        let significant = match neighbour.advertised_cost {
            Some(advertised) => (cost.value() - advertised.value()).abs() > hysteresis,
            None => true,
        };
        if significant {
            info!(
                "Link {} -> {} cost is now {} (advertised {:?}), re-originating",
                json!(self.address),
                json!(neigh),
                cost,
                neighbour.advertised_cost.map(LinkCost::value)
            );
            self.originate();
        }
    }

    // endregion

    // region Advertisements

    /// Builds a new self advertisement with the next seqno and floods it to every TwoWay neighbour
    pub fn originate(&mut self) {
        self.seqno = self.seqno.saturating_add(1);

        let mut links = Vec::new();
        for neigh in self.neighbours.iter_mut() {
            if !neigh.is_two_way() {
                continue;
            }
            if let Some(cost) = neigh.link_cost {
                neigh.advertised_cost = Some(cost);
                links.push(LinkAdvert {
                    neighbour: neigh.addr.clone(),
                    cost,
                    prefix: neigh.link_prefix.clone(),
                });
            }
        }

        let adv = Advertisement {
            origin: self.address.clone(),
            seqno: self.seqno,
            age: 0,
            links,
            prefixes: self.prefixes.clone(),
        };
        info!(
            "Originating advertisement {} seqno={} with {} links",
            json!(self.address),
            self.seqno,
            adv.links.len()
        );
        if let InstallOutcome::Stale { stored } = self.lsdb.install(adv.clone()) {
            // only possible if someone else forged our origin with a seqno above ours
            warn!("Own advertisement seqno={} is below stored seqno={stored}", self.seqno);
            return;
        }
        self.stats.originated_advertisements += 1;
        self.topology_dirty = true;
        self.flood(&adv, None);
    }

    /// Queues `adv` for every TwoWay neighbour except the one it came from and its origin
    fn flood(&mut self, adv: &Advertisement<T>, from: Option<&T::NodeAddress>) {
        let dests: Vec<T::NodeAddress> = self
            .neighbours
            .two_way()
            .filter(|n| Some(&n.addr) != from && n.addr != adv.origin)
            .map(|n| n.addr.clone())
            .collect();
        for dest in dests {
            self.outbound_packets.push(OutboundPacket {
                dest,
                packet: Packet::Advertisement(adv.clone()),
            });
        }
    }

    fn handle_advertisement(&mut self, adv: &Advertisement<T>, from: &T::NodeAddress) {
        if adv.origin == self.address {
            self.handle_own_advertisement(adv);
            return;
        }

        let mut forwarded = adv.clone();
        forwarded.age = forwarded.age.saturating_add(1);
        match self.lsdb.install(forwarded.clone()) {
            InstallOutcome::Installed { previous } => {
                debug!(
                    "Accepted advertisement {} seqno={} (previous {:?}) from {}",
                    json!(adv.origin),
                    adv.seqno,
                    previous,
                    json!(from)
                );
                self.stats.accepted_advertisements += 1;
                self.topology_dirty = true;
                self.flood(&forwarded, Some(from));
            }
            InstallOutcome::Stale { stored } => {
                trace!(
                    "Discarded advertisement {} seqno={}, stored seqno={stored}",
                    json!(adv.origin),
                    adv.seqno
                );
                self.stats.stale_advertisements += 1;
                if stored > adv.seqno {
                    self.send_newer_copy(&adv.origin, from);
                }
            }
        }
    }

    /// `dest` flooded an advertisement older than ours, so it gets ours back.
    /// When `dest` is the origin itself, this is what makes it resynchronise its seqno.
    fn send_newer_copy(&mut self, origin: &T::NodeAddress, dest: &T::NodeAddress) {
        let Some(stored) = self.lsdb.get(origin) else {
            return;
        };
        debug!(
            "Sending advertisement {} seqno={} back to {}",
            json!(origin),
            stored.seqno,
            json!(dest)
        );
        self.outbound_packets.push(OutboundPacket {
            dest: dest.clone(),
            packet: Packet::Advertisement(stored.clone()),
        });
    }

    /// Our own advertisement came back. Identical copies are normal flooding echoes,
    /// anything at or above our seqno that differs means we lost track of our own seqno.
    fn handle_own_advertisement(&mut self, adv: &Advertisement<T>) {
        let echo = match self.lsdb.get(&self.address) {
            Some(own) => {
                own.seqno == adv.seqno && own.links == adv.links && own.prefixes == adv.prefixes
            }
            None => false,
        };
        if echo || adv.seqno < self.seqno {
            self.stats.stale_advertisements += 1;
            return;
        }
        self.warnings.push(RoutingWarning::DesynchronizedSeqno {
            old_seqno: self.seqno,
            new_seqno: adv.seqno,
        });
        self.seqno = adv.seqno;
        self.originate();
    }

    // endregion

    /// Handles a single packet received from the configured neighbour `from`
    pub fn handle_packet(&mut self, packet: &Packet<T>, from: &T::NodeAddress, now: Instant) {
        if !self.neighbours.contains(from) {
            self.report_unauthorised(from);
            return;
        }
        match packet {
            Packet::Hello(hello) => {
                match self.neighbours.on_hello(&self.address, from, hello, now) {
                    HelloOutcome::Accepted(changes) => self.apply_adjacency_changes(changes),
                    HelloOutcome::Unauthorised => self.report_unauthorised(from),
                    HelloOutcome::Mismatched => self.report_malformed(format!(
                        "hello from {} claims to be from {}",
                        json!(from),
                        json!(hello.router)
                    )),
                }
            }
            Packet::Advertisement(adv) => self.handle_advertisement(adv, from),
        }
    }

    pub fn report_malformed(&mut self, reason: String) {
        self.stats.malformed += 1;
        self.warnings.push(RoutingWarning::MalformedPacket { reason });
    }

    pub fn report_unauthorised(&mut self, sender: &T::NodeAddress) {
        self.stats.unauthorised += 1;
        self.warnings.push(RoutingWarning::UnauthorisedSender {
            sender: sender.clone(),
        });
    }

    // region Route Computation

    /// Whether the LSDB changed since the last recompute
    pub fn needs_recompute(&self) -> bool {
        self.topology_dirty
    }

    /// Recomputes shortest paths and rebuilds the routing table from scratch.
    /// Returns whether the table changed.
    pub fn recompute(&mut self) -> bool {
        let topology = Topology::from_lsdb(&self.lsdb);
        self.paths = topology.shortest_paths(&self.address);
        let table = self.build_table(&topology);
        self.topology_dirty = false;

        debug!(
            "Recomputed {}: {} routers reachable, {} routes",
            json!(self.address),
            self.paths.len(),
            table.len()
        );
        if table == self.table {
            return false;
        }
        self.table = table;
        true
    }

    fn build_table(&self, topology: &Topology<T>) -> RoutingTable<T> {
        let local: HashSet<&T::Prefix> = topology
            .prefixes_of(&self.address)
            .iter()
            .chain(self.prefixes.iter())
            .collect();

        // prefix -> (cost, owner, interface override)
        let mut best: BTreeMap<T::Prefix, (Distance, T::NodeAddress, Option<T::InterfaceId>)> =
            BTreeMap::new();
        for (dest, path) in self.paths.iter() {
            for prefix in topology.prefixes_of(dest) {
                if local.contains(prefix) {
                    continue;
                }
                let candidate = (Distance(path.cost), dest.clone(), None);
                match best.get(prefix) {
                    Some((cost, owner, _)) if (cost, owner) <= (&candidate.0, &candidate.1) => {}
                    _ => {
                        best.insert(prefix.clone(), candidate);
                    }
                }
            }
        }
        for (dest, mapping) in &self.mappings {
            if let Some(path) = self.paths.get(dest) {
                best.insert(
                    mapping.prefix.clone(),
                    (Distance(path.cost), dest.clone(), mapping.interface.clone()),
                );
            }
        }

        let mut table = RoutingTable::default();
        for (prefix, (cost, dest, itf)) in best {
            let Some(path) = self.paths.get(&dest) else {
                continue;
            };
            let Some(neigh) = self.neighbours.get(&path.first_hop) else {
                debug!(
                    "Cannot resolve next hop {} for {prefix}, skipping",
                    json!(path.first_hop)
                );
                continue;
            };
            table.entries.insert(
                prefix.clone(),
                RouteEntry {
                    prefix,
                    destination: dest,
                    next_hop: neigh.addr.clone(),
                    next_hop_phy: neigh.addr_phy.clone(),
                    itf: itf.or_else(|| neigh.itf.clone()),
                    metric: cost.0,
                },
            );
        }
        table
    }

    // endregion
}
