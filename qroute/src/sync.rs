use std::collections::{BTreeMap, BTreeSet};

use educe::Educe;
use log::{debug, info, warn};
use serde::Serialize;

use crate::concepts::route::{RouteEntry, RoutingTable};
use crate::framework::{KernelRoutes, RoutingSystem};

/// Kernel mutations needed to go from one table to another.
/// Removals are applied before additions.
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()), Default(bound()))]
pub struct RouteDiff<T: RoutingSystem + ?Sized> {
    pub removals: Vec<T::Prefix>,
    pub additions: Vec<RouteEntry<T>>,
}

impl<T: RoutingSystem + ?Sized> RouteDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.additions.is_empty()
    }
}

/// Entries only in `new` are added, entries only in `previous` are removed,
/// and an entry whose next-hop changed is removed and then added again.
pub fn diff<T: RoutingSystem + ?Sized>(
    new: &BTreeMap<T::Prefix, RouteEntry<T>>,
    previous: &BTreeMap<T::Prefix, RouteEntry<T>>,
) -> RouteDiff<T> {
    let mut diff = RouteDiff::default();
    for (prefix, old) in previous {
        match new.get(prefix) {
            None => diff.removals.push(prefix.clone()),
            Some(entry) if !entry.same_forwarding(old) => {
                diff.removals.push(prefix.clone());
                diff.additions.push(entry.clone());
            }
            Some(_) => {}
        }
    }
    for (prefix, entry) in new {
        if !previous.contains_key(prefix) {
            diff.additions.push(entry.clone());
        }
    }
    diff
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn mutations(&self) -> usize {
        self.added + self.removed
    }
}

/// Keeps the kernel forwarding table in line with the computed routing table.
///
/// Only prefixes listed in the route mappings are ever touched. Without mappings the router
/// runs in compute-only mode and the kernel is left alone.
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()))]
pub struct RouteSync<T: RoutingSystem + ?Sized> {
    managed: Option<BTreeSet<T::Prefix>>,
    /// what we believe the kernel currently holds, only updated on successful mutations
    installed: BTreeMap<T::Prefix, RouteEntry<T>>,
}

impl<T: RoutingSystem + ?Sized> RouteSync<T> {
    pub fn new(managed: Option<BTreeSet<T::Prefix>>) -> Self {
        Self {
            managed,
            installed: BTreeMap::new(),
        }
    }

    pub fn compute_only() -> Self {
        Self::new(None)
    }

    pub fn is_compute_only(&self) -> bool {
        self.managed.is_none()
    }

    pub fn installed(&self) -> &BTreeMap<T::Prefix, RouteEntry<T>> {
        &self.installed
    }

    /// The part of `table` that should be in the kernel
    pub fn desired(&self, table: &RoutingTable<T>) -> BTreeMap<T::Prefix, RouteEntry<T>> {
        let Some(managed) = &self.managed else {
            return BTreeMap::new();
        };
        table
            .entries
            .iter()
            .filter(|(prefix, _)| managed.contains(*prefix))
            .map(|(prefix, entry)| (prefix.clone(), entry.clone()))
            .collect()
    }

    /// Brings the kernel in line with `table`. Failed mutations are retried on the next call.
    pub fn reconcile<K: KernelRoutes<T> + ?Sized>(
        &mut self,
        table: &RoutingTable<T>,
        kernel: &mut K,
    ) -> SyncReport {
        if self.is_compute_only() {
            return SyncReport::default();
        }
        let diff = diff(&self.desired(table), &self.installed);
        self.apply(diff, kernel)
    }

    /// Applies every mutation independently, a failure never stops the others
    pub fn apply<K: KernelRoutes<T> + ?Sized>(&mut self, diff: RouteDiff<T>, kernel: &mut K) -> SyncReport {
        let mut report = SyncReport::default();
        if diff.is_empty() {
            return report;
        }

        for prefix in diff.removals {
            if !self.installed.contains_key(&prefix) {
                continue;
            }
            match kernel.remove(&prefix) {
                Ok(()) => {
                    info!("Removed route {prefix}");
                    self.installed.remove(&prefix);
                    report.removed += 1;
                }
                Err(err) => {
                    warn!("Failed to remove route {prefix}, will retry: {err:#}");
                    report.failed += 1;
                }
            }
        }

        for entry in diff.additions {
            if let Some(current) = self.installed.get(&entry.prefix) {
                if current.same_forwarding(&entry) {
                    continue;
                }
            }
            match kernel.add(&entry.prefix, &entry.next_hop_phy, entry.itf.as_ref()) {
                Ok(()) => {
                    info!(
                        "Installed route {} via {} ({}), dest {}, metric {:.2}",
                        entry.prefix, entry.next_hop_phy, entry.next_hop, entry.destination, entry.metric
                    );
                    self.installed.insert(entry.prefix.clone(), entry);
                    report.added += 1;
                }
                Err(err) => {
                    warn!(
                        "Failed to install route {} via {}, will retry: {err:#}",
                        entry.prefix, entry.next_hop_phy
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Route sync: {} added, {} removed, {} failed",
            report.added, report.removed, report.failed
        );
        report
    }

    /// Removes every route this router installed, used on shutdown
    pub fn flush<K: KernelRoutes<T> + ?Sized>(&mut self, kernel: &mut K) -> SyncReport {
        let diff = RouteDiff {
            removals: self.installed.keys().cloned().collect(),
            additions: Vec::new(),
        };
        self.apply(diff, kernel)
    }
}
