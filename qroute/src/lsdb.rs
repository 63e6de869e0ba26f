use std::collections::BTreeMap;

use educe::Educe;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::concepts::packet::Advertisement;
use crate::framework::RoutingSystem;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    /// the advertisement is now the stored one for its origin
    Installed { previous: Option<u64> },
    /// the stored advertisement is as new or newer, nothing changed
    Stale { stored: u64 },
}

/// Latest advertisement of every known origin, including our own.
///
/// Sequence numbers per origin only ever go up: an advertisement that does not strictly
/// exceed the stored one is rejected without touching the database.
#[serde_as]
#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()), Default(bound()))]
#[serde(bound = "")]
pub struct LinkStateDatabase<T: RoutingSystem + ?Sized> {
    #[serde_as(as = "Vec<(_, _)>")]
    entries: BTreeMap<T::NodeAddress, Advertisement<T>>,
}

impl<T: RoutingSystem + ?Sized> LinkStateDatabase<T> {
    pub fn install(&mut self, adv: Advertisement<T>) -> InstallOutcome {
        let stored = self.seqno_for(&adv.origin);
        if let Some(stored) = stored {
            if adv.seqno <= stored {
                return InstallOutcome::Stale { stored };
            }
        }
        self.entries.insert(adv.origin.clone(), adv);
        InstallOutcome::Installed { previous: stored }
    }

    pub fn get(&self, origin: &T::NodeAddress) -> Option<&Advertisement<T>> {
        self.entries.get(origin)
    }

    pub fn seqno_for(&self, origin: &T::NodeAddress) -> Option<u64> {
        self.entries.get(origin).map(|adv| adv.seqno)
    }

    /// Advertisements in origin order
    pub fn iter(&self) -> impl Iterator<Item = &Advertisement<T>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
