//! Applies version-changed snapshots to the offer mirrors.
//!
//! Both mirrors are replaced wholesale, never patched: a missed incremental
//! update would otherwise stay wrong forever. A party section the server left
//! out counts as an empty offer.

use tracing::debug;

use crate::ledger::OfferLedger;
use crate::snapshot::{OfferVec, Snapshot};
use crate::ItemRef;

/// Sizes of the offers after a replace, for logging and tests.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Items the server confirms for the local party.
    pub local_items: usize,
    /// Items the server confirms for the remote party.
    pub remote_items: usize,
}

/// Holds the remote party's confirmed offer and refreshes both mirrors.
#[derive(Debug, Clone, Default)]
pub struct SnapshotReconciler {
    remote_offer: OfferVec,
}

impl SnapshotReconciler {
    /// A reconciler with an empty remote offer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The remote party's confirmed offer, in server order.
    #[must_use]
    pub fn remote_offer(&self) -> &[ItemRef] {
        &self.remote_offer
    }

    /// Replaces the local confirmed mirror in `ledger` and the remote offer.
    pub fn apply<P>(
        &mut self,
        ledger: &mut OfferLedger,
        snapshot: &Snapshot<P>,
    ) -> ReconcileSummary {
        let local = snapshot
            .me
            .as_ref()
            .map(|me| me.assets.clone())
            .unwrap_or_default();
        let remote = snapshot
            .them
            .as_ref()
            .map(|them| them.assets.clone())
            .unwrap_or_default();

        let summary = ReconcileSummary {
            local_items: local.len(),
            remote_items: remote.len(),
        };
        ledger.replace_confirmed(local);
        self.remote_offer = remote;
        debug!(
            version = %snapshot.version,
            local_items = summary.local_items,
            remote_items = summary.remote_items,
            "replaced offer mirrors"
        );
        summary
    }
}
