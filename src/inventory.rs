//! Lazily fetched inventories of the remote party.
//!
//! Inventories are keyed by `(app, context)` and fetched on first use. Only
//! successful fetches are cached, so a transient failure is retried the next time
//! an item from that namespace shows up.

use std::collections::BTreeMap;

use tracing::trace;

use crate::{AppId, Config, ContextId, InventoryView, TradeTransport};

type Namespace = (AppId, ContextId);

/// Cache of the remote party's public and private inventories.
pub struct InventoryCache<T: Config> {
    public: BTreeMap<Namespace, Box<dyn InventoryView<T>>>,
    private: BTreeMap<Namespace, Box<dyn InventoryView<T>>>,
}

impl<T: Config> InventoryCache<T> {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            public: BTreeMap::new(),
            private: BTreeMap::new(),
        }
    }

    /// The public inventory of `owner` in `(app_id, context_id)`, fetching it on
    /// first use.
    pub fn public(
        &mut self,
        transport: &mut dyn TradeTransport<T>,
        owner: &T::PartyId,
        app_id: AppId,
        context_id: ContextId,
    ) -> Option<&dyn InventoryView<T>> {
        let key = (app_id, context_id);
        if !self.public.contains_key(&key) {
            trace!(%app_id, %context_id, "fetching public inventory");
            let fetched = transport.fetch_foreign_inventory(owner, app_id, context_id)?;
            self.public.insert(key, fetched);
        }
        self.public.get(&key).map(|inv| &**inv)
    }

    /// The private inventory of `owner` in `(app_id, context_id)`, fetching it on
    /// first use.
    pub fn private(
        &mut self,
        transport: &mut dyn TradeTransport<T>,
        owner: &T::PartyId,
        app_id: AppId,
        context_id: ContextId,
    ) -> Option<&dyn InventoryView<T>> {
        let key = (app_id, context_id);
        if !self.private.contains_key(&key) {
            trace!(%app_id, %context_id, "fetching private inventory");
            let fetched = transport.fetch_private_inventory(owner, app_id, context_id)?;
            self.private.insert(key, fetched);
        }
        self.private.get(&key).map(|inv| &**inv)
    }

    /// Number of cached public inventories.
    #[must_use]
    pub fn public_len(&self) -> usize {
        self.public.len()
    }

    /// Number of cached private inventories.
    #[must_use]
    pub fn private_len(&self) -> usize {
        self.private.len()
    }
}

impl<T: Config> Default for InventoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Config> std::fmt::Debug for InventoryCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryCache")
            .field("public", &self.public.keys().collect::<Vec<_>>())
            .field("private", &self.private.keys().collect::<Vec<_>>())
            .finish()
    }
}
