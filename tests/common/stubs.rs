//! Stub collaborators for driving a `TradeSession` without a server.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use trade_session::{
    AppId, AssetId, Command, Config, ContextId, InventoryView, Snapshot, StatusCursor,
    TradeTransport,
};

/// An inventory item: which asset and what it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubItem {
    pub asset_id: AssetId,
    pub defindex: u32,
}

/// Schema entry for a `StubItem`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubSchema {
    pub name: String,
}

pub struct StubConfig;

impl Config for StubConfig {
    type PartyId = u64;
    type Item = StubItem;
    type SchemaItem = StubSchema;
}

/// In-memory inventory; every item's schema name is derived from its defindex.
#[derive(Debug, Clone, Default)]
pub struct StubInventory {
    items: BTreeMap<AssetId, StubItem>,
}

impl StubInventory {
    pub fn with_items(items: impl IntoIterator<Item = (u64, u32)>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|(asset, defindex)| {
                    let asset_id = AssetId::new(asset);
                    (asset_id, StubItem { asset_id, defindex })
                })
                .collect(),
        }
    }
}

impl InventoryView<StubConfig> for StubInventory {
    fn item(&self, asset_id: AssetId) -> Option<StubItem> {
        self.items.get(&asset_id).cloned()
    }

    fn schema_item(&self, item: &StubItem) -> Option<StubSchema> {
        Some(StubSchema {
            name: format!("defindex {}", item.defindex),
        })
    }
}

/// What the scripted server will answer, and what it was asked.
#[derive(Debug, Default)]
pub struct Script {
    /// Answers to `fetch_status`, in order; `None` entries are transient failures.
    /// Once empty every fetch fails.
    pub snapshots: VecDeque<Option<Snapshot<u64>>>,
    /// Answers to `send_command`, in order. Once empty `accept_commands` applies.
    pub command_results: VecDeque<bool>,
    pub accept_commands: bool,
    pub public: BTreeMap<(AppId, ContextId), StubInventory>,
    pub private: BTreeMap<(AppId, ContextId), StubInventory>,

    pub status_requests: Vec<StatusCursor>,
    pub commands: Vec<Command>,
    pub public_fetches: usize,
    pub private_fetches: usize,
}

/// Transport answering from a shared [`Script`]. Clones share the script, so a
/// test keeps one handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// A transport whose server accepts every command.
    pub fn accepting() -> Self {
        let transport = Self::default();
        transport.script.lock().accept_commands = true;
        transport
    }

    pub fn push_snapshot(&self, snapshot: Snapshot<u64>) {
        self.script.lock().snapshots.push_back(Some(snapshot));
    }

    pub fn push_failure(&self) {
        self.script.lock().snapshots.push_back(None);
    }

    pub fn push_command_result(&self, accepted: bool) {
        self.script.lock().command_results.push_back(accepted);
    }

    pub fn set_accept_commands(&self, accept: bool) {
        self.script.lock().accept_commands = accept;
    }

    pub fn add_public_inventory(&self, app_id: AppId, context_id: ContextId, inv: StubInventory) {
        self.script.lock().public.insert((app_id, context_id), inv);
    }

    pub fn add_private_inventory(&self, app_id: AppId, context_id: ContextId, inv: StubInventory) {
        self.script.lock().private.insert((app_id, context_id), inv);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.script.lock().commands.clone()
    }

    pub fn command_count(&self) -> usize {
        self.script.lock().commands.len()
    }

    pub fn status_requests(&self) -> Vec<StatusCursor> {
        self.script.lock().status_requests.clone()
    }

    pub fn public_fetches(&self) -> usize {
        self.script.lock().public_fetches
    }

    pub fn private_fetches(&self) -> usize {
        self.script.lock().private_fetches
    }
}

impl TradeTransport<StubConfig> for ScriptedTransport {
    fn fetch_status(&mut self, cursor: &StatusCursor) -> Option<Snapshot<u64>> {
        let mut script = self.script.lock();
        script.status_requests.push(*cursor);
        script.snapshots.pop_front().flatten()
    }

    fn send_command(&mut self, command: &Command) -> bool {
        let mut script = self.script.lock();
        script.commands.push(command.clone());
        let fallback = script.accept_commands;
        script.command_results.pop_front().unwrap_or(fallback)
    }

    fn fetch_foreign_inventory(
        &mut self,
        _party: &u64,
        app_id: AppId,
        context_id: ContextId,
    ) -> Option<Box<dyn InventoryView<StubConfig>>> {
        let mut script = self.script.lock();
        script.public_fetches += 1;
        let inv = script.public.get(&(app_id, context_id))?.clone();
        Some(Box::new(inv))
    }

    fn fetch_private_inventory(
        &mut self,
        _party: &u64,
        app_id: AppId,
        context_id: ContextId,
    ) -> Option<Box<dyn InventoryView<StubConfig>>> {
        let mut script = self.script.lock();
        script.private_fetches += 1;
        let inv = script.private.get(&(app_id, context_id))?.clone();
        Some(Box::new(inv))
    }
}
