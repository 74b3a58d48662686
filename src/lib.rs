//! # trade-session
//!
//! Client-side session engine for a turn-less, poll-driven trade negotiation between
//! two parties. Both sides incrementally offer and withdraw items, signal readiness,
//! and accept; the only view of the negotiation is a stream of server status
//! snapshots that may repeat, lag behind or skip entries.
//!
//! A [`TradeSession`] turns those snapshots into a locally consistent view:
//!
//! - snapshots are admitted through a version gate, stale ones are ignored and an
//!   unexplained version jump aborts the session,
//! - remote events are delivered to the application at most once,
//! - the local offer is tracked twice (what we asked for and what the server
//!   confirmed) and both must agree before ready-up or accept is sent,
//! - every remote call goes through a bounded retry executor.
//!
//! The session never schedules anything itself. The application calls
//! [`TradeSession::poll`] on its own cadence and issues commands in between.
//!
//! ```ignore
//! let mut session = SessionBuilder::<MyConfig>::new()
//!     .with_local_party(me)
//!     .with_remote_party(them)
//!     .start_session(transport)?;
//!
//! session.subscribers().on_chat(|text| tracing::info!(text, "peer says"));
//!
//! loop {
//!     if session.poll()? {
//!         // the peer did something, react here
//!     }
//!     if session.state().is_terminal() {
//!         break;
//!     }
//!     std::thread::sleep(POLL_INTERVAL);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
use std::{fmt::Debug, hash::Hash};

pub use error::{InvalidRequestKind, TradeError, TradeResult};
pub use inventory::InventoryCache;
pub use notify::{ItemNotification, NotificationKind, Subscribers, TradeNotification};
pub use retry::{Backoff, Neutral, NoBackoff, RetryExecutor, ThreadSleepBackoff};
pub use sessions::builder::SessionBuilder;
pub use sessions::config::RetryConfig;
pub use sessions::trade_session::TradeSession;
pub use snapshot::{
    EventPayload, EventRecord, OfferVec, PartyStatus, Snapshot, TradeEvent, TradeEventKind,
    TradeStatus,
};

pub mod dispatch;
#[doc(hidden)]
pub mod error;
pub mod event_log;
pub mod inventory;
pub mod ledger;
pub mod notify;
pub mod prelude;
pub mod reconcile;
pub mod retry;
pub mod snapshot;
pub mod telemetry;
pub mod version_gate;
#[doc(hidden)]
pub mod sessions {
    #[doc(hidden)]
    pub mod builder;
    pub mod config;
    #[doc(hidden)]
    pub mod trade_session;
}

// #############
// #  NEWTYPES #
// #############

/// Generation counter of the server-side trade state.
///
/// Every time the server replaces its view of the offers it bumps the version and
/// flags the snapshot as changed. The session only ever moves its own version
/// forward.
///
/// ```
/// use trade_session::Version;
///
/// let v = Version::new(3);
/// assert!(v.next() > v);
/// assert_eq!(Version::ZERO.as_u64(), 0);
/// ```
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version a session starts from before any snapshot was applied.
    pub const ZERO: Version = Version(0);

    /// Creates a version from its raw counter.
    #[inline]
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Version(version)
    }

    /// Returns the raw counter.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The version that directly follows this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Version(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    #[inline]
    fn from(value: u64) -> Self {
        Version(value)
    }
}

/// Cursor into the server's event log. Zero means "nothing seen yet".
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct LogPosition(u64);

impl LogPosition {
    /// Creates a cursor from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(position: u64) -> Self {
        LogPosition(position)
    }

    /// Returns the raw cursor value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` if the cursor is zero, which the server uses for "no cursor".
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for LogPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LogPosition {
    #[inline]
    fn from(value: u64) -> Self {
        LogPosition(value)
    }
}

/// Index of one position in the local party's offer.
///
/// Slots are handed out densely from zero and the lowest free slot is reused
/// after a removal.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Slot(u32);

impl Slot {
    /// Creates a slot from its raw index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Slot(index)
    }

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Slot {
    #[inline]
    fn from(value: u32) -> Self {
        Slot(value)
    }
}

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Default,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Wraps a raw identifier.
            #[inline]
            #[must_use]
            pub const fn new(id: $inner) -> Self {
                $name(id)
            }

            /// Returns the raw identifier.
            #[inline]
            #[must_use]
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                $name(value)
            }
        }
    };
}

id_newtype!(
    /// Identifier of the application (game) an item belongs to.
    AppId(u32)
);
id_newtype!(
    /// Inventory context inside an application.
    ContextId(u64)
);
id_newtype!(
    /// Identifier of a concrete item instance inside an inventory context.
    AssetId(u64)
);

/// Namespace-qualified reference to one item instance.
///
/// Carries identity only; what the item *is* comes from an [`InventoryView`].
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ItemRef {
    /// Owning application.
    #[serde(rename = "appid", deserialize_with = "snapshot::wire::number")]
    pub app_id: AppId,
    /// Inventory context within the application.
    #[serde(rename = "contextid", deserialize_with = "snapshot::wire::number")]
    pub context_id: ContextId,
    /// Item instance.
    #[serde(rename = "assetid", deserialize_with = "snapshot::wire::number")]
    pub asset_id: AssetId,
}

impl ItemRef {
    /// Creates an item reference.
    #[must_use]
    pub const fn new(app_id: AppId, context_id: ContextId, asset_id: AssetId) -> Self {
        Self {
            app_id,
            context_id,
            asset_id,
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.app_id, self.context_id, self.asset_id)
    }
}

// #############
// #   ENUMS   #
// #############

/// A session is always in one of these states. Query it via [`TradeSession::state`].
///
/// ```text
/// NotStarted ──first poll──► Running ──► Completed | Cancelled | Aborted | Closed
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No poll has happened yet.
    NotStarted,
    /// The negotiation is live.
    Running,
    /// The server reported that the trade went through.
    Completed,
    /// The server reported a closing status other than success.
    Cancelled,
    /// A fatal fault (desynchronization or offer mismatch) stopped the session.
    Aborted,
    /// The application abandoned the session via [`TradeSession::close`].
    Closed,
}

impl SessionState {
    /// Returns `true` if no further commands or polls are accepted.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::NotStarted | Self::Running)
    }
}

/// One mutating request sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    /// Put `item` into the local offer at `slot`.
    AddItem {
        /// The item to offer.
        item: ItemRef,
        /// The slot it occupies.
        slot: Slot,
    },
    /// Withdraw `item` from `slot`.
    RemoveItem {
        /// The item to withdraw.
        item: ItemRef,
        /// The slot it currently occupies.
        slot: Slot,
    },
    /// Toggle the local ready flag.
    SetReady {
        /// Desired ready state.
        ready: bool,
        /// The state generation the decision was made against.
        version: Version,
    },
    /// Confirm the trade.
    Accept {
        /// The state generation the decision was made against.
        version: Version,
    },
    /// Cancel the trade.
    Cancel,
    /// Send a chat line to the peer.
    SendMessage {
        /// Message body.
        text: String,
        /// Current event log cursor.
        log_position: LogPosition,
    },
}

impl Command {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddItem { .. } => "add_item",
            Self::RemoveItem { .. } => "remove_item",
            Self::SetReady { .. } => "set_ready",
            Self::Accept { .. } => "accept",
            Self::Cancel => "cancel",
            Self::SendMessage { .. } => "send_message",
        }
    }
}

/// What the session asks the server for on each poll.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct StatusCursor {
    /// Last applied state generation.
    pub version: Version,
    /// Last seen event log position.
    pub log_position: LogPosition,
}

// #############
// #  TRAITS   #
// #############

/// Compile time parameterization for sessions.
///
/// Bundles the application-specific types a session passes around. Implement it
/// on a marker struct.
///
/// ```
/// use trade_session::Config;
///
/// #[derive(Debug, Clone)]
/// struct Hat { defindex: u32 }
///
/// #[derive(Debug, Clone)]
/// struct HatSchema { name: String }
///
/// struct HatTrade;
///
/// impl Config for HatTrade {
///     type PartyId = u64;
///     type Item = Hat;
///     type SchemaItem = HatSchema;
/// }
/// ```
pub trait Config: 'static {
    /// Identifies a trading party (e.g. an account id).
    type PartyId: Clone + PartialEq + Eq + PartialOrd + Ord + Hash + Debug;

    /// An item as found in an inventory.
    type Item: Clone + Debug;

    /// The schema (definition) entry describing an [`Item`](Config::Item).
    type SchemaItem: Clone + Debug;
}

/// Read access to one party's inventory in one `(app, context)` namespace.
pub trait InventoryView<T: Config> {
    /// Looks up an item instance.
    fn item(&self, asset_id: AssetId) -> Option<T::Item>;

    /// Looks up the schema entry for an item found in this inventory.
    fn schema_item(&self, item: &T::Item) -> Option<T::SchemaItem>;
}

/// The wire-level collaborator: performs requests and parses responses.
///
/// Implementations are expected to be synchronous. A `None` or `false` result is
/// treated as a transient failure and retried by the session.
pub trait TradeTransport<T: Config> {
    /// Fetches one status snapshot. `None` signals a transient failure.
    fn fetch_status(&mut self, cursor: &StatusCursor) -> Option<Snapshot<T::PartyId>>;

    /// Issues one mutating command and reports whether the server accepted it.
    fn send_command(&mut self, command: &Command) -> bool;

    /// Fetches the publicly visible inventory of `party`.
    fn fetch_foreign_inventory(
        &mut self,
        party: &T::PartyId,
        app_id: AppId,
        context_id: ContextId,
    ) -> Option<Box<dyn InventoryView<T>>>;

    /// Fallback lookup used when an item is not visible in the public inventory.
    ///
    /// The default implementation has no private access.
    fn fetch_private_inventory(
        &mut self,
        _party: &T::PartyId,
        _app_id: AppId,
        _context_id: ContextId,
    ) -> Option<Box<dyn InventoryView<T>>> {
        None
    }
}

// ###################
// # UNIT TESTS      #
// ###################
