//! Convenient re-exports for common usage.
//!
//! ```rust
//! use trade_session::prelude::*;
//! ```
//!
//! # What's Included
//!
//! - **Session types**: [`TradeSession`], [`SessionBuilder`], [`SessionState`]
//! - **Core traits**: [`Config`], [`TradeTransport`], [`InventoryView`]
//! - **Fundamental types**: [`ItemRef`], [`AppId`], [`ContextId`], [`AssetId`], [`Version`], [`Slot`]
//! - **Wire contract**: [`Snapshot`], [`PartyStatus`], [`EventRecord`], [`TradeStatus`], [`Command`], [`StatusCursor`]
//! - **Notifications**: [`TradeNotification`], [`ItemNotification`]
//! - **Error handling**: [`TradeError`], [`TradeResult`]
//! - **Configuration**: [`RetryConfig`], [`NoBackoff`]
//!
//! # Example
//!
//! ```rust
//! use trade_session::prelude::*;
//!
//! #[derive(Debug, Clone)]
//! struct Hat {
//!     defindex: u32,
//! }
//!
//! struct HatTrade;
//!
//! impl Config for HatTrade {
//!     type PartyId = u64;
//!     type Item = Hat;
//!     type SchemaItem = String;
//! }
//!
//! struct Backpack(Vec<(AssetId, Hat)>);
//!
//! impl InventoryView<HatTrade> for Backpack {
//!     fn item(&self, asset_id: AssetId) -> Option<Hat> {
//!         self.0.iter().find(|(id, _)| *id == asset_id).map(|(_, hat)| hat.clone())
//!     }
//!
//!     fn schema_item(&self, hat: &Hat) -> Option<String> {
//!         Some(format!("hat #{}", hat.defindex))
//!     }
//! }
//!
//! let backpack = Backpack(vec![(AssetId::new(7), Hat { defindex: 166 })]);
//! assert_eq!(backpack.schema_item(&backpack.item(AssetId::new(7)).unwrap()).unwrap(), "hat #166");
//! ```

// Core session types
pub use crate::sessions::builder::SessionBuilder;
pub use crate::sessions::trade_session::TradeSession;
pub use crate::SessionState;

// Core traits
pub use crate::{Config, InventoryView, TradeTransport};

// Fundamental types
pub use crate::{AppId, AssetId, ContextId, ItemRef, LogPosition, Slot, Version};

// Wire contract
pub use crate::snapshot::{EventRecord, PartyStatus, Snapshot, TradeStatus};
pub use crate::{Command, StatusCursor};

// Notifications
pub use crate::notify::{ItemNotification, TradeNotification};

// Error handling
pub use crate::{TradeError, TradeResult};

// Common configuration types
pub use crate::retry::NoBackoff;
pub use crate::sessions::config::RetryConfig;
