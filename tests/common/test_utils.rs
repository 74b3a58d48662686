//! Shared constants and helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use trade_session::{
    AppId, AssetId, Backoff, ContextId, ItemRef, RetryConfig, SessionBuilder, TradeSession,
};
use web_time::Duration;

use super::stubs::{ScriptedTransport, StubConfig};

/// The local party.
pub const ME: u64 = 76_561_198_000_000_001;
/// The remote party.
pub const PEER: u64 = 76_561_198_000_000_002;

pub const TF2: AppId = AppId::new(440);
pub const BACKPACK: ContextId = ContextId::new(2);

/// A TF2 backpack item.
pub fn hat(asset: u64) -> ItemRef {
    ItemRef::new(TF2, BACKPACK, AssetId::new(asset))
}

/// Records every requested wait instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingBackoff {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingBackoff {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }
}

impl Backoff for RecordingBackoff {
    fn wait(&self, delay: Duration) {
        self.waits.lock().push(delay);
    }
}

/// Routes library logs to the test harness output. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Starts a session between `ME` and `PEER` with default retries and a
/// backoff that never sleeps.
pub fn start_session(transport: &ScriptedTransport) -> TradeSession<StubConfig> {
    start_session_with(transport, Arc::new(RecordingBackoff::default()))
}

pub fn start_session_with(
    transport: &ScriptedTransport,
    backoff: Arc<dyn Backoff>,
) -> TradeSession<StubConfig> {
    init_tracing();
    SessionBuilder::<StubConfig>::new()
        .with_local_party(ME)
        .with_remote_party(PEER)
        .with_retry_config(RetryConfig::default())
        .with_backoff(backoff)
        .start_session(transport.clone())
        .expect("valid session configuration")
}
