//! Common test infrastructure shared across integration tests.
//!
//! This module provides:
//! - `stubs`: a scripted transport, stub inventories and the test `Config`
//! - `test_utils`: party ids, item helpers, a recording backoff and session setup
//!
//! # Usage
//!
//! ```ignore
//! #[path = "common/mod.rs"]
//! mod common;
//! use common::stubs::{ScriptedTransport, StubConfig};
//! use common::{hat, start_session, ME, PEER};
//! ```

pub mod stubs;
pub mod test_utils;

// Re-export commonly used items for convenience.
#[allow(unused_imports)]
pub use test_utils::{
    hat, init_tracing, start_session, start_session_with, RecordingBackoff, ME, PEER,
};
