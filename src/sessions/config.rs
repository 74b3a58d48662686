//! Configuration types for trade sessions.
//!
//! | Config Type | Purpose | Presets |
//! |-------------|---------|---------|
//! | `RetryConfig` | Attempts and delay for remote calls | `patient()`, `immediate()` |
//!
//! # Example
//!
//! ```
//! use trade_session::{Config, RetryConfig, SessionBuilder};
//!
//! # struct MyConfig;
//! # impl Config for MyConfig {
//! #     type PartyId = u64;
//! #     type Item = ();
//! #     type SchemaItem = ();
//! # }
//! let builder = SessionBuilder::<MyConfig>::new()
//!     .with_retry_config(RetryConfig::patient());
//! ```

use web_time::Duration;

use crate::TradeError;

/// Limits for retrying a remote call.
///
/// The defaults (three attempts, 600 ms apart) mirror what trade servers of this
/// kind tolerate without rate limiting the client.
///
/// # Forward Compatibility
///
/// New fields may be added. Construct with `..RetryConfig::default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "RetryConfig has no effect unless passed to SessionBuilder::with_retry_config()"]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    ///
    /// Default: 3
    pub max_attempts: u32,

    /// Wait between two attempts.
    ///
    /// Default: 600ms
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(600),
        }
    }
}

impl RetryConfig {
    /// Creates a `RetryConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for overloaded servers: more attempts, longer gaps.
    pub fn patient() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(1500),
        }
    }

    /// Preset that keeps the attempt count but never waits.
    ///
    /// Pair it with a transport that paces itself, or with tests.
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Checks that the values make sense.
    ///
    /// # Errors
    /// Returns [`TradeError::InvalidConfig`] when `max_attempts` is zero or the delay
    /// exceeds one minute.
    pub fn validate(&self) -> Result<(), TradeError> {
        if self.max_attempts == 0 {
            return Err(TradeError::InvalidConfig {
                info: "max_attempts must be at least 1".to_owned(),
            });
        }
        if self.delay > Duration::from_secs(60) {
            return Err(TradeError::InvalidConfig {
                info: format!("retry delay {:?} exceeds 60s", self.delay),
            });
        }
        Ok(())
    }
}
