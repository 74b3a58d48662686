//! Bounded retries for remote calls.
//!
//! Every remote call the session makes goes through a [`RetryExecutor`]. A call
//! whose result is the type's neutral value (`false`, `None`, zero) counts as a
//! failed attempt. The executor tries up to [`RetryConfig::max_attempts`] times,
//! waiting [`RetryConfig::delay`] between attempts through an injectable
//! [`Backoff`], and returns the neutral value when every attempt failed.
//!
//! The wait blocks the calling thread with the default [`ThreadSleepBackoff`].
//! Hosts driving the session from a cooperative scheduler should either run
//! commands on a worker or install their own backoff.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::trace;
use web_time::Duration;

use crate::sessions::config::RetryConfig;

/// Results that have a "nothing happened" value.
pub trait Neutral: Default {
    /// Returns `true` if this result should be treated as a failed attempt.
    fn is_neutral(&self) -> bool;
}

impl Neutral for bool {
    #[inline]
    fn is_neutral(&self) -> bool {
        !*self
    }
}

impl<T> Neutral for Option<T> {
    #[inline]
    fn is_neutral(&self) -> bool {
        self.is_none()
    }
}

macro_rules! neutral_zero {
    ($($ty:ty),*) => {
        $(
            impl Neutral for $ty {
                #[inline]
                fn is_neutral(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

neutral_zero!(u8, u16, u32, u64, usize, i32, i64);

/// Strategy for waiting between attempts.
pub trait Backoff: Debug {
    /// Waits for `delay` before the next attempt.
    fn wait(&self, delay: Duration);
}

/// Blocks the current thread for the full delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleepBackoff;

impl Backoff for ThreadSleepBackoff {
    fn wait(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Retries immediately. Useful in tests and when the transport already paces itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn wait(&self, _delay: Duration) {}
}

/// Runs a remote call up to a fixed number of times.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    backoff: Arc<dyn Backoff>,
}

impl RetryExecutor {
    /// Creates an executor with the given limits and wait strategy.
    #[must_use]
    pub fn new(config: RetryConfig, backoff: Arc<dyn Backoff>) -> Self {
        Self { config, backoff }
    }

    /// The limits this executor applies.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `op` until it yields a non-neutral result or the attempts run out.
    ///
    /// `is_terminal` is consulted before every attempt; once it reports `true`
    /// the executor gives up immediately and returns the neutral value. An
    /// in-flight attempt is never interrupted.
    pub fn execute<R, F>(&self, is_terminal: impl Fn() -> bool, mut op: F) -> R
    where
        R: Neutral,
        F: FnMut() -> R,
    {
        let attempts = self.config.max_attempts;
        for attempt in 1..=attempts {
            if is_terminal() {
                trace!(attempt, "session is terminal; skipping remote call");
                return R::default();
            }
            let result = op();
            if !result.is_neutral() {
                return result;
            }
            trace!(attempt, attempts, "remote call not confirmed");
            if attempt < attempts {
                self.backoff.wait(self.config.delay);
            }
        }
        R::default()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default(), Arc::new(ThreadSleepBackoff))
    }
}
