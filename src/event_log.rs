//! Record of remote events already delivered to the application.
//!
//! Servers keep resending their event list until the log cursor moves past it, and
//! may drop or reorder entries between snapshots. Identity is full structural
//! equality of the [`TradeEvent`], so an event is recognised however it is resent.

use std::collections::HashSet;
use std::hash::Hash;

use crate::snapshot::TradeEvent;

/// Deduplicating history of delivered events, in delivery order.
#[derive(Debug, Clone)]
pub struct EventLog<P: Eq + Hash> {
    seen: HashSet<TradeEvent<P>>,
    history: Vec<TradeEvent<P>>,
}

impl<P: Eq + Hash + Clone> EventLog<P> {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
            history: Vec::new(),
        }
    }

    /// Returns `true` if `event` was delivered before.
    #[must_use]
    pub fn contains(&self, event: &TradeEvent<P>) -> bool {
        self.seen.contains(event)
    }

    /// Records `event`. Returns `false` if it was already present.
    pub fn record(&mut self, event: TradeEvent<P>) -> bool {
        if !self.seen.insert(event.clone()) {
            return false;
        }
        self.history.push(event);
        true
    }

    /// Delivered events, oldest first.
    #[must_use]
    pub fn history(&self) -> &[TradeEvent<P>] {
        &self.history
    }

    /// Number of delivered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns `true` if nothing was delivered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl<P: Eq + Hash + Clone> Default for EventLog<P> {
    fn default() -> Self {
        Self::new()
    }
}
