//! Admission control for snapshots based on their version counter.
//!
//! | Reported vs applied | `changed` | Decision |
//! |---------------------|-----------|----------|
//! | lower               | any       | [`GateDecision::Stale`], ignore the snapshot |
//! | equal or higher     | set       | [`GateDecision::Replace`], full state replace |
//! | equal               | clear     | [`GateDecision::Deltas`], process events and flags |
//! | higher              | clear     | [`GateDecision::Desynchronized`], abort |
//!
//! A jump forward without the changed flag means a state replace happened that
//! this client never saw. Guessing the missing delta could leave the application
//! believing an item is no longer offered when it still is, so the session stops
//! instead of resynchronizing.

use crate::Version;

/// What to do with a snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Older than what was applied; ignore it entirely.
    Stale,
    /// Adopt the version and replace the offer mirrors.
    Replace,
    /// Same version; apply its events and flags.
    Deltas,
    /// Ahead without a declared change; the session must abort.
    Desynchronized,
}

/// Tracks the last applied version.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct VersionGate {
    current: Version,
}

impl VersionGate {
    /// A gate that has applied nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: Version::ZERO,
        }
    }

    /// The last applied version.
    #[must_use]
    pub const fn current(&self) -> Version {
        self.current
    }

    /// Classifies a snapshot reporting `reported` with the given changed flag.
    #[must_use]
    pub fn evaluate(&self, reported: Version, changed: bool) -> GateDecision {
        if reported < self.current {
            GateDecision::Stale
        } else if changed {
            GateDecision::Replace
        } else if reported > self.current {
            GateDecision::Desynchronized
        } else {
            GateDecision::Deltas
        }
    }

    /// Records `version` as applied. Never moves backwards.
    pub fn adopt(&mut self, version: Version) {
        self.current = self.current.max(version);
    }
}
