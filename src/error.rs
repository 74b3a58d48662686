use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::{ItemRef, Version};

/// Convenience alias used by every fallible session operation.
pub type TradeResult<T> = Result<T, TradeError>;

/// Why a request was refused before anything was sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum InvalidRequestKind {
    /// The item already occupies a slot in the local offer.
    DuplicateItem {
        /// The offending item.
        item: ItemRef,
    },
    /// The item is not part of the local offer.
    ItemNotOffered {
        /// The offending item.
        item: ItemRef,
    },
    /// The builder was started without one of the two parties.
    MissingParty {
        /// `"local"` or `"remote"`.
        role: &'static str,
    },
    /// Local and remote party are the same.
    SameParty,
}

impl Display for InvalidRequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateItem { item } => write!(f, "item {} is already offered", item),
            Self::ItemNotOffered { item } => write!(f, "item {} is not in the local offer", item),
            Self::MissingParty { role } => write!(f, "no {} party was configured", role),
            Self::SameParty => write!(f, "local and remote party must differ"),
        }
    }
}

/// Every error this library can return.
///
/// [`Desynchronized`](TradeError::Desynchronized) and
/// [`OfferMismatch`](TradeError::OfferMismatch) are fatal: the session has been
/// aborted and must not be polled or commanded again. Use
/// [`is_fatal`](TradeError::is_fatal) to tell them apart from refused requests.
/// Transient transport failures never surface here; they show up as a `false`
/// command result or a quiet poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TradeError {
    /// A snapshot moved the version forward without flagging a state change.
    /// The missing delta cannot be recovered, so the session was aborted.
    Desynchronized {
        /// Version the session had applied.
        current: Version,
        /// Version the snapshot reported.
        reported: Version,
    },
    /// The intended local offer disagrees with what the server confirmed.
    OfferMismatch {
        /// Items the session believes it offered.
        intended: Vec<ItemRef>,
        /// Items the server confirmed.
        confirmed: Vec<ItemRef>,
    },
    /// The request was refused locally; the session is unaffected.
    InvalidRequest {
        /// What was wrong with it.
        kind: InvalidRequestKind,
    },
    /// A configuration value is out of range.
    InvalidConfig {
        /// Which value and why.
        info: String,
    },
    /// An internal error occurred that should not happen under normal operation.
    InternalError {
        /// A description of the internal error.
        context: String,
    },
}

impl TradeError {
    /// Returns `true` for errors that aborted the session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Desynchronized { .. } | Self::OfferMismatch { .. })
    }
}

impl Display for TradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeError::Desynchronized { current, reported } => {
                write!(
                    f,
                    "Snapshot reported {} without a state change while {} was applied; session aborted.",
                    reported, current
                )
            }
            TradeError::OfferMismatch {
                intended,
                confirmed,
            } => {
                write!(
                    f,
                    "Local offer does not match the server: intended {} item(s) {:?}, confirmed {} item(s) {:?}.",
                    intended.len(),
                    intended,
                    confirmed.len(),
                    confirmed
                )
            }
            TradeError::InvalidRequest { kind } => {
                write!(f, "Invalid Request: {}", kind)
            }
            TradeError::InvalidConfig { info } => {
                write!(f, "Invalid configuration: {}", info)
            }
            TradeError::InternalError { context } => {
                write!(f, "Internal error (please report as bug): {}", context)
            }
        }
    }
}

impl Error for TradeError {}

impl From<InvalidRequestKind> for TradeError {
    fn from(kind: InvalidRequestKind) -> Self {
        TradeError::InvalidRequest { kind }
    }
}
