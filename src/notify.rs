//! Notifications the session raises for the application.
//!
//! Every notification is delivered twice: synchronously to the callbacks
//! registered on [`Subscribers`], and into the session's bounded queue that
//! [`TradeSession::events`](crate::TradeSession::events) drains. Applications can
//! use either style or both.

use crate::{Config, ItemRef, TradeStatus};

/// An item the remote party added or removed, with what could be resolved about it.
pub struct ItemNotification<T: Config> {
    /// The item reference carried by the event, `None` when the record was incomplete.
    pub item: Option<ItemRef>,
    /// Schema entry for the item, if it was resolved.
    pub schema: Option<T::SchemaItem>,
    /// The item itself, if it was resolved.
    pub resolved: Option<T::Item>,
}

impl<T: Config> ItemNotification<T> {
    /// A notification for an item that could not be resolved.
    #[must_use]
    pub fn unresolved(item: Option<ItemRef>) -> Self {
        Self {
            item,
            schema: None,
            resolved: None,
        }
    }

    /// Returns `true` if the item was found in an inventory.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

impl<T: Config> Clone for ItemNotification<T> {
    fn clone(&self) -> Self {
        Self {
            item: self.item,
            schema: self.schema.clone(),
            resolved: self.resolved.clone(),
        }
    }
}

impl<T: Config> std::fmt::Debug for ItemNotification<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemNotification")
            .field("item", &self.item)
            .field("schema", &self.schema)
            .field("resolved", &self.resolved)
            .finish()
    }
}

impl<T: Config> PartialEq for ItemNotification<T>
where
    T::Item: PartialEq,
    T::SchemaItem: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.item == other.item && self.schema == other.schema && self.resolved == other.resolved
    }
}

/// Something the application should know about.
#[non_exhaustive]
pub enum TradeNotification<T: Config> {
    /// The first poll of the session started.
    Initialized,
    /// The remote party put an item into its offer.
    ItemAdded(ItemNotification<T>),
    /// The remote party withdrew an item.
    ItemRemoved(ItemNotification<T>),
    /// The remote party changed its ready flag.
    ReadyChanged {
        /// The new flag.
        ready: bool,
    },
    /// The remote party accepted.
    Accepted,
    /// The remote party sent a chat line.
    Chat {
        /// Message body.
        text: String,
    },
    /// The server closed the trade without success.
    Closed {
        /// The closing status.
        status: TradeStatus,
    },
    /// The trade went through.
    Completed,
    /// Something unexpected happened that did not stop the session.
    Warning {
        /// Human-readable description.
        message: String,
    },
}

impl<T: Config> TradeNotification<T> {
    /// The kind of this notification.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::Initialized => NotificationKind::Initialized,
            Self::ItemAdded(_) => NotificationKind::ItemAdded,
            Self::ItemRemoved(_) => NotificationKind::ItemRemoved,
            Self::ReadyChanged { .. } => NotificationKind::ReadyChanged,
            Self::Accepted => NotificationKind::Accepted,
            Self::Chat { .. } => NotificationKind::Chat,
            Self::Closed { .. } => NotificationKind::Closed,
            Self::Completed => NotificationKind::Completed,
            Self::Warning { .. } => NotificationKind::Warning,
        }
    }

    pub(crate) fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
        }
    }
}

impl<T: Config> Clone for TradeNotification<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Initialized => Self::Initialized,
            Self::ItemAdded(item) => Self::ItemAdded(item.clone()),
            Self::ItemRemoved(item) => Self::ItemRemoved(item.clone()),
            Self::ReadyChanged { ready } => Self::ReadyChanged { ready: *ready },
            Self::Accepted => Self::Accepted,
            Self::Chat { text } => Self::Chat { text: text.clone() },
            Self::Closed { status } => Self::Closed { status: *status },
            Self::Completed => Self::Completed,
            Self::Warning { message } => Self::Warning {
                message: message.clone(),
            },
        }
    }
}

impl<T: Config> std::fmt::Debug for TradeNotification<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "Initialized"),
            Self::ItemAdded(item) => f.debug_tuple("ItemAdded").field(item).finish(),
            Self::ItemRemoved(item) => f.debug_tuple("ItemRemoved").field(item).finish(),
            Self::ReadyChanged { ready } => {
                f.debug_struct("ReadyChanged").field("ready", ready).finish()
            }
            Self::Accepted => write!(f, "Accepted"),
            Self::Chat { text } => f.debug_struct("Chat").field("text", text).finish(),
            Self::Closed { status } => f.debug_struct("Closed").field("status", status).finish(),
            Self::Completed => write!(f, "Completed"),
            Self::Warning { message } => f
                .debug_struct("Warning")
                .field("message", message)
                .finish(),
        }
    }
}

impl<T: Config> PartialEq for TradeNotification<T>
where
    T::Item: PartialEq,
    T::SchemaItem: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Initialized, Self::Initialized)
            | (Self::Accepted, Self::Accepted)
            | (Self::Completed, Self::Completed) => true,
            (Self::ItemAdded(a), Self::ItemAdded(b))
            | (Self::ItemRemoved(a), Self::ItemRemoved(b)) => a == b,
            (Self::ReadyChanged { ready: a }, Self::ReadyChanged { ready: b }) => a == b,
            (Self::Chat { text: a }, Self::Chat { text: b }) => a == b,
            (Self::Closed { status: a }, Self::Closed { status: b }) => a == b,
            (Self::Warning { message: a }, Self::Warning { message: b }) => a == b,
            _ => false,
        }
    }
}

/// Discriminant of a [`TradeNotification`], for filtering and counting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NotificationKind {
    /// See [`TradeNotification::Initialized`].
    Initialized,
    /// See [`TradeNotification::ItemAdded`].
    ItemAdded,
    /// See [`TradeNotification::ItemRemoved`].
    ItemRemoved,
    /// See [`TradeNotification::ReadyChanged`].
    ReadyChanged,
    /// See [`TradeNotification::Accepted`].
    Accepted,
    /// See [`TradeNotification::Chat`].
    Chat,
    /// See [`TradeNotification::Closed`].
    Closed,
    /// See [`TradeNotification::Completed`].
    Completed,
    /// See [`TradeNotification::Warning`].
    Warning,
}

type Callback<A> = Box<dyn FnMut(A)>;
type ItemCallback<T> = Box<dyn FnMut(&ItemNotification<T>)>;

/// Per-kind callback lists, invoked in registration order.
pub struct Subscribers<T: Config> {
    initialized: Vec<Callback<()>>,
    item_added: Vec<ItemCallback<T>>,
    item_removed: Vec<ItemCallback<T>>,
    ready_changed: Vec<Callback<bool>>,
    accepted: Vec<Callback<()>>,
    chat: Vec<Box<dyn FnMut(&str)>>,
    closed: Vec<Callback<TradeStatus>>,
    completed: Vec<Callback<()>>,
    warning: Vec<Box<dyn FnMut(&str)>>,
}

impl<T: Config> Subscribers<T> {
    /// No callbacks registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: Vec::new(),
            item_added: Vec::new(),
            item_removed: Vec::new(),
            ready_changed: Vec::new(),
            accepted: Vec::new(),
            chat: Vec::new(),
            closed: Vec::new(),
            completed: Vec::new(),
            warning: Vec::new(),
        }
    }

    /// Called once when the first poll starts the session.
    pub fn on_initialized(&mut self, callback: impl FnMut() + 'static) -> &mut Self {
        let mut callback = callback;
        self.initialized.push(Box::new(move |()| callback()));
        self
    }

    /// Called for every item the remote party adds.
    pub fn on_item_added(
        &mut self,
        callback: impl FnMut(&ItemNotification<T>) + 'static,
    ) -> &mut Self {
        self.item_added.push(Box::new(callback));
        self
    }

    /// Called for every item the remote party removes.
    pub fn on_item_removed(
        &mut self,
        callback: impl FnMut(&ItemNotification<T>) + 'static,
    ) -> &mut Self {
        self.item_removed.push(Box::new(callback));
        self
    }

    /// Called when the remote party sets or clears its ready flag.
    pub fn on_ready_changed(&mut self, callback: impl FnMut(bool) + 'static) -> &mut Self {
        self.ready_changed.push(Box::new(callback));
        self
    }

    /// Called when the remote party accepts.
    pub fn on_accepted(&mut self, callback: impl FnMut() + 'static) -> &mut Self {
        let mut callback = callback;
        self.accepted.push(Box::new(move |()| callback()));
        self
    }

    /// Called for every chat line from the remote party.
    pub fn on_chat(&mut self, callback: impl FnMut(&str) + 'static) -> &mut Self {
        self.chat.push(Box::new(callback));
        self
    }

    /// Called when the server closes the trade without success.
    pub fn on_closed(&mut self, callback: impl FnMut(TradeStatus) + 'static) -> &mut Self {
        self.closed.push(Box::new(callback));
        self
    }

    /// Called when the trade goes through.
    pub fn on_completed(&mut self, callback: impl FnMut() + 'static) -> &mut Self {
        let mut callback = callback;
        self.completed.push(Box::new(move |()| callback()));
        self
    }

    /// Called for non-fatal anomalies.
    pub fn on_warning(&mut self, callback: impl FnMut(&str) + 'static) -> &mut Self {
        self.warning.push(Box::new(callback));
        self
    }

    /// Number of callbacks registered for `kind`.
    #[must_use]
    pub fn count(&self, kind: NotificationKind) -> usize {
        match kind {
            NotificationKind::Initialized => self.initialized.len(),
            NotificationKind::ItemAdded => self.item_added.len(),
            NotificationKind::ItemRemoved => self.item_removed.len(),
            NotificationKind::ReadyChanged => self.ready_changed.len(),
            NotificationKind::Accepted => self.accepted.len(),
            NotificationKind::Chat => self.chat.len(),
            NotificationKind::Closed => self.closed.len(),
            NotificationKind::Completed => self.completed.len(),
            NotificationKind::Warning => self.warning.len(),
        }
    }

    /// Invokes every callback registered for the notification's kind.
    pub(crate) fn deliver(&mut self, notification: &TradeNotification<T>) {
        match notification {
            TradeNotification::Initialized => self.initialized.iter_mut().for_each(|cb| cb(())),
            TradeNotification::ItemAdded(item) => {
                self.item_added.iter_mut().for_each(|cb| cb(item));
            }
            TradeNotification::ItemRemoved(item) => {
                self.item_removed.iter_mut().for_each(|cb| cb(item));
            }
            TradeNotification::ReadyChanged { ready } => {
                self.ready_changed.iter_mut().for_each(|cb| cb(*ready));
            }
            TradeNotification::Accepted => self.accepted.iter_mut().for_each(|cb| cb(())),
            TradeNotification::Chat { text } => {
                self.chat.iter_mut().for_each(|cb| cb(text.as_str()));
            }
            TradeNotification::Closed { status } => {
                self.closed.iter_mut().for_each(|cb| cb(*status));
            }
            TradeNotification::Completed => self.completed.iter_mut().for_each(|cb| cb(())),
            TradeNotification::Warning { message } => {
                self.warning.iter_mut().for_each(|cb| cb(message.as_str()));
            }
        }
    }
}

impl<T: Config> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Config> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("initialized", &self.initialized.len())
            .field("item_added", &self.item_added.len())
            .field("item_removed", &self.item_removed.len())
            .field("ready_changed", &self.ready_changed.len())
            .field("accepted", &self.accepted.len())
            .field("chat", &self.chat.len())
            .field("closed", &self.closed.len())
            .field("completed", &self.completed.len())
            .field("warning", &self.warning.len())
            .finish()
    }
}
