use std::sync::Arc;

use crate::{
    error::InvalidRequestKind,
    retry::{Backoff, RetryExecutor, ThreadSleepBackoff},
    sessions::config::RetryConfig,
    telemetry::ViolationObserver,
    Config, TradeError, TradeSession, TradeTransport,
};

/// Default event queue size.
/// Notifications older than this threshold are dropped if not drained.
const DEFAULT_EVENT_QUEUE_SIZE: usize = 100;
/// Smallest accepted event queue size; a session raises up to this many
/// notifications in a single poll without anything being drained in between.
const MIN_EVENT_QUEUE_SIZE: usize = 10;

/// The [`SessionBuilder`] builds [`TradeSession`]s.
///
/// Set both parties, optionally tune retries and observers, then consume the
/// builder with [`start_session`](Self::start_session).
///
/// ```
/// use std::sync::Arc;
/// use trade_session::{Config, NoBackoff, RetryConfig, SessionBuilder};
///
/// # struct MyConfig;
/// # impl Config for MyConfig {
/// #     type PartyId = u64;
/// #     type Item = ();
/// #     type SchemaItem = ();
/// # }
/// let builder = SessionBuilder::<MyConfig>::new()
///     .with_local_party(76561198000000001)
///     .with_remote_party(76561198000000002)
///     .with_retry_config(RetryConfig::immediate())
///     .with_backoff(Arc::new(NoBackoff));
/// ```
#[must_use = "SessionBuilder must be consumed by calling start_session"]
pub struct SessionBuilder<T>
where
    T: Config,
{
    local_party: Option<T::PartyId>,
    remote_party: Option<T::PartyId>,
    /// Attempts and delay for every remote call.
    retry_config: RetryConfig,
    /// How the session waits between attempts.
    backoff: Arc<dyn Backoff>,
    /// Maximum number of notifications to queue before the oldest are dropped.
    event_queue_size: usize,
    /// Optional observer for protocol anomalies.
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config> std::fmt::Debug for SessionBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure so a new field cannot be forgotten here.
        let Self {
            local_party,
            remote_party,
            retry_config,
            backoff,
            event_queue_size,
            violation_observer,
        } = self;

        f.debug_struct("SessionBuilder")
            .field("local_party", local_party)
            .field("remote_party", remote_party)
            .field("retry_config", retry_config)
            .field("backoff", backoff)
            .field("event_queue_size", event_queue_size)
            .field("has_violation_observer", &violation_observer.is_some())
            .finish()
    }
}

impl<T: Config> Default for SessionBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Config> SessionBuilder<T> {
    /// Construct a new builder with all values set to their defaults.
    pub fn new() -> Self {
        Self {
            local_party: None,
            remote_party: None,
            retry_config: RetryConfig::default(),
            backoff: Arc::new(ThreadSleepBackoff),
            event_queue_size: DEFAULT_EVENT_QUEUE_SIZE,
            violation_observer: None,
        }
    }

    /// Sets the party this session acts for. Its own events are never reported back.
    pub fn with_local_party(mut self, party: T::PartyId) -> Self {
        self.local_party = Some(party);
        self
    }

    /// Sets the party on the other side of the trade.
    pub fn with_remote_party(mut self, party: T::PartyId) -> Self {
        self.remote_party = Some(party);
        self
    }

    /// Sets attempts and delay for remote calls. Validated in
    /// [`start_session`](Self::start_session).
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Replaces the blocking default wait between attempts.
    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets how many notifications are kept for [`TradeSession::events`].
    ///
    /// # Errors
    /// Returns [`TradeError::InvalidConfig`] if `size` is below 10.
    pub fn with_event_queue_size(mut self, size: usize) -> Result<Self, TradeError> {
        if size < MIN_EVENT_QUEUE_SIZE {
            return Err(TradeError::InvalidConfig {
                info: format!(
                    "event queue size must be at least {}, got {}",
                    MIN_EVENT_QUEUE_SIZE, size
                ),
            });
        }
        self.event_queue_size = size;
        Ok(self)
    }

    /// Installs an observer for protocol anomalies. Without one, anomalies are
    /// logged through `tracing`.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use trade_session::telemetry::CollectingObserver;
    /// use trade_session::{Config, SessionBuilder};
    ///
    /// # struct MyConfig;
    /// # impl Config for MyConfig {
    /// #     type PartyId = u64;
    /// #     type Item = ();
    /// #     type SchemaItem = ();
    /// # }
    /// let observer = Arc::new(CollectingObserver::new());
    /// let builder = SessionBuilder::<MyConfig>::new()
    ///     .with_violation_observer(observer.clone());
    /// ```
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.violation_observer = Some(observer);
        self
    }

    /// Consumes the builder and starts a session over `transport`.
    ///
    /// The session does nothing until the first [`TradeSession::poll`].
    ///
    /// # Errors
    /// - [`TradeError::InvalidRequest`] if a party is missing or both parties are the same.
    /// - [`TradeError::InvalidConfig`] if the retry configuration is out of range.
    pub fn start_session(
        self,
        transport: impl TradeTransport<T> + 'static,
    ) -> Result<TradeSession<T>, TradeError> {
        let local_party = self
            .local_party
            .ok_or(InvalidRequestKind::MissingParty { role: "local" })?;
        let remote_party = self
            .remote_party
            .ok_or(InvalidRequestKind::MissingParty { role: "remote" })?;
        if local_party == remote_party {
            return Err(InvalidRequestKind::SameParty.into());
        }

        self.retry_config.validate()?;

        Ok(TradeSession::new(
            local_party,
            remote_party,
            Box::new(transport),
            RetryExecutor::new(self.retry_config, self.backoff),
            self.event_queue_size,
            self.violation_observer,
        ))
    }
}
