use std::collections::vec_deque::Drain;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::dispatch::EventDispatcher;
use crate::event_log::EventLog;
use crate::inventory::InventoryCache;
use crate::ledger::OfferLedger;
use crate::notify::{Subscribers, TradeNotification};
use crate::reconcile::SnapshotReconciler;
use crate::retry::RetryExecutor;
use crate::snapshot::{Snapshot, TradeEvent, TradeStatus};
use crate::telemetry::{
    report_to_observer, InvariantChecker, InvariantViolation, ProtocolViolation, ViolationKind,
    ViolationObserver, ViolationSeverity,
};
use crate::version_gate::{GateDecision, VersionGate};
use crate::{
    debug_check_invariants, report_violation_to, Command, Config, InvalidRequestKind, ItemRef,
    LogPosition, SessionState, Slot, StatusCursor, TradeError, TradeResult, TradeTransport,
    Version,
};

/// One negotiation with one remote party.
///
/// Created by [`SessionBuilder::start_session`](crate::SessionBuilder::start_session).
/// The host drives it: call [`poll`](Self::poll) on its own cadence and issue
/// commands in between. Nothing runs in the background.
///
/// Once [`state`](Self::state) is terminal, polls return `Ok(false)` and commands
/// return `Ok(false)` without contacting the server.
pub struct TradeSession<T>
where
    T: Config,
{
    local_party: T::PartyId,
    remote_party: T::PartyId,
    transport: Box<dyn TradeTransport<T>>,
    retry: RetryExecutor,

    state: SessionState,
    gate: VersionGate,
    log_position: LogPosition,
    local_ready: bool,
    remote_ready: bool,

    ledger: OfferLedger,
    reconciler: SnapshotReconciler,
    event_log: EventLog<T::PartyId>,
    inventories: InventoryCache<T>,

    subscribers: Subscribers<T>,
    /// Notifications not yet drained by the host.
    event_queue: VecDeque<TradeNotification<T>>,
    /// Maximum number of queued notifications before the oldest are dropped.
    event_queue_size: usize,
    /// Optional observer for anomalies; `None` logs through tracing.
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config> TradeSession<T> {
    pub(crate) fn new(
        local_party: T::PartyId,
        remote_party: T::PartyId,
        transport: Box<dyn TradeTransport<T>>,
        retry: RetryExecutor,
        event_queue_size: usize,
        violation_observer: Option<Arc<dyn ViolationObserver>>,
    ) -> Self {
        Self {
            local_party,
            remote_party,
            transport,
            retry,
            state: SessionState::NotStarted,
            gate: VersionGate::new(),
            log_position: LogPosition::default(),
            local_ready: false,
            remote_ready: false,
            ledger: OfferLedger::new(),
            reconciler: SnapshotReconciler::new(),
            event_log: EventLog::new(),
            inventories: InventoryCache::new(),
            subscribers: Subscribers::new(),
            event_queue: VecDeque::new(),
            event_queue_size,
            violation_observer,
        }
    }

    /// Runs one poll cycle: fetch a snapshot and apply it.
    ///
    /// Returns `Ok(true)` if the remote party did something this cycle (or the
    /// server replaced its state), `Ok(false)` if nothing happened, the snapshot
    /// could not be fetched, or the session is terminal.
    ///
    /// # Errors
    /// Returns [`TradeError::Desynchronized`] when the server's version moved
    /// ahead without flagging a state change. The session is aborted.
    pub fn poll(&mut self) -> TradeResult<bool> {
        if self.state.is_terminal() {
            trace!(state = ?self.state, "poll on terminal session");
            return Ok(false);
        }
        if self.state == SessionState::NotStarted {
            self.transition(SessionState::Running);
            self.notify(TradeNotification::Initialized);
        }

        let cursor = self.cursor();
        let snapshot = {
            let state = self.state;
            let transport = &mut self.transport;
            self.retry
                .execute(|| state.is_terminal(), || transport.fetch_status(&cursor))
        };
        let Some(snapshot) = snapshot else {
            trace!(version = %cursor.version, "no snapshot this cycle");
            return Ok(false);
        };

        let result = self.apply_snapshot(snapshot);
        debug_check_invariants!(self, "after poll");
        result
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot<T::PartyId>) -> TradeResult<bool> {
        match snapshot.status() {
            TradeStatus::Ongoing => {}
            TradeStatus::Completed => {
                self.transition(SessionState::Completed);
                self.notify(TradeNotification::Completed);
                return Ok(false);
            }
            TradeStatus::Unknown(code) => {
                self.warn(
                    ViolationKind::Transport,
                    format!("unknown trade status code {code}; snapshot ignored"),
                );
                return Ok(false);
            }
            status => {
                self.transition(SessionState::Cancelled);
                self.notify(TradeNotification::Closed { status });
                return Ok(false);
            }
        }

        let current = self.gate.current();
        match self.gate.evaluate(snapshot.version, snapshot.changed) {
            GateDecision::Stale => {
                trace!(%current, reported = %snapshot.version, "ignoring stale snapshot");
                let violation = ProtocolViolation::new(
                    ViolationSeverity::Warning,
                    ViolationKind::VersionGate,
                    "ignored snapshot older than the applied version",
                    concat!(file!(), ":", line!()),
                )
                .with_version(current)
                .with_context("reported", snapshot.version.to_string())
                .with_context("changed", snapshot.changed.to_string());
                report_to_observer(self.violation_observer.as_ref(), &violation);
                Ok(false)
            }
            GateDecision::Replace => {
                self.gate.adopt(snapshot.version);
                self.reconciler.apply(&mut self.ledger, &snapshot);
                debug!(version = %snapshot.version, "adopted new state version");
                Ok(true)
            }
            GateDecision::Desynchronized => {
                let error = TradeError::Desynchronized {
                    current,
                    reported: snapshot.version,
                };
                self.abort(ViolationKind::VersionGate, &error);
                Err(error)
            }
            GateDecision::Deltas => Ok(self.apply_deltas(&snapshot)),
        }
    }

    fn apply_deltas(&mut self, snapshot: &Snapshot<T::PartyId>) -> bool {
        let outcome = EventDispatcher {
            local_party: &self.local_party,
            remote_party: &self.remote_party,
            version: self.gate.current(),
            event_log: &mut self.event_log,
            inventories: &mut self.inventories,
            transport: &mut *self.transport,
            observer: &self.violation_observer,
        }
        .dispatch(&snapshot.events);

        if let Some(ready) = outcome.remote_ready {
            self.remote_ready = ready;
        }
        for notification in outcome.notifications {
            self.notify(notification);
        }

        if let Some(ready) = snapshot.me.as_ref().and_then(|me| me.ready) {
            self.local_ready = ready;
        }
        if let Some(ready) = snapshot.them.as_ref().and_then(|them| them.ready) {
            self.remote_ready = ready;
        }
        if let Some(position) = snapshot.log_position {
            if !position.is_zero() && position > self.log_position {
                trace!(%position, "advancing log position");
                self.log_position = position;
            }
        }
        outcome.remote_acted
    }

    /// Offers `item` in the lowest free slot.
    ///
    /// # Errors
    /// [`TradeError::InvalidRequest`] if the item is already offered.
    pub fn add_item(&mut self, item: ItemRef) -> TradeResult<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }
        if self.ledger.slot_of(&item).is_some() {
            return Err(InvalidRequestKind::DuplicateItem { item }.into());
        }
        let slot = self.ledger.next_free_slot();
        let accepted = self.send(Command::AddItem { item, slot });
        if accepted {
            self.ledger.assign(slot, item);
        }
        Ok(accepted)
    }

    /// Withdraws `item` from the local offer.
    ///
    /// # Errors
    /// [`TradeError::InvalidRequest`] if the item is not offered.
    pub fn remove_item(&mut self, item: ItemRef) -> TradeResult<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }
        let Some(slot) = self.ledger.slot_of(&item) else {
            return Err(InvalidRequestKind::ItemNotOffered { item }.into());
        };
        let accepted = self.send(Command::RemoveItem { item, slot });
        if accepted {
            self.ledger.release(slot);
        }
        Ok(accepted)
    }

    /// Withdraws every offered item. Returns `true` if every removal was confirmed.
    pub fn remove_all_items(&mut self) -> TradeResult<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }
        let items: Vec<ItemRef> = self.ledger.intended().values().copied().collect();
        let mut all = true;
        for item in items {
            all &= self.remove_item(item)?;
        }
        Ok(all)
    }

    /// Sets or clears the local ready flag.
    ///
    /// Clearing happens locally before the request is sent, so a failed request
    /// still leaves the session unready.
    ///
    /// # Errors
    /// [`TradeError::OfferMismatch`] when readying up while the confirmed offer
    /// disagrees with the intended one. The session is aborted and nothing is sent.
    pub fn set_ready(&mut self, ready: bool) -> TradeResult<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }
        if ready {
            self.verify_offer()?;
        } else {
            self.local_ready = false;
        }
        let accepted = self.send(Command::SetReady {
            ready,
            version: self.gate.current(),
        });
        if accepted && ready {
            self.local_ready = true;
        }
        Ok(accepted)
    }

    /// Accepts the trade.
    ///
    /// # Errors
    /// [`TradeError::OfferMismatch`] under the same condition as
    /// [`set_ready(true)`](Self::set_ready).
    pub fn accept(&mut self) -> TradeResult<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }
        self.verify_offer()?;
        Ok(self.send(Command::Accept {
            version: self.gate.current(),
        }))
    }

    /// Asks the server to cancel the trade. The session stays live until a
    /// snapshot reports the closing status.
    pub fn cancel(&mut self) -> TradeResult<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }
        Ok(self.send(Command::Cancel))
    }

    /// Sends a chat line to the remote party.
    pub fn send_message(&mut self, text: impl Into<String>) -> TradeResult<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }
        Ok(self.send(Command::SendMessage {
            text: text.into(),
            log_position: self.log_position,
        }))
    }

    /// Abandons the session locally. Nothing is sent.
    pub fn close(&mut self) {
        if !self.state.is_terminal() {
            self.transition(SessionState::Closed);
        }
    }

    /// Callback registration. Callbacks run synchronously during `poll()`.
    pub fn subscribers(&mut self) -> &mut Subscribers<T> {
        &mut self.subscribers
    }

    /// Returns all notifications raised since the last call. If more than the
    /// configured queue size were raised, the oldest were discarded.
    pub fn events(&mut self) -> Drain<'_, TradeNotification<T>> {
        self.event_queue.drain(..)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last applied state version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.gate.current()
    }

    /// Current event log cursor.
    #[must_use]
    pub fn log_position(&self) -> LogPosition {
        self.log_position
    }

    /// Whether the local party is ready, as far as the session knows.
    #[must_use]
    pub fn is_local_ready(&self) -> bool {
        self.local_ready
    }

    /// Whether the remote party is ready.
    #[must_use]
    pub fn is_remote_ready(&self) -> bool {
        self.remote_ready
    }

    /// Returns `true` once the server reported the trade as completed.
    #[must_use]
    pub fn has_completed_ok(&self) -> bool {
        self.state == SessionState::Completed
    }

    /// Returns `true` once the server reported a closing status other than success.
    #[must_use]
    pub fn remote_cancelled(&self) -> bool {
        self.state == SessionState::Cancelled
    }

    /// The intended local offer, ordered by slot.
    #[must_use]
    pub fn offered_items(&self) -> &BTreeMap<Slot, ItemRef> {
        self.ledger.intended()
    }

    /// The local offer as last confirmed by the server.
    #[must_use]
    pub fn confirmed_local_offer(&self) -> &[ItemRef] {
        self.ledger.confirmed()
    }

    /// The remote party's offer as last confirmed by the server.
    #[must_use]
    pub fn remote_offer(&self) -> &[ItemRef] {
        self.reconciler.remote_offer()
    }

    /// Remote events delivered so far, oldest first.
    #[must_use]
    pub fn event_history(&self) -> &[TradeEvent<T::PartyId>] {
        self.event_log.history()
    }

    /// The local party.
    #[must_use]
    pub fn local_party(&self) -> &T::PartyId {
        &self.local_party
    }

    /// The remote party.
    #[must_use]
    pub fn remote_party(&self) -> &T::PartyId {
        &self.remote_party
    }

    fn cursor(&self) -> StatusCursor {
        StatusCursor {
            version: self.gate.current(),
            log_position: self.log_position,
        }
    }

    fn send(&mut self, command: Command) -> bool {
        let state = self.state;
        let transport = &mut self.transport;
        let accepted = self
            .retry
            .execute(|| state.is_terminal(), || transport.send_command(&command));
        debug!(command = command.name(), accepted, "command sent");
        accepted
    }

    fn verify_offer(&mut self) -> TradeResult<()> {
        if let Err(error) = self.ledger.validate() {
            self.abort(ViolationKind::OfferLedger, &error);
            return Err(error);
        }
        Ok(())
    }

    fn abort(&mut self, kind: ViolationKind, error: &TradeError) {
        report_violation_to!(
            &self.violation_observer,
            self.gate.current(),
            ViolationSeverity::Critical,
            kind,
            "session aborted: {}",
            error
        );
        self.transition(SessionState::Aborted);
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state change");
        self.state = next;
    }

    fn warn(&mut self, kind: ViolationKind, message: String) {
        report_violation_to!(
            &self.violation_observer,
            self.gate.current(),
            ViolationSeverity::Warning,
            kind,
            "{}",
            message
        );
        self.notify(TradeNotification::warning(message));
    }

    fn notify(&mut self, notification: TradeNotification<T>) {
        self.subscribers.deliver(&notification);
        self.event_queue.push_back(notification);
        while self.event_queue.len() > self.event_queue_size {
            self.event_queue.pop_front();
        }
    }
}

impl<T: Config> InvariantChecker for TradeSession<T> {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.ledger.check_invariants()?;
        if self.has_completed_ok() && self.remote_cancelled() {
            return Err(InvariantViolation::new(
                "TradeSession",
                "completed and cancelled at the same time",
            ));
        }
        if self.event_queue.len() > self.event_queue_size {
            return Err(InvariantViolation::new(
                "TradeSession",
                "event queue exceeds its bound",
            )
            .with_details(format!(
                "len={}, max={}",
                self.event_queue.len(),
                self.event_queue_size
            )));
        }
        if !self.event_log.is_empty() && self.state == SessionState::NotStarted {
            return Err(InvariantViolation::new(
                "TradeSession",
                "events delivered before the session started",
            ));
        }
        Ok(())
    }
}

impl<T: Config> std::fmt::Debug for TradeSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            local_party,
            remote_party,
            transport: _,
            retry,
            state,
            gate,
            log_position,
            local_ready,
            remote_ready,
            ledger,
            reconciler,
            event_log,
            inventories,
            subscribers,
            event_queue,
            event_queue_size,
            violation_observer,
        } = self;

        f.debug_struct("TradeSession")
            .field("local_party", local_party)
            .field("remote_party", remote_party)
            .field("retry", retry)
            .field("state", state)
            .field("gate", gate)
            .field("log_position", log_position)
            .field("local_ready", local_ready)
            .field("remote_ready", remote_ready)
            .field("ledger", ledger)
            .field("reconciler", reconciler)
            .field("delivered_events", &event_log.len())
            .field("inventories", inventories)
            .field("subscribers", subscribers)
            .field("queued_notifications", &event_queue.len())
            .field("event_queue_size", event_queue_size)
            .field("has_violation_observer", &violation_observer.is_some())
            .finish()
    }
}
