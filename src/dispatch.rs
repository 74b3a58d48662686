//! Turns the event records of a same-version snapshot into notifications.
//!
//! Records are processed in server order. A record is delivered at most once:
//! it is skipped when the [`EventLog`] already holds an equal event, and events
//! performed by the local party are never reported back. Unknown action codes and
//! unresolvable items produce warnings but do not stop processing.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::event_log::EventLog;
use crate::inventory::InventoryCache;
use crate::notify::{ItemNotification, TradeNotification};
use crate::snapshot::{EventRecord, TradeEvent, TradeEventKind};
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{report_violation_to, Config, ItemRef, TradeTransport, Version};

/// Result of processing one batch of event records.
pub struct DispatchOutcome<T: Config> {
    /// Notifications to raise, in order.
    pub notifications: Vec<TradeNotification<T>>,
    /// `true` if at least one new remote event was processed.
    pub remote_acted: bool,
    /// The remote ready flag after the batch, if a ready event was seen.
    pub remote_ready: Option<bool>,
}

impl<T: Config> Default for DispatchOutcome<T> {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
            remote_acted: false,
            remote_ready: None,
        }
    }
}

impl<T: Config> std::fmt::Debug for DispatchOutcome<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchOutcome")
            .field("notifications", &self.notifications)
            .field("remote_acted", &self.remote_acted)
            .field("remote_ready", &self.remote_ready)
            .finish()
    }
}

/// Everything the dispatcher borrows from the session for one batch.
pub struct EventDispatcher<'a, T: Config> {
    /// The local party; its own events are skipped.
    pub local_party: &'a T::PartyId,
    /// The remote party; owner of the inventories items are resolved against.
    pub remote_party: &'a T::PartyId,
    /// Applied version, attached to reported violations.
    pub version: Version,
    /// Already delivered events.
    pub event_log: &'a mut EventLog<T::PartyId>,
    /// Inventory cache used for item resolution.
    pub inventories: &'a mut InventoryCache<T>,
    /// Transport used to fetch inventories on a cache miss.
    pub transport: &'a mut dyn TradeTransport<T>,
    /// Where anomalies are reported.
    pub observer: &'a Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config> EventDispatcher<'_, T> {
    /// Processes `records` in order.
    pub fn dispatch(&mut self, records: &[EventRecord<T::PartyId>]) -> DispatchOutcome<T> {
        let mut outcome = DispatchOutcome::default();
        for record in records {
            let event = record.to_event();
            if self.event_log.contains(&event) {
                trace!(timestamp = event.timestamp, "skipping delivered event");
                continue;
            }
            if &event.actor == self.local_party {
                trace!(timestamp = event.timestamp, "skipping own event");
                continue;
            }
            self.event_log.record(event.clone());
            outcome.remote_acted = true;
            self.handle(&event, &mut outcome);
        }
        debug!(
            records = records.len(),
            notifications = outcome.notifications.len(),
            remote_acted = outcome.remote_acted,
            "dispatched event batch"
        );
        outcome
    }

    fn handle(&mut self, event: &TradeEvent<T::PartyId>, outcome: &mut DispatchOutcome<T>) {
        match event.kind {
            TradeEventKind::ItemAdded | TradeEventKind::ItemRemoved => {
                let notification = match event.item().copied() {
                    Some(item) => self.resolve(item, outcome),
                    None => {
                        self.warn(
                            outcome,
                            ViolationKind::EventDispatch,
                            format!("item event at {} carries no item", event.timestamp),
                        );
                        ItemNotification::unresolved(None)
                    }
                };
                outcome.notifications.push(match event.kind {
                    TradeEventKind::ItemAdded => TradeNotification::ItemAdded(notification),
                    _ => TradeNotification::ItemRemoved(notification),
                });
            }
            TradeEventKind::ReadySet | TradeEventKind::ReadyUnset => {
                let ready = event.kind == TradeEventKind::ReadySet;
                outcome.remote_ready = Some(ready);
                outcome
                    .notifications
                    .push(TradeNotification::ReadyChanged { ready });
            }
            TradeEventKind::Accepted => outcome.notifications.push(TradeNotification::Accepted),
            TradeEventKind::Chat => {
                let text = event.text().unwrap_or_default().to_owned();
                outcome.notifications.push(TradeNotification::Chat { text });
            }
            TradeEventKind::Unknown(code) => self.warn(
                outcome,
                ViolationKind::EventDispatch,
                format!("unknown action code {code}"),
            ),
        }
    }

    /// Looks the item up in the public inventory, then the private one.
    fn resolve(&mut self, item: ItemRef, outcome: &mut DispatchOutcome<T>) -> ItemNotification<T> {
        let public = self
            .inventories
            .public(
                &mut *self.transport,
                self.remote_party,
                item.app_id,
                item.context_id,
            )
            .and_then(|inv| lookup(inv, item));
        let found = match public {
            Some(found) => Some(found),
            None => self
                .inventories
                .private(
                    &mut *self.transport,
                    self.remote_party,
                    item.app_id,
                    item.context_id,
                )
                .and_then(|inv| lookup(inv, item)),
        };

        match found {
            Some((resolved, schema)) => ItemNotification {
                item: Some(item),
                schema,
                resolved: Some(resolved),
            },
            None => {
                self.warn(
                    outcome,
                    ViolationKind::ItemResolution,
                    format!("item {item} not found in any inventory"),
                );
                ItemNotification::unresolved(Some(item))
            }
        }
    }

    fn warn(&self, outcome: &mut DispatchOutcome<T>, kind: ViolationKind, message: String) {
        report_violation_to!(
            self.observer,
            self.version,
            ViolationSeverity::Warning,
            kind,
            "{}",
            message
        );
        outcome
            .notifications
            .push(TradeNotification::warning(message));
    }
}

fn lookup<T: Config>(
    inventory: &dyn crate::InventoryView<T>,
    item: ItemRef,
) -> Option<(T::Item, Option<T::SchemaItem>)> {
    let resolved = inventory.item(item.asset_id)?;
    let schema = inventory.schema_item(&resolved);
    Some((resolved, schema))
}
