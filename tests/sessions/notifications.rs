//! Callback and queue delivery tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::cell::RefCell;
use std::rc::Rc;

use crate::common::stubs::{ScriptedTransport, StubInventory, StubItem, StubSchema};
use crate::common::test_utils::{BACKPACK, TF2};
use crate::common::{hat, start_session, PEER};
use trade_session::{
    AssetId, EventRecord, NotificationKind, SessionBuilder, Snapshot, TradeNotification,
    TradeStatus, Version,
};

use crate::common::stubs::StubConfig;

#[test]
fn initialized_fires_once_before_anything_else() {
    let transport = ScriptedTransport::default();
    transport.push_snapshot(
        Snapshot::ongoing(Version::ZERO).with_event(EventRecord::chat(PEER, "hi", 1)),
    );
    let mut session = start_session(&transport);
    let log = Rc::new(RefCell::new(Vec::new()));
    let init_log = log.clone();
    let chat_log = log.clone();
    session
        .subscribers()
        .on_initialized(move || init_log.borrow_mut().push("init".to_owned()))
        .on_chat(move |text| chat_log.borrow_mut().push(format!("chat {text}")));

    session.poll().unwrap();
    session.poll().unwrap();

    assert_eq!(*log.borrow(), vec!["init", "chat hi"]);
}

#[test]
fn item_added_is_resolved_from_public_inventory() {
    let transport = ScriptedTransport::default();
    transport.add_public_inventory(TF2, BACKPACK, StubInventory::with_items([(10, 166)]));
    transport.push_snapshot(
        Snapshot::ongoing(Version::ZERO).with_event(EventRecord::item(PEER, 0, hat(10), 1)),
    );
    let mut session = start_session(&transport);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    session
        .subscribers()
        .on_item_added(move |n| sink.borrow_mut().push(n.clone()));

    session.poll().unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].item, Some(hat(10)));
    assert_eq!(
        seen[0].resolved,
        Some(StubItem {
            asset_id: AssetId::new(10),
            defindex: 166
        })
    );
    assert_eq!(
        seen[0].schema,
        Some(StubSchema {
            name: "defindex 166".to_owned()
        })
    );
}

#[test]
fn item_removed_falls_back_to_private_inventory() {
    let transport = ScriptedTransport::default();
    transport.add_public_inventory(TF2, BACKPACK, StubInventory::with_items([(10, 166)]));
    transport.add_private_inventory(TF2, BACKPACK, StubInventory::with_items([(20, 5021)]));
    transport.push_snapshot(
        Snapshot::ongoing(Version::ZERO).with_event(EventRecord::item(PEER, 1, hat(20), 1)),
    );
    let mut session = start_session(&transport);

    session.poll().unwrap();

    let removed: Vec<_> = session
        .events()
        .filter_map(|n| match n {
            TradeNotification::ItemRemoved(item) => Some(item),
            _ => None,
        })
        .collect();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].resolved.as_ref().map(|i| i.defindex), Some(5021));
    assert_eq!(transport.private_fetches(), 1);
}

#[test]
fn unresolvable_item_still_notifies_with_nothing_resolved() {
    let transport = ScriptedTransport::default();
    transport.push_snapshot(
        Snapshot::ongoing(Version::ZERO).with_event(EventRecord::item(PEER, 0, hat(77), 1)),
    );
    let mut session = start_session(&transport);
    let warnings = Rc::new(RefCell::new(0));
    let counter = warnings.clone();
    session
        .subscribers()
        .on_warning(move |_| *counter.borrow_mut() += 1);

    assert!(session.poll().unwrap());

    assert_eq!(*warnings.borrow(), 1);
    let added: Vec<_> = session
        .events()
        .filter_map(|n| match n {
            TradeNotification::ItemAdded(item) => Some(item),
            _ => None,
        })
        .collect();
    assert_eq!(added.len(), 1);
    assert!(!added[0].is_resolved());
    assert!(added[0].schema.is_none());
}

#[test]
fn incomplete_item_record_still_notifies() {
    let mut record = EventRecord::item(PEER, 0, hat(30), 1);
    record.asset_id = None;
    let transport = ScriptedTransport::default();
    transport.push_snapshot(Snapshot::ongoing(Version::ZERO).with_event(record));
    let mut session = start_session(&transport);

    assert!(session.poll().unwrap());

    let queued: Vec<_> = session.events().collect();
    let kinds: Vec<_> = queued.iter().map(TradeNotification::kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::Initialized,
            NotificationKind::Warning,
            NotificationKind::ItemAdded
        ]
    );
    match &queued[2] {
        TradeNotification::ItemAdded(item) => {
            assert_eq!(item.item, None);
            assert!(!item.is_resolved());
        }
        other => panic!("expected item added, got {other:?}"),
    }
}

#[test]
fn unknown_action_warns_and_later_events_still_arrive() {
    let transport = ScriptedTransport::default();
    transport.push_snapshot(
        Snapshot::ongoing(Version::ZERO)
            .with_event(EventRecord::bare(PEER, 6, 1))
            .with_event(EventRecord::bare(PEER, 2, 2)),
    );
    let mut session = start_session(&transport);

    session.poll().unwrap();

    let kinds: Vec<_> = session.events().map(|n| n.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::Initialized,
            NotificationKind::Warning,
            NotificationKind::ReadyChanged
        ]
    );
    assert!(session.is_remote_ready());
}

#[test]
fn callbacks_and_queue_see_the_same_sequence() {
    let transport = ScriptedTransport::default();
    transport.push_snapshot(
        Snapshot::ongoing(Version::ZERO)
            .with_event(EventRecord::bare(PEER, 2, 1))
            .with_event(EventRecord::bare(PEER, 4, 2))
            .with_event(EventRecord::bare(PEER, 3, 3)),
    );
    let mut session = start_session(&transport);
    let ready = Rc::new(RefCell::new(Vec::new()));
    let accepted = Rc::new(RefCell::new(0));
    let ready_sink = ready.clone();
    let accept_sink = accepted.clone();
    session
        .subscribers()
        .on_ready_changed(move |r| ready_sink.borrow_mut().push(r))
        .on_accepted(move || *accept_sink.borrow_mut() += 1);

    session.poll().unwrap();

    assert_eq!(*ready.borrow(), vec![true, false]);
    assert_eq!(*accepted.borrow(), 1);
    let queued: Vec<_> = session.events().collect();
    assert_eq!(
        queued,
        vec![
            TradeNotification::Initialized,
            TradeNotification::ReadyChanged { ready: true },
            TradeNotification::Accepted,
            TradeNotification::ReadyChanged { ready: false },
        ]
    );
    assert!(session.events().next().is_none());
}

#[test]
fn closed_callback_receives_status() {
    let transport = ScriptedTransport::default();
    transport.push_snapshot(Snapshot::with_status(TradeStatus::SessionExpired, Version::ZERO));
    let mut session = start_session(&transport);
    let closed = Rc::new(RefCell::new(None));
    let sink = closed.clone();
    session
        .subscribers()
        .on_closed(move |status| *sink.borrow_mut() = Some(status));

    session.poll().unwrap();

    assert_eq!(*closed.borrow(), Some(TradeStatus::SessionExpired));
}

#[test]
fn queue_keeps_only_the_newest_notifications() {
    let transport = ScriptedTransport::default();
    let mut snapshot = Snapshot::ongoing(Version::ZERO);
    for i in 0..15 {
        snapshot = snapshot.with_event(EventRecord::chat(PEER, format!("line {i}"), i));
    }
    transport.push_snapshot(snapshot);
    let mut session = SessionBuilder::<StubConfig>::new()
        .with_local_party(crate::common::ME)
        .with_remote_party(PEER)
        .with_backoff(std::sync::Arc::new(trade_session::NoBackoff))
        .with_event_queue_size(10)
        .unwrap()
        .start_session(transport.clone())
        .unwrap();

    session.poll().unwrap();

    let queued: Vec<_> = session.events().collect();
    assert_eq!(queued.len(), 10);
    assert_eq!(
        queued[0],
        TradeNotification::Chat {
            text: "line 5".to_owned()
        }
    );
    assert_eq!(session.event_history().len(), 15);
}
