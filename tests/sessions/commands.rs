//! Command integration tests: slots, ledger validation, terminal behavior.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::sync::Arc;

use crate::common::stubs::{ScriptedTransport, StubConfig};
use crate::common::{hat, start_session, start_session_with, RecordingBackoff, ME, PEER};
use trade_session::telemetry::{CollectingObserver, ViolationKind};
use trade_session::{
    assert_violation, Command, InvalidRequestKind, LogPosition, PartyStatus, SessionBuilder,
    SessionState, Slot, Snapshot, TradeError, TradeSession, TradeStatus, Version,
};
use web_time::Duration;

fn slots_of(commands: &[Command]) -> Vec<(Slot, u64)> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::AddItem { item, slot } => Some((*slot, item.asset_id.get())),
            _ => None,
        })
        .collect()
}

/// A running session whose server confirmed `confirmed` as the local offer at version 1.
fn with_confirmed_offer(
    transport: &ScriptedTransport,
    confirmed: &[u64],
) -> TradeSession<StubConfig> {
    transport.push_snapshot(Snapshot::ongoing(Version::new(1)).changed().with_offers(
        PartyStatus::offering(confirmed.iter().map(|a| hat(*a))),
        PartyStatus::offering([]),
    ));
    let mut session = start_session(transport);
    assert!(session.poll().unwrap());
    session
}

#[test]
fn slots_are_assigned_from_zero() {
    let transport = ScriptedTransport::accepting();
    let mut session = start_session(&transport);

    for asset in [10, 11, 12] {
        assert!(session.add_item(hat(asset)).unwrap());
    }

    assert_eq!(
        slots_of(&transport.commands()),
        vec![(Slot::new(0), 10), (Slot::new(1), 11), (Slot::new(2), 12)]
    );
}

#[test]
fn freed_slot_is_reused() {
    let transport = ScriptedTransport::accepting();
    let mut session = start_session(&transport);
    for asset in [10, 11, 12] {
        session.add_item(hat(asset)).unwrap();
    }

    assert!(session.remove_item(hat(11)).unwrap());
    assert!(session.add_item(hat(13)).unwrap());

    assert_eq!(session.offered_items().get(&Slot::new(1)), Some(&hat(13)));
    let commands = transport.commands();
    assert_eq!(
        commands[3],
        Command::RemoveItem {
            item: hat(11),
            slot: Slot::new(1)
        }
    );
    assert_eq!(slots_of(&commands).last(), Some(&(Slot::new(1), 13)));
}

#[test]
fn failed_add_does_not_take_a_slot() {
    let transport = ScriptedTransport::default();
    let mut session = start_session(&transport);

    assert!(!session.add_item(hat(10)).unwrap());

    assert!(session.offered_items().is_empty());
    transport.set_accept_commands(true);
    assert!(session.add_item(hat(10)).unwrap());
    assert_eq!(session.offered_items().get(&Slot::new(0)), Some(&hat(10)));
}

#[test]
fn failed_remove_keeps_the_slot() {
    let transport = ScriptedTransport::accepting();
    let mut session = start_session(&transport);
    session.add_item(hat(10)).unwrap();
    transport.set_accept_commands(false);

    assert!(!session.remove_item(hat(10)).unwrap());

    assert_eq!(session.offered_items().len(), 1);
}

#[test]
fn removing_unknown_item_is_refused_locally() {
    let transport = ScriptedTransport::accepting();
    let mut session = start_session(&transport);

    let err = session.remove_item(hat(99)).unwrap_err();

    assert_eq!(
        err,
        TradeError::InvalidRequest {
            kind: InvalidRequestKind::ItemNotOffered { item: hat(99) }
        }
    );
    assert!(!err.is_fatal());
    assert_eq!(transport.command_count(), 0);
    assert_eq!(session.state(), SessionState::NotStarted);
}

#[test]
fn ready_with_matching_offer_is_sent() {
    let transport = ScriptedTransport::accepting();
    let mut session = with_confirmed_offer(&transport, &[]);

    assert!(session.set_ready(true).unwrap());

    assert!(session.is_local_ready());
    assert_eq!(
        transport.commands(),
        vec![Command::SetReady {
            ready: true,
            version: Version::new(1)
        }]
    );
}

#[test]
fn ready_with_drifted_offer_aborts_without_sending() {
    let transport = ScriptedTransport::accepting();
    let observer = Arc::new(CollectingObserver::new());
    let mut session = SessionBuilder::<StubConfig>::new()
        .with_local_party(ME)
        .with_remote_party(PEER)
        .with_backoff(Arc::new(RecordingBackoff::default()))
        .with_violation_observer(observer.clone())
        .start_session(transport.clone())
        .unwrap();
    session.add_item(hat(1)).unwrap();
    session.add_item(hat(2)).unwrap();
    transport.push_snapshot(Snapshot::ongoing(Version::new(1)).changed().with_offers(
        PartyStatus::offering([hat(1)]),
        PartyStatus::offering([]),
    ));
    session.poll().unwrap();
    let sent_before = transport.command_count();

    let err = session.set_ready(true).unwrap_err();

    match &err {
        TradeError::OfferMismatch {
            intended,
            confirmed,
        } => {
            assert_eq!(intended, &vec![hat(1), hat(2)]);
            assert_eq!(confirmed, &vec![hat(1)]);
        }
        other => panic!("expected offer mismatch, got {other:?}"),
    }
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Aborted);
    assert_eq!(transport.command_count(), sent_before);
    assert_violation!(observer, ViolationKind::OfferLedger);
}

#[test]
fn accept_with_drifted_offer_aborts_without_sending() {
    let transport = ScriptedTransport::accepting();
    let mut session = start_session(&transport);
    session.add_item(hat(1)).unwrap();
    transport.push_snapshot(Snapshot::ongoing(Version::new(1)).changed().with_offers(
        PartyStatus::offering([]),
        PartyStatus::offering([hat(5)]),
    ));
    session.poll().unwrap();
    let sent_before = transport.command_count();

    assert!(matches!(
        session.accept(),
        Err(TradeError::OfferMismatch { .. })
    ));
    assert_eq!(transport.command_count(), sent_before);
}

#[test]
fn accept_carries_current_version() {
    let transport = ScriptedTransport::accepting();
    let mut session = with_confirmed_offer(&transport, &[]);

    assert!(session.accept().unwrap());

    assert_eq!(
        transport.commands(),
        vec![Command::Accept {
            version: Version::new(1)
        }]
    );
}

#[test]
fn unready_clears_flag_even_when_rejected() {
    let transport = ScriptedTransport::accepting();
    let mut session = with_confirmed_offer(&transport, &[]);
    assert!(session.set_ready(true).unwrap());
    transport.set_accept_commands(false);

    assert!(!session.set_ready(false).unwrap());

    assert!(!session.is_local_ready());
}

#[test]
fn rejected_command_is_attempted_three_times() {
    let transport = ScriptedTransport::default();
    let backoff = Arc::new(RecordingBackoff::default());
    let mut session = start_session_with(&transport, backoff.clone());

    assert!(!session.cancel().unwrap());

    assert_eq!(transport.commands(), vec![Command::Cancel; 3]);
    assert_eq!(
        backoff.waits(),
        vec![Duration::from_millis(600), Duration::from_millis(600)]
    );
}

#[test]
fn command_succeeding_on_retry_stops_early() {
    let transport = ScriptedTransport::default();
    transport.push_command_result(false);
    transport.push_command_result(true);
    let mut session = start_session(&transport);

    assert!(session.send_message("hello").unwrap());

    assert_eq!(transport.command_count(), 2);
}

#[test]
fn message_carries_log_position() {
    let transport = ScriptedTransport::accepting();
    transport
        .push_snapshot(Snapshot::ongoing(Version::ZERO).with_log_position(LogPosition::new(9)));
    let mut session = start_session(&transport);
    session.poll().unwrap();

    session.send_message("gg").unwrap();

    assert_eq!(
        transport.commands(),
        vec![Command::SendMessage {
            text: "gg".to_owned(),
            log_position: LogPosition::new(9)
        }]
    );
}

#[test]
fn terminal_session_sends_nothing() {
    for status in [TradeStatus::Completed, TradeStatus::Cancelled] {
        let transport = ScriptedTransport::accepting();
        let mut session = start_session(&transport);
        session.add_item(hat(1)).unwrap();
        transport.push_snapshot(Snapshot::with_status(status, Version::ZERO));
        session.poll().unwrap();
        assert!(session.state().is_terminal());
        let sent_before = transport.command_count();

        assert!(!session.add_item(hat(2)).unwrap());
        assert!(!session.remove_item(hat(1)).unwrap());
        assert!(!session.set_ready(true).unwrap());
        assert!(!session.set_ready(false).unwrap());
        assert!(!session.accept().unwrap());
        assert!(!session.cancel().unwrap());
        assert!(!session.send_message("late").unwrap());
        assert!(!session.remove_all_items().unwrap());

        assert_eq!(transport.command_count(), sent_before, "{status:?}");
    }
}

#[test]
fn remove_all_on_terminal_session_with_nothing_offered_fails() {
    let transport = ScriptedTransport::accepting();
    transport.push_snapshot(Snapshot::with_status(TradeStatus::Cancelled, Version::ZERO));
    let mut session = start_session(&transport);
    session.poll().unwrap();
    assert!(session.offered_items().is_empty());

    assert!(!session.remove_all_items().unwrap());

    assert!(transport.commands().is_empty());
}

#[test]
fn remove_all_withdraws_every_item() {
    let transport = ScriptedTransport::accepting();
    let mut session = start_session(&transport);
    for asset in [1, 2, 3] {
        session.add_item(hat(asset)).unwrap();
    }

    assert!(session.remove_all_items().unwrap());

    assert!(session.offered_items().is_empty());
    let removed = transport
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::RemoveItem { .. }))
        .count();
    assert_eq!(removed, 3);
}

#[test]
fn close_abandons_without_contacting_server() {
    let transport = ScriptedTransport::accepting();
    let mut session = start_session(&transport);

    session.close();

    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.poll().unwrap());
    assert!(!session.accept().unwrap());
    assert!(transport.commands().is_empty());
    assert!(transport.status_requests().is_empty());
}
