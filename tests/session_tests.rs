//! End-to-end session lifecycle tests against the mock native boundary.
//!
//! Covers the full connect → listen → event-delivery → disconnect cycle,
//! precondition fail-fast behavior (asserted down to boundary call counts),
//! re-sync reconciliation after partial native failures, and the
//! single-consumer event contract.

use callerid_bridge::{
    CallerEvent, EventBridge, MockBridge, NativePortBridge, SessionError, SessionManager,
    SessionPhase,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_millis(200);

fn setup() -> (MockBridge, SessionManager) {
    let bridge = MockBridge::with_ports(["COM3", "COM5"]);
    let manager = SessionManager::new(Arc::new(bridge.clone()));
    (bridge, manager)
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[tokio::test]
async fn connect_success_selects_port() {
    let (_, manager) = setup();

    manager.connect("COM5").await.expect("connect");

    let status = manager.status();
    assert_eq!(status.selected_port.as_deref(), Some("COM5"));
    assert!(status.connected);
    assert!(!status.listening);
    assert_eq!(status.phase, SessionPhase::Connected);
}

#[tokio::test]
async fn connect_failure_surfaces_native_message() {
    let (bridge, manager) = setup();
    bridge.fail_connect("access denied");

    let err = manager.connect("COM9").await.unwrap_err();
    assert!(matches!(err, SessionError::Connect(ref m) if m.contains("access denied")));

    let status = manager.status();
    assert!(!status.connected);
    assert_eq!(status.selected_port, None);
    assert_eq!(status.phase, SessionPhase::Disconnected);
}

#[tokio::test]
async fn disconnect_clears_listening_even_when_native_fails() {
    let (bridge, manager) = setup();
    manager.connect("COM3").await.unwrap();
    manager.start_listening().await.unwrap();
    bridge.fail_disconnect("device busy");

    let err = manager.disconnect().await.unwrap_err();
    assert!(matches!(err, SessionError::Disconnect(ref m) if m.contains("device busy")));

    // The native layer kept the connection alive but dropped the listener;
    // the re-sync reflects that, and listening is false regardless.
    let status = manager.status();
    assert!(!status.listening);
    assert!(status.connected);
    assert_eq!(status.selected_port.as_deref(), Some("COM3"));
}

#[tokio::test]
async fn disconnect_success_returns_to_initial_state() {
    let (_, manager) = setup();
    manager.connect("COM3").await.unwrap();
    manager.start_listening().await.unwrap();

    manager.disconnect().await.expect("disconnect");

    let status = manager.status();
    assert_eq!(status, Default::default());
}

#[tokio::test]
async fn full_cycle_preserves_listening_invariant() {
    let (bridge, manager) = setup();

    let check = |manager: &SessionManager| {
        let st = manager.status();
        assert!(!st.listening || st.connected, "listening implies connected");
    };

    check(&manager);
    let _ = manager.connect("COM3").await;
    check(&manager);
    let _ = manager.start_listening().await;
    check(&manager);
    bridge.fail_stop_listening("stuck");
    let _ = manager.stop_listening().await;
    check(&manager);
    bridge.force_status(false, true);
    let _ = manager.disconnect().await;
    check(&manager);
}

// ============================================================================
// Precondition fail-fast (zero boundary calls)
// ============================================================================

#[tokio::test]
async fn start_listening_while_disconnected_makes_no_boundary_calls() {
    let (bridge, manager) = setup();
    let before = bridge.calls();

    let err = manager.start_listening().await.unwrap_err();

    assert_eq!(err, SessionError::NotConnected);
    assert_eq!(bridge.calls(), before, "no native-boundary calls expected");
}

#[tokio::test]
async fn stop_listening_while_only_connected_fails_and_leaves_state() {
    let (bridge, manager) = setup();
    manager.connect("COM3").await.unwrap();
    let before_status = manager.status();
    let before_calls = bridge.calls();

    let err = manager.stop_listening().await.unwrap_err();

    assert_eq!(err, SessionError::NotListening);
    assert_eq!(manager.status(), before_status);
    assert_eq!(bridge.calls(), before_calls);
}

#[tokio::test]
async fn disconnect_while_disconnected_makes_no_boundary_calls() {
    let (bridge, manager) = setup();

    let err = manager.disconnect().await.unwrap_err();

    assert_eq!(err, SessionError::NotConnected);
    assert_eq!(bridge.calls().total(), 0);
}

// ============================================================================
// Single-flight guard
// ============================================================================

#[tokio::test]
async fn overlapping_connect_is_rejected_as_busy() {
    let bridge = MockBridge::with_ports(["COM3"]);
    bridge.set_connect_delay(Duration::from_millis(100));
    let manager = Arc::new(SessionManager::new(Arc::new(bridge.clone())));

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.connect("COM3").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = manager.connect("COM3").await.unwrap_err();
    assert_eq!(err, SessionError::Busy);

    first.await.unwrap().expect("first connect succeeds");
    assert!(manager.status().connected);
    assert_eq!(bridge.calls().connect, 1, "second call never hit the boundary");
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn refresh_reports_catalog_in_boundary_order() {
    let (bridge, manager) = setup();
    assert_eq!(manager.refresh_ports().await.unwrap(), vec!["COM3", "COM5"]);

    bridge.set_ports(["COM5", "COM3"]);
    assert_eq!(manager.refresh_ports().await.unwrap(), vec!["COM5", "COM3"]);
}

#[tokio::test]
async fn refresh_failure_is_an_error_not_an_empty_list() {
    let (bridge, manager) = setup();
    manager.refresh_ports().await.unwrap();
    bridge.fail_list("driver unloaded");

    let err = manager.refresh_ports().await.unwrap_err();
    assert!(matches!(err, SessionError::PortList(ref m) if m.contains("driver unloaded")));
    // The previous snapshot is kept.
    assert!(manager.catalog().contains("COM3"));
}

// ============================================================================
// Event delivery scenarios
// ============================================================================

#[tokio::test]
async fn caller_id_event_reaches_the_registered_handler_once() {
    let (bridge, manager) = setup();

    let ports = manager.refresh_ports().await.unwrap();
    assert_eq!(ports, vec!["COM3", "COM5"]);
    manager.connect("COM5").await.unwrap();
    manager.start_listening().await.unwrap();

    let events = EventBridge::new(bridge.subscribe());
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    events.on_caller_id(move |number| {
        seen_tx.send(number).unwrap();
    });

    bridge.emit_caller_id("+905551234567");

    let number = timeout(WAIT, seen_rx.recv()).await.unwrap().unwrap();
    assert_eq!(number, "+905551234567");
    assert!(
        timeout(WAIT, seen_rx.recv()).await.is_err(),
        "payload must be delivered exactly once"
    );
}

#[tokio::test]
async fn handler_registered_after_event_never_sees_it() {
    let (bridge, _manager) = setup();
    let events = EventBridge::new(bridge.subscribe());

    bridge.emit_caller_id("+901112223344");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    events.on_caller_id(move |number| {
        seen_tx.send(number).unwrap();
    });

    assert!(
        timeout(WAIT, seen_rx.recv()).await.is_err(),
        "no replay of past events"
    );
}

#[tokio::test]
async fn error_events_are_forwarded_with_native_payload() {
    let (bridge, _manager) = setup();
    let events = EventBridge::new(bridge.subscribe());

    let (err_tx, mut err_rx) = mpsc::unbounded_channel();
    events.on_error(move |message| {
        err_tx.send(message).unwrap();
    });

    bridge.emit_error("checksum mismatch");

    let message = timeout(WAIT, err_rx.recv()).await.unwrap().unwrap();
    assert_eq!(message, "checksum mismatch");
}

#[tokio::test]
async fn events_are_delivered_in_boundary_order() {
    let (bridge, _manager) = setup();
    let events = EventBridge::new(bridge.subscribe());

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    events.on_caller_id(move |number| {
        seen_tx.send(number).unwrap();
    });

    for number in ["111", "222", "333"] {
        bridge.emit_caller_id(number);
    }

    for expected in ["111", "222", "333"] {
        let number = timeout(WAIT, seen_rx.recv()).await.unwrap().unwrap();
        assert_eq!(number, expected);
    }
}

// ============================================================================
// Status watch
// ============================================================================

#[tokio::test]
async fn status_watch_tracks_committed_snapshots() {
    let (_, manager) = setup();
    let mut rx = manager.watch_status();

    manager.connect("COM3").await.unwrap();
    rx.changed().await.unwrap();
    // Skip any transients still buffered; the latest value is settled.
    let last = rx.borrow_and_update().clone();
    assert!(matches!(
        last.phase,
        SessionPhase::Connected
            | SessionPhase::Connecting
            | SessionPhase::Reconciling
    ));

    manager.start_listening().await.unwrap();
    let last = rx.borrow_and_update().clone();
    assert_eq!(last.phase, SessionPhase::Listening);
    assert!(last.listening && last.connected);
}

#[tokio::test]
async fn caller_event_is_consumable_directly_from_the_stream() {
    // A composition root may bypass EventBridge and consume the raw stream.
    let (bridge, _manager) = setup();
    let mut rx = bridge.subscribe();

    bridge.emit_caller_id("+903335557788");

    let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(event, CallerEvent::Received("+903335557788".into()));
}
