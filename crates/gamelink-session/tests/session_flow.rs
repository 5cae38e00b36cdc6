//! Integration tests for the session manager over the memory transport.
//!
//! The memory transport stands in for the network: tests decide when the
//! "server" accepts, drops, or sends, and then inspect exactly what the
//! client put on the wire.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gamelink_protocol::{DeliveryTier, HandshakeKind, HandshakePayload, PROTOCOL_NAME};
use gamelink_session::{
    ConnectionStatus, IdentityProvider, LocalIdentity, SessionConfig, SessionError,
    SessionEvent, SessionEvents, SessionManager, SessionState,
};
use gamelink_transport::{
    IncomingKind, IncomingMessage, MemoryTransport, MemoryTransportHandle, OutgoingMessage,
    SendMode, TransportStatus,
};
use tokio::sync::mpsc::error::TryRecvError;

// =========================================================================
// Helpers
// =========================================================================

type Manager = SessionManager<MemoryTransport>;

fn fast_config(platform: &str) -> SessionConfig {
    SessionConfig {
        platform: platform.to_string(),
        connect_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(5),
        idle_backoff: Duration::from_millis(1),
        teardown_timeout: Duration::from_millis(200),
        ..SessionConfig::default()
    }
}

fn build(
    config: SessionConfig,
    auto_accept: bool,
) -> (Manager, SessionEvents, MemoryTransportHandle) {
    let (transport, handle) = if auto_accept {
        MemoryTransport::auto_accept()
    } else {
        MemoryTransport::pending()
    };
    let (manager, events) = SessionManager::new(transport, config).expect("transport starts");
    let manager = manager.with_local_identity(LocalIdentity::new("TESTBOX"));
    (manager, events, handle)
}

/// A GOG-platform manager whose server accepts immediately.
fn accepting() -> (Manager, SessionEvents, MemoryTransportHandle) {
    build(fast_config("GOG"), true)
}

async fn next_event(events: &mut SessionEvents) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("event should arrive in time")
        .expect("event channel should be open")
}

/// Gives the receive loop time to drain whatever is queued.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

fn assert_no_more_events(events: &mut SessionEvents) {
    assert!(
        matches!(events.try_recv(), Err(TryRecvError::Empty)),
        "no further events expected"
    );
}

fn decode(bytes: &[u8]) -> HandshakePayload {
    HandshakePayload::decode(bytes, PROTOCOL_NAME).expect("valid handshake")
}

struct FakeService {
    ready: bool,
}

impl IdentityProvider for FakeService {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn initialize(&self) -> bool {
        false
    }

    fn display_name(&self) -> String {
        "Courier".into()
    }

    fn platform_id(&self) -> String {
        "76561197960287930".into()
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_connect_sends_hail_and_reaches_connected() {
    let (manager, mut events, handle) = accepting();

    manager.connect("203.0.113.5", 14192).await.unwrap();

    assert_eq!(manager.state(), SessionState::Connected);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Connected)
    );

    let connects = handle.connects();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0].endpoint, "203.0.113.5:14192".parse::<SocketAddr>().unwrap());

    let hail = decode(&connects[0].hail);
    assert_eq!(hail.kind, HandshakeKind::ConnectRequest);
    assert_eq!(hail.platform, "GOG");
    assert_eq!(hail.username, "Player_74386");
    assert_eq!(hail.platform_id, "GOG_00012292");
}

#[tokio::test]
async fn test_post_ack_initialization_is_sent_once_reliable_ordered() {
    let (manager, _events, handle) = accepting();

    manager.connect("203.0.113.5", 14192).await.unwrap();

    let sent = handle.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].mode, SendMode::ReliableOrdered);

    let init = decode(&sent[0].data);
    let hail = decode(&handle.connects()[0].hail);
    assert_eq!(init.kind, HandshakeKind::Initialize);
    assert_eq!(
        (init.platform, init.username, init.platform_id),
        (hail.platform, hail.username, hail.platform_id)
    );
}

#[tokio::test]
async fn test_initialization_precedes_application_data() {
    let (manager, _events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();

    manager
        .send_message(b"position", DeliveryTier::SequencedUnreliable)
        .unwrap();

    let sent = handle.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(decode(&sent[0].data).kind, HandshakeKind::Initialize);
    assert_eq!(sent[1].data, b"position");
    assert_eq!(sent[1].mode, SendMode::UnreliableSequenced);

    let handshakes = sent
        .iter()
        .filter(|m| HandshakePayload::decode(&m.data, PROTOCOL_NAME).is_ok())
        .count();
    assert_eq!(handshakes, 1, "exactly one initialization message");
}

#[tokio::test]
async fn test_networked_identity_goes_into_hail() {
    let (manager, _events, handle) = build(fast_config("Steam"), true);
    let manager = manager.with_identity_service(Arc::new(FakeService { ready: true }));

    manager.connect("203.0.113.5", 14192).await.unwrap();

    let hail = decode(&handle.connects()[0].hail);
    assert_eq!(hail.platform, "Steam");
    assert_eq!(hail.username, "Courier");
    assert_eq!(hail.platform_id, "76561197960287930");
}

// =========================================================================
// Connect failures
// =========================================================================

#[tokio::test]
async fn test_connect_times_out_when_never_accepted() {
    let config = SessionConfig {
        connect_timeout: Duration::from_millis(100),
        ..fast_config("GOG")
    };
    let (manager, mut events, handle) = build(config, false);

    let err = manager.connect("203.0.113.5", 14192).await.unwrap_err();

    assert!(matches!(err, SessionError::ConnectTimeout(_)));
    assert_eq!(manager.state(), SessionState::Failed);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Failed)
    );
    assert_eq!(handle.disconnects(), vec!["Connection attempt timed out"]);

    // The transport's late Disconnected report must not emit anything.
    settle().await;
    assert_eq!(manager.state(), SessionState::Failed);
    assert_no_more_events(&mut events);
}

#[tokio::test(start_paused = true)]
async fn test_default_timeout_is_thirty_seconds() {
    let config = SessionConfig {
        platform: "GOG".to_string(),
        ..SessionConfig::default()
    };
    let (manager, _events, _handle) = build(config, false);
    let started = tokio::time::Instant::now();

    let err = manager.connect("203.0.113.5", 14192).await.unwrap_err();

    assert!(matches!(err, SessionError::ConnectTimeout(d) if d == Duration::from_secs(30)));
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(manager.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_unsupported_platform_fails_fast() {
    let (manager, mut events, handle) = build(fast_config("Xbox"), true);

    let err = manager.connect("203.0.113.5", 14192).await.unwrap_err();

    assert!(matches!(err, SessionError::UnsupportedPlatform(p) if p == "Xbox"));
    assert_eq!(manager.state(), SessionState::Failed);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Failed)
    );
    assert!(handle.connects().is_empty());
}

#[tokio::test]
async fn test_every_failed_connect_raises_failed() {
    let (manager, mut events, _handle) = build(fast_config("Xbox"), true);

    manager.connect("203.0.113.5", 14192).await.unwrap_err();
    manager.connect("203.0.113.5", 14192).await.unwrap_err();

    assert_eq!(manager.state(), SessionState::Failed);
    for _ in 0..2 {
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::StatusChanged(ConnectionStatus::Failed)
        );
    }
    assert_no_more_events(&mut events);
}

#[tokio::test]
async fn test_failed_after_timeout_then_bad_address_raises_failed_again() {
    let config = SessionConfig {
        connect_timeout: Duration::from_millis(50),
        ..fast_config("GOG")
    };
    let (manager, mut events, _handle) = build(config, false);

    let first = manager.connect("203.0.113.5", 14192).await.unwrap_err();
    let second = manager.connect("not-an-ip", 14192).await.unwrap_err();

    assert!(matches!(first, SessionError::ConnectTimeout(_)));
    assert!(matches!(second, SessionError::ConnectError(_)));
    assert_eq!(
        [next_event(&mut events).await, next_event(&mut events).await],
        [
            SessionEvent::StatusChanged(ConnectionStatus::Failed),
            SessionEvent::StatusChanged(ConnectionStatus::Failed),
        ]
    );
}

#[tokio::test]
async fn test_initialization_send_failure_fails_connect_immediately() {
    let (manager, mut events, handle) = accepting();
    handle.fail_next_send("send buffer full");
    let started = tokio::time::Instant::now();

    let err = manager.connect("203.0.113.5", 14192).await.unwrap_err();

    assert!(matches!(err, SessionError::ConnectError(_)));
    let source = std::error::Error::source(&err).expect("send error as source");
    assert!(source.to_string().contains("send buffer full"));
    assert!(started.elapsed() < Duration::from_secs(1), "no wait for the timeout");
    assert_eq!(manager.state(), SessionState::Failed);
    assert_eq!(handle.disconnects(), vec!["Initialization handshake failed"]);
    assert_eq!(handle.send_count(), 0);

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Failed)
    );
    settle().await;
    assert_no_more_events(&mut events);
}

#[tokio::test]
async fn test_connect_succeeds_after_initialization_send_failure() {
    let (manager, mut events, handle) = accepting();
    handle.fail_next_send("send buffer full");
    manager.connect("203.0.113.5", 14192).await.unwrap_err();

    manager.connect("203.0.113.5", 14192).await.unwrap();

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Failed)
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Connected)
    );
    assert_eq!(handle.send_count(), 1);
}

#[tokio::test]
async fn test_identity_unavailable_without_service() {
    let (manager, mut events, handle) = build(fast_config("Steam"), true);

    let err = manager.connect("203.0.113.5", 14192).await.unwrap_err();

    assert!(matches!(err, SessionError::IdentityUnavailable(_)));
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Failed)
    );
    assert!(handle.connects().is_empty());
}

#[tokio::test]
async fn test_identity_unavailable_when_service_init_fails() {
    let (manager, _events, _handle) = build(fast_config("Steam"), true);
    let manager = manager.with_identity_service(Arc::new(FakeService { ready: false }));

    let err = manager.connect("203.0.113.5", 14192).await.unwrap_err();

    assert!(matches!(err, SessionError::IdentityUnavailable(_)));
    assert_eq!(manager.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_invalid_address_is_connect_error() {
    let (manager, _events, handle) = accepting();

    let err = manager.connect("not-an-ip", 14192).await.unwrap_err();

    assert!(matches!(err, SessionError::ConnectError(_)));
    assert_eq!(manager.state(), SessionState::Failed);
    assert!(handle.connects().is_empty());
}

#[tokio::test]
async fn test_transport_connect_failure_is_connect_error() {
    let (manager, _events, handle) = accepting();
    handle.fail_next_connect("no route to host");

    let err = manager.connect("203.0.113.5", 14192).await.unwrap_err();

    assert!(matches!(err, SessionError::ConnectError(_)));
    let source = std::error::Error::source(&err).expect("transport error as source");
    assert!(source.to_string().contains("no route to host"));
    assert_eq!(manager.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_rejection_during_connect_fails_without_waiting_for_timeout() {
    let (manager, mut events, handle) = build(fast_config("GOG"), false);

    let (result, ()) = tokio::join!(manager.connect("203.0.113.5", 14192), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.drop_connection("server full");
    });

    assert!(matches!(result, Err(SessionError::ConnectError(_))));
    assert_eq!(manager.state(), SessionState::Failed);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Disconnected)
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Failed)
    );
}

#[tokio::test]
async fn test_can_connect_again_after_failure() {
    let (manager, mut events, handle) = build(
        SessionConfig {
            connect_timeout: Duration::from_millis(150),
            ..fast_config("GOG")
        },
        false,
    );
    manager.connect("203.0.113.5", 14192).await.unwrap_err();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Failed)
    );

    let (result, ()) = tokio::join!(manager.connect("203.0.113.5", 14192), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.accept();
    });

    result.unwrap();
    assert_eq!(manager.state(), SessionState::Connected);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Connected)
    );
}

// =========================================================================
// Disconnect
// =========================================================================

#[tokio::test]
async fn test_disconnect_twice_emits_once() {
    let (manager, mut events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();
    next_event(&mut events).await;

    manager.disconnect();
    manager.disconnect();

    assert_eq!(manager.state(), SessionState::Disconnected);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Disconnected)
    );
    settle().await;
    assert_no_more_events(&mut events);
    assert_eq!(handle.disconnects(), vec!["Client disconnecting"]);
}

#[tokio::test]
async fn test_disconnect_before_connect_is_noop() {
    let (manager, mut events, handle) = accepting();

    manager.disconnect();
    manager.disconnect();

    assert_eq!(manager.state(), SessionState::Idle);
    settle().await;
    assert_no_more_events(&mut events);
    assert!(handle.disconnects().is_empty());
}

#[tokio::test]
async fn test_remote_disconnect_is_reported() {
    let (manager, mut events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();
    next_event(&mut events).await;

    handle.drop_connection("kicked");

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Disconnected)
    );
    assert_eq!(manager.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_reconnect_tears_down_previous_session_first() {
    let (manager, mut events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();

    manager.connect("198.51.100.7", 14192).await.unwrap();

    let statuses = [
        next_event(&mut events).await,
        next_event(&mut events).await,
        next_event(&mut events).await,
    ];
    assert_eq!(
        statuses,
        [
            SessionEvent::StatusChanged(ConnectionStatus::Connected),
            SessionEvent::StatusChanged(ConnectionStatus::Disconnected),
            SessionEvent::StatusChanged(ConnectionStatus::Connected),
        ]
    );
    assert_eq!(handle.disconnects(), vec!["Client disconnecting"]);
    assert_eq!(handle.connects().len(), 2);
    assert_eq!(manager.state(), SessionState::Connected);

    settle().await;
    assert_no_more_events(&mut events);
}

// =========================================================================
// Sending
// =========================================================================

#[tokio::test]
async fn test_send_while_not_connected_never_touches_transport() {
    let (manager, _events, handle) = accepting();

    manager.send_message(b"hello", DeliveryTier::OrderedReliable).unwrap();
    manager.send_message(b"hello", 2u8).unwrap();

    assert_eq!(handle.send_count(), 0);
    assert_eq!(handle.created_count(), 0);
}

#[tokio::test]
async fn test_send_after_disconnect_is_dropped() {
    let (manager, _events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();
    manager.disconnect();

    manager.send_message(b"late", DeliveryTier::OrderedReliable).unwrap();

    assert_eq!(handle.send_count(), 1, "only the initialization message");
}

#[tokio::test]
async fn test_send_maps_tiers_to_modes() {
    let (manager, _events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();

    manager.send_message(b"a", DeliveryTier::OrderedReliable).unwrap();
    manager.send_message(b"b", DeliveryTier::UnorderedReliable).unwrap();
    manager.send_message(b"c", DeliveryTier::SequencedUnreliable).unwrap();
    manager.send_message(b"d", 200u8).unwrap();

    let modes: Vec<SendMode> = handle.sent()[1..].iter().map(|m| m.mode).collect();
    assert_eq!(
        modes,
        vec![
            SendMode::ReliableOrdered,
            SendMode::ReliableUnordered,
            SendMode::UnreliableSequenced,
            SendMode::ReliableOrdered,
        ]
    );
}

// =========================================================================
// Receive loop
// =========================================================================

#[tokio::test]
async fn test_data_is_forwarded_in_order_and_housekeeping_is_not() {
    let (manager, mut events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();
    next_event(&mut events).await;

    let mut oob = OutgoingMessage::new();
    oob.write_string(PROTOCOL_NAME);
    oob.write_string("PING");

    handle.push_data(b"first");
    handle.push_diagnostic(IncomingKind::Warning, "resending");
    handle.push(IncomingMessage::new(IncomingKind::DiscoveryResponse, vec![1, 2]));
    handle.push_unconnected(oob.into_bytes());
    handle.push_diagnostic(IncomingKind::Debug, "rtt 12ms");
    handle.push_data(b"second");

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::DataReceived(b"first".to_vec())
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::DataReceived(b"second".to_vec())
    );
    settle().await;
    assert_no_more_events(&mut events);
}

#[tokio::test]
async fn test_malformed_messages_do_not_stop_the_loop() {
    let (manager, mut events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();
    next_event(&mut events).await;

    // Unknown status byte, then a diagnostic whose string is truncated.
    handle.push(IncomingMessage::new(IncomingKind::StatusChanged, vec![99]));
    handle.push(IncomingMessage::new(IncomingKind::Warning, vec![50, b'x']));
    handle.push_data(b"still alive");

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::DataReceived(b"still alive".to_vec())
    );
    assert_eq!(manager.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_every_message_is_recycled() {
    let (manager, mut events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();
    next_event(&mut events).await;

    handle.push_data(b"ok");
    handle.push(IncomingMessage::new(IncomingKind::StatusChanged, vec![]));
    handle.push(IncomingMessage::new(IncomingKind::Error, vec![]));
    next_event(&mut events).await;
    settle().await;

    // Three connect statuses plus the three pushed above.
    assert_eq!(handle.pending_inbound(), 0);
    assert_eq!(handle.recycled_count(), 6);
}

#[tokio::test]
async fn test_connected_status_outside_connect_is_ignored() {
    let (manager, mut events, handle) = build(fast_config("GOG"), false);

    handle.push_status(TransportStatus::Connected, "stray");
    settle().await;

    assert_eq!(manager.state(), SessionState::Idle);
    assert_eq!(handle.send_count(), 0);
    assert_no_more_events(&mut events);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_disconnects_and_closes_transport() {
    let (manager, mut events, handle) = accepting();
    manager.connect("203.0.113.5", 14192).await.unwrap();
    next_event(&mut events).await;

    manager.shutdown().await;
    manager.shutdown().await;

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StatusChanged(ConnectionStatus::Disconnected)
    );
    assert_no_more_events(&mut events);
    assert!(handle.is_shut_down());
    assert_eq!(manager.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_shutdown_before_any_connect() {
    let (manager, mut events, handle) = accepting();

    manager.shutdown().await;

    assert!(handle.is_shut_down());
    assert!(handle.disconnects().is_empty());
    assert_no_more_events(&mut events);
}

#[tokio::test]
async fn test_connect_after_shutdown_fails() {
    let (manager, _events, _handle) = accepting();
    manager.shutdown().await;

    let err = manager.connect("203.0.113.5", 14192).await.unwrap_err();

    assert!(matches!(err, SessionError::ConnectError(_)));
}
