//! The session manager: one outbound connection and its receive loop.
//!
//! # Two execution contexts
//!
//! - **The caller** runs `connect`, `disconnect`, `send_message` and
//!   `shutdown`. `connect` suspends while it polls for the handshake to
//!   complete; nothing else blocks.
//! - **The receive loop** is a Tokio task spawned at construction. It
//!   drains the transport's inbound queue, sleeps for `idle_backoff`, and
//!   repeats until shutdown.
//!
//! Both share the transport handle and the session state. The state lives
//! in an atomic cell and every conditional transition is a
//! compare-and-swap, so each transition (and its event) happens exactly
//! once no matter which side gets there first.
//!
//! Events go out over an unbounded channel: a slow consumer never stalls
//! the receive loop.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gamelink_protocol::{DeliveryTier, HandshakeKind, HandshakePayload};
use gamelink_transport::{IncomingKind, IncomingMessage, Transport, TransportStatus};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::identity::{Identity, IdentityProvider, IdentitySource, LocalIdentity, Platform};
use crate::session::StateCell;
use crate::{BoxError, ConnectionStatus, SessionConfig, SessionError, SessionEvent, SessionState};

/// Reason given to the transport on a client-initiated disconnect.
const DISCONNECT_REASON: &str = "Client disconnecting";

/// Reason given to the transport when the manager shuts down.
const SHUTDOWN_REASON: &str = "Client shutting down";

/// Reason given to the transport when a connect attempt is abandoned.
const TIMEOUT_REASON: &str = "Connection attempt timed out";

/// Reason given to the transport when the initialization message can't
/// be sent.
const INIT_FAILED_REASON: &str = "Initialization handshake failed";

/// Receiving end of a session manager's events.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds either handshake message from a resolved identity.
///
/// The hail and the post-ack initialization must never drift apart, so
/// both go through here.
fn build_handshake(
    protocol: &str,
    identity: &Identity,
    kind: HandshakeKind,
) -> HandshakePayload {
    HandshakePayload {
        protocol: protocol.to_string(),
        kind,
        platform: identity.platform.tag().to_string(),
        username: identity.username.clone(),
        platform_id: identity.platform_id.clone(),
    }
}

// ---------------------------------------------------------------------------
// Shared: state visible to both the caller and the receive loop
// ---------------------------------------------------------------------------

struct Shared<T: Transport> {
    /// The transport handle. Only the receive loop reads from it; either
    /// side may send, connect or disconnect.
    transport: T,

    /// Current [`SessionState`]. Conditional moves are compare-and-swap,
    /// so when the caller and the loop race for the same transition only
    /// one of them wins and raises the event.
    state: StateCell,

    /// Sender half of the consumer's event channel. Unbounded, so
    /// emitting never waits on the consumer.
    events: mpsc::UnboundedSender<SessionEvent>,

    /// First field of every handshake, and the tag unconnected messages
    /// must carry to be looked at.
    protocol_name: String,

    /// Identity of the current connect attempt, reused for the post-ack
    /// initialization message.
    ///
    /// Written by `connect` before the transport is asked to connect, so
    /// the loop always finds it when `Connected` arrives.
    identity: Mutex<Option<Identity>>,

    /// Why the receive loop gave up on the current connect attempt.
    ///
    /// Set before the state leaves `Connecting`; `connect` takes it when
    /// it sees the state change and reports it as the `ConnectError`
    /// cause. Cleared at the start of every attempt.
    abort_cause: Mutex<Option<BoxError>>,

    /// Disconnects we asked the transport for whose `Disconnected`
    /// report hasn't come back yet.
    ///
    /// A reconnect waits for this to drain so that the old connection's
    /// report can't tear down the new one.
    pending_disconnects: AtomicU64,
}

impl<T: Transport> Shared<T> {
    fn emit(&self, event: SessionEvent) {
        // A dropped receiver just means nobody is listening.
        let _ = self.events.send(event);
    }

    /// Handles one inbound message.
    fn handle_incoming(&self, msg: &IncomingMessage) -> Result<(), SessionError> {
        match msg.kind() {
            IncomingKind::StatusChanged => self.handle_status(msg),
            IncomingKind::Data => {
                self.emit(SessionEvent::DataReceived(msg.data().to_vec()));
                Ok(())
            }
            IncomingKind::UnconnectedData => self.handle_unconnected(msg),
            IncomingKind::DiscoveryRequest | IncomingKind::DiscoveryResponse => {
                tracing::debug!(kind = ?msg.kind(), sender = ?msg.sender(), "ignoring discovery traffic");
                Ok(())
            }
            kind @ (IncomingKind::VerboseDebug | IncomingKind::Debug) => {
                let text = msg.reader().read_string().map_err(fault)?;
                tracing::debug!(?kind, %text, "transport diagnostic");
                Ok(())
            }
            IncomingKind::Warning => {
                let text = msg.reader().read_string().map_err(fault)?;
                tracing::warn!(%text, "transport warning");
                Ok(())
            }
            IncomingKind::Error => {
                let text = msg.reader().read_string().map_err(fault)?;
                tracing::error!(%text, "transport error");
                Ok(())
            }
        }
    }

    fn handle_status(&self, msg: &IncomingMessage) -> Result<(), SessionError> {
        let mut reader = msg.reader();
        let status = TransportStatus::from_byte(reader.read_u8().map_err(fault)?)
            .map_err(fault)?;
        let reason = reader.read_string().map_err(fault)?;
        tracing::debug!(%status, %reason, "transport status changed");

        match status {
            TransportStatus::Connected => self.on_transport_connected(),
            TransportStatus::Disconnected | TransportStatus::Disconnecting => {
                if status == TransportStatus::Disconnected {
                    let _ = self.pending_disconnects.fetch_update(
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        |pending| pending.checked_sub(1),
                    );
                }
                // Client-initiated teardown owns the Disconnecting state
                // and raises its own event.
                if self
                    .state
                    .transition(
                        &[SessionState::Connecting, SessionState::Connected],
                        SessionState::Disconnected,
                    )
                    .is_some()
                {
                    tracing::info!(%reason, "disconnected from server");
                    self.emit(SessionEvent::StatusChanged(ConnectionStatus::Disconnected));
                }
                Ok(())
            }
            TransportStatus::RespondedAwaitingApproval => {
                tracing::debug!("waiting for server approval");
                Ok(())
            }
            TransportStatus::RespondedConnect => {
                tracing::debug!("server responded to connection request");
                Ok(())
            }
            TransportStatus::InitiatedConnect => {
                tracing::debug!("connection initiated");
                Ok(())
            }
            TransportStatus::ReceivedInitiation => {
                tracing::debug!("received connection initiation");
                Ok(())
            }
            TransportStatus::None => Ok(()),
        }
    }

    /// The transport accepted us: confirm identity, then go `Connected`.
    ///
    /// The initialization message is sent before the state flips so no
    /// application data can get ahead of it.
    fn on_transport_connected(&self) -> Result<(), SessionError> {
        if self.state.load() != SessionState::Connecting {
            tracing::debug!(state = %self.state.load(), "ignoring Connected outside a connect attempt");
            return Ok(());
        }

        let identity = lock(&self.identity).clone().ok_or_else(|| {
            SessionError::TransportFault("connected without a resolved identity".into())
        })?;
        let init = build_handshake(&self.protocol_name, &identity, HandshakeKind::Initialize);
        let mut msg = self.transport.create_message();
        init.write_to(&mut msg);
        if let Err(e) = self
            .transport
            .send(msg, DeliveryTier::OrderedReliable.send_mode())
        {
            // Fail the attempt here; `connect` picks up the cause.
            tracing::warn!(error = %e, "failed to send initialization message");
            let cause: BoxError = Box::new(e);
            *lock(&self.abort_cause) = Some(cause);
            if self
                .state
                .transition(&[SessionState::Connecting], SessionState::Failed)
                .is_some()
            {
                self.request_disconnect(INIT_FAILED_REASON);
            }
            return Ok(());
        }

        if self
            .state
            .transition(&[SessionState::Connecting], SessionState::Connected)
            .is_some()
        {
            tracing::info!(username = %identity.username, "connected to server");
            self.emit(SessionEvent::StatusChanged(ConnectionStatus::Connected));
        }
        Ok(())
    }

    fn handle_unconnected(&self, msg: &IncomingMessage) -> Result<(), SessionError> {
        let mut reader = msg.reader();
        let header = reader.read_string().map_err(fault)?;
        if header == self.protocol_name {
            let kind = reader.read_string().map_err(fault)?;
            tracing::debug!(%kind, sender = ?msg.sender(), "received unconnected message");
        } else {
            tracing::trace!(sender = ?msg.sender(), "ignoring unconnected message for another protocol");
        }
        Ok(())
    }

    /// Tears down the current connection if its state is in `from`.
    ///
    /// Returns `true` if a teardown happened.
    fn teardown(&self, from: &[SessionState]) -> bool {
        let Some(previous) = self.state.transition(from, SessionState::Disconnecting) else {
            return false;
        };
        self.request_disconnect(DISCONNECT_REASON);
        self.state.replace(SessionState::Disconnected);
        tracing::info!(%previous, "session disconnected");
        self.emit(SessionEvent::StatusChanged(ConnectionStatus::Disconnected));
        true
    }

    fn request_disconnect(&self, reason: &str) {
        self.pending_disconnects.fetch_add(1, Ordering::AcqRel);
        self.transport.disconnect(reason);
    }
}

fn fault<E>(e: E) -> SessionError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SessionError::TransportFault(Box::new(e))
}

/// Gives a message back to the transport when dropped, whatever happened
/// while it was being handled.
struct Recycle<'a, T: Transport> {
    transport: &'a T,
    message: Option<IncomingMessage>,
}

impl<T: Transport> Drop for Recycle<'_, T> {
    fn drop(&mut self) {
        if let Some(message) = self.message.take() {
            self.transport.recycle(message);
        }
    }
}

async fn receive_loop<T: Transport>(
    shared: Arc<Shared<T>>,
    mut shutdown: watch::Receiver<bool>,
    idle_backoff: std::time::Duration,
) {
    tracing::debug!("receive loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        while let Some(message) = shared.transport.read_message() {
            let guard = Recycle {
                transport: &shared.transport,
                message: Some(message),
            };
            if let Some(msg) = guard.message.as_ref() {
                if let Err(e) = shared.handle_incoming(msg) {
                    tracing::warn!(error = %e, kind = ?msg.kind(), "failed to process inbound message");
                }
            }
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(idle_backoff) => {}
        }
    }
    tracing::debug!("receive loop stopped");
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Owns one outbound connection, its handshake, and its receive loop.
///
/// Must be created inside a Tokio runtime: construction spawns the
/// receive loop. Call [`shutdown`](Self::shutdown) for an orderly stop;
/// dropping the manager only signals the loop.
///
/// A connect runs like this:
///
/// ```text
/// caller                         transport                receive loop
///   │ connect(addr, port)            │                         │
///   │── hail (CONNECT_REQUEST) ─────►│                         │
///   │   state = Connecting           │── Connected status ────►│
///   │                                │◄── initialization ──────│ (ordered-reliable)
///   │   polls every poll_interval    │                         │ state = Connected
///   │◄─────────────────── Ok once state is Connected ──────────│ emit StatusChanged(Connected)
/// ```
pub struct SessionManager<T: Transport> {
    /// State shared with the receive loop.
    shared: Arc<Shared<T>>,

    config: SessionConfig,

    /// Where identities come from, per platform. Read on every connect,
    /// so a builder call before the first connect takes effect.
    identities: IdentitySource,

    /// Flipped to `true` once to stop the receive loop.
    shutdown_tx: watch::Sender<bool>,

    /// The receive loop's task. Taken by `shutdown` (to await it) or by
    /// `Drop` (to abort it), whichever runs first.
    receive_task: Mutex<Option<JoinHandle<()>>>,

    /// Set by the first `shutdown` call; later calls and `Drop` see it
    /// and do nothing.
    closed: AtomicBool,
}

impl<T: Transport> SessionManager<T> {
    /// Starts the transport and the receive loop.
    ///
    /// Returns the manager together with the receiver for its events.
    pub fn new(
        transport: T,
        config: SessionConfig,
    ) -> Result<(Self, SessionEvents), SessionError> {
        transport
            .start()
            .map_err(|e| SessionError::Transport(Box::new(e)))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            transport,
            state: StateCell::new(SessionState::Idle),
            events: events_tx,
            protocol_name: config.protocol_name.clone(),
            identity: Mutex::new(None),
            abort_cause: Mutex::new(None),
            pending_disconnects: AtomicU64::new(0),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(receive_loop(
            Arc::clone(&shared),
            shutdown_rx,
            config.idle_backoff,
        ));

        let manager = Self {
            shared,
            config,
            identities: IdentitySource::new(),
            shutdown_tx,
            receive_task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        };
        Ok((manager, events_rx))
    }

    /// Sets the networked identity service used for [`Platform::Steam`].
    pub fn with_identity_service(mut self, service: Arc<dyn IdentityProvider>) -> Self {
        self.identities.service = Some(service);
        self
    }

    /// Overrides the local anonymous identity used for [`Platform::Gog`].
    pub fn with_local_identity(mut self, local: LocalIdentity) -> Self {
        self.identities.local = local;
        self
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.state.load()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connects to `address:port` and waits for the handshake.
    ///
    /// Any session already connecting or connected is torn down first.
    /// On failure the state is `Failed` and `StatusChanged(Failed)` has
    /// been raised before the error is returned.
    ///
    /// # Errors
    /// - [`SessionError::UnsupportedPlatform`]: `config.platform` is unknown
    /// - [`SessionError::IdentityUnavailable`]: no identity to connect as
    /// - [`SessionError::ConnectTimeout`]: no `Connected` within `connect_timeout`
    /// - [`SessionError::ConnectError`]: anything else
    pub async fn connect(&self, address: &str, port: u16) -> Result<(), SessionError> {
        if self.state().is_active() {
            tracing::info!(state = %self.state(), "tearing down previous session before connecting");
            self.shared
                .teardown(&[SessionState::Connecting, SessionState::Connected]);
        }
        self.settle_disconnects().await;

        match self.try_connect(address, port).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn try_connect(&self, address: &str, port: u16) -> Result<(), SessionError> {
        let platform: Platform = self.config.platform.parse()?;
        let identity = self.identities.resolve(platform)?;
        let ip: IpAddr = address
            .parse()
            .map_err(|e| SessionError::ConnectError(Box::new(e)))?;
        let endpoint = SocketAddr::new(ip, port);

        tracing::info!(%endpoint, %platform, username = %identity.username, "connecting");
        tracing::debug!(platform_id = %identity.platform_id, "connecting with platform id");

        let hail = build_handshake(&self.shared.protocol_name, &identity, HandshakeKind::ConnectRequest);
        let mut msg = self.shared.transport.create_message();
        hail.write_to(&mut msg);

        *lock(&self.shared.identity) = Some(identity);
        lock(&self.shared.abort_cause).take();
        self.shared.state.replace(SessionState::Connecting);
        self.shared
            .transport
            .connect(endpoint, msg)
            .map_err(|e| SessionError::ConnectError(Box::new(e)))?;

        let started = Instant::now();
        loop {
            match self.state() {
                SessionState::Connected => {
                    tracing::info!(%endpoint, elapsed = ?started.elapsed(), "session established");
                    return Ok(());
                }
                SessionState::Connecting => {}
                other => {
                    let cause = lock(&self.shared.abort_cause).take().unwrap_or_else(|| {
                        format!("connection ended while connecting (state {other})").into()
                    });
                    return Err(SessionError::ConnectError(cause));
                }
            }
            if started.elapsed() >= self.config.connect_timeout {
                return Err(SessionError::ConnectTimeout(self.config.connect_timeout));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Marks the session `Failed` after a connect error.
    ///
    /// Raises `StatusChanged(Failed)` once for every failed `connect`
    /// call, including when an earlier attempt already left the session
    /// `Failed`. The receive loop never raises `Failed` itself.
    fn fail(&self, error: &SessionError) {
        let previous = self.shared.state.replace(SessionState::Failed);
        tracing::warn!(%error, %previous, "connect failed");
        self.shared
            .emit(SessionEvent::StatusChanged(ConnectionStatus::Failed));
        if matches!(error, SessionError::ConnectTimeout(_)) {
            // Stop the transport retrying the abandoned attempt. Its
            // Disconnected report lands while we're Failed and is ignored.
            self.shared.request_disconnect(TIMEOUT_REASON);
        }
    }

    /// Waits for the transport to report every disconnect we requested,
    /// so a late report can't land on the next attempt.
    async fn settle_disconnects(&self) {
        let started = Instant::now();
        while self.shared.pending_disconnects.load(Ordering::Acquire) > 0 {
            if started.elapsed() >= self.config.teardown_timeout {
                tracing::debug!("transport never confirmed the disconnect; continuing");
                self.shared.pending_disconnects.store(0, Ordering::Release);
                return;
            }
            tokio::time::sleep(self.config.idle_backoff).await;
        }
    }

    /// Disconnects gracefully. A no-op unless `Connected`, so it's safe to
    /// call repeatedly or before any connect.
    pub fn disconnect(&self) {
        if !self.shared.teardown(&[SessionState::Connected]) {
            tracing::trace!(state = %self.state(), "disconnect ignored: not connected");
        }
    }

    /// Sends `payload` with the given delivery tier.
    ///
    /// Silently dropped when not connected. Raw tier bytes are accepted
    /// too; out-of-range values are sent reliable-ordered.
    ///
    /// # Errors
    /// [`SessionError::Transport`] if the transport rejects the send.
    pub fn send_message(
        &self,
        payload: &[u8],
        tier: impl Into<DeliveryTier>,
    ) -> Result<(), SessionError> {
        if !self.is_connected() {
            tracing::trace!(len = payload.len(), "dropping message: not connected");
            return Ok(());
        }

        let tier = tier.into();
        let mut msg = self.shared.transport.create_message();
        msg.write_bytes(payload);
        self.shared
            .transport
            .send(msg, tier.send_mode())
            .map_err(|e| SessionError::Transport(Box::new(e)))
    }

    /// Stops the receive loop, disconnects, and shuts the transport down.
    ///
    /// The loop is awaited before the transport is closed. Repeated calls
    /// are no-ops.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shutdown_tx.send_replace(true);
        let task = lock(&self.receive_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "receive loop ended abnormally");
            }
        }

        self.disconnect();
        self.shared.transport.shutdown(SHUTDOWN_REASON);
        tracing::info!("session manager shut down");
    }
}

impl<T: Transport> Drop for SessionManager<T> {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.shutdown_tx.send_replace(true);
        if let Some(task) = lock(&self.receive_task).take() {
            task.abort();
        }
    }
}
