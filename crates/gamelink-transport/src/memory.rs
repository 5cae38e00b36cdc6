//! In-process transport for tests and demos.
//!
//! [`MemoryTransport`] behaves like a peer whose network is a queue the
//! test controls. The paired [`MemoryTransportHandle`] injects inbound
//! messages (status changes, data, diagnostics) and records everything
//! the client did: connects, sends, disconnects, recycles.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    IncomingKind, IncomingMessage, OutgoingMessage, SendMode, Transport,
    TransportError, TransportStatus,
};

/// A recorded call to [`Transport::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRecord {
    pub endpoint: SocketAddr,
    pub hail: Vec<u8>,
}

/// A recorded call to [`Transport::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub data: Vec<u8>,
    pub mode: SendMode,
}

#[derive(Debug, Default)]
struct Inner {
    started: bool,
    shut_down: bool,
    auto_accept: bool,
    remote: Option<SocketAddr>,
    connected: bool,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
    inbound: VecDeque<IncomingMessage>,
    connects: Vec<ConnectRecord>,
    sent: Vec<SentMessage>,
    disconnects: Vec<String>,
    created: usize,
    recycled: usize,
}

impl Inner {
    fn push_status(&mut self, status: TransportStatus, reason: &str) {
        self.inbound.push_back(IncomingMessage::status(status, reason));
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// A [`Transport`] backed by in-memory queues.
#[derive(Debug)]
pub struct MemoryTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTransport {
    /// Creates a transport that leaves every connect attempt pending
    /// until the handle calls [`MemoryTransportHandle::accept`].
    pub fn pending() -> (Self, MemoryTransportHandle) {
        Self::build(false)
    }

    /// Creates a transport whose remote end accepts every connect
    /// attempt immediately, reporting the usual status progression.
    pub fn auto_accept() -> (Self, MemoryTransportHandle) {
        Self::build(true)
    }

    fn build(auto_accept: bool) -> (Self, MemoryTransportHandle) {
        let inner = Arc::new(Mutex::new(Inner {
            auto_accept,
            ..Inner::default()
        }));
        let handle = MemoryTransportHandle {
            inner: Arc::clone(&inner),
        };
        (Self { inner }, handle)
    }
}

impl Transport for MemoryTransport {
    type Error = TransportError;

    fn start(&self) -> Result<(), Self::Error> {
        let mut inner = lock(&self.inner);
        if inner.shut_down {
            return Err(TransportError::Shutdown);
        }
        inner.started = true;
        Ok(())
    }

    fn connect(
        &self,
        endpoint: SocketAddr,
        hail: OutgoingMessage,
    ) -> Result<(), Self::Error> {
        let mut inner = lock(&self.inner);
        if inner.shut_down {
            return Err(TransportError::Shutdown);
        }
        if !inner.started {
            return Err(TransportError::NotStarted);
        }
        if let Some(reason) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectFailed(reason));
        }

        inner.connects.push(ConnectRecord {
            endpoint,
            hail: hail.into_bytes(),
        });
        inner.remote = Some(endpoint);
        inner.connected = false;
        inner.push_status(TransportStatus::InitiatedConnect, "");
        tracing::debug!(%endpoint, "memory transport connect initiated");

        if inner.auto_accept {
            inner.push_status(TransportStatus::RespondedConnect, "");
            inner.push_status(TransportStatus::Connected, "accepted");
            inner.connected = true;
        }
        Ok(())
    }

    fn disconnect(&self, reason: &str) {
        let mut inner = lock(&self.inner);
        inner.disconnects.push(reason.to_string());
        if inner.remote.take().is_some() {
            inner.connected = false;
            inner.push_status(TransportStatus::Disconnected, reason);
        }
    }

    fn create_message(&self) -> OutgoingMessage {
        lock(&self.inner).created += 1;
        OutgoingMessage::new()
    }

    fn send(
        &self,
        message: OutgoingMessage,
        mode: SendMode,
    ) -> Result<(), Self::Error> {
        let mut inner = lock(&self.inner);
        if inner.shut_down {
            return Err(TransportError::Shutdown);
        }
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(reason) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(reason));
        }
        inner.sent.push(SentMessage {
            data: message.into_bytes(),
            mode,
        });
        Ok(())
    }

    fn read_message(&self) -> Option<IncomingMessage> {
        let mut inner = lock(&self.inner);
        if !inner.started || inner.shut_down {
            return None;
        }
        inner.inbound.pop_front()
    }

    fn recycle(&self, _message: IncomingMessage) {
        lock(&self.inner).recycled += 1;
    }

    fn shutdown(&self, reason: &str) {
        let mut inner = lock(&self.inner);
        tracing::debug!(reason, "memory transport shut down");
        inner.shut_down = true;
        inner.remote = None;
        inner.connected = false;
        inner.inbound.clear();
    }
}

// ---------------------------------------------------------------------------
// MemoryTransportHandle
// ---------------------------------------------------------------------------

/// The test-facing side of a [`MemoryTransport`].
///
/// Cloning the handle is cheap; all clones observe the same transport.
#[derive(Debug, Clone)]
pub struct MemoryTransportHandle {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTransportHandle {
    /// Queues an arbitrary inbound message.
    pub fn push(&self, message: IncomingMessage) {
        lock(&self.inner).inbound.push_back(message);
    }

    /// Queues a status-changed message without touching connection state.
    pub fn push_status(&self, status: TransportStatus, reason: &str) {
        lock(&self.inner).push_status(status, reason);
    }

    /// Queues application data from the remote peer.
    pub fn push_data(&self, data: &[u8]) {
        self.push(IncomingMessage::new(IncomingKind::Data, data.to_vec()));
    }

    /// Queues out-of-band data.
    pub fn push_unconnected(&self, data: Vec<u8>) {
        self.push(IncomingMessage::new(IncomingKind::UnconnectedData, data));
    }

    /// Queues a diagnostic message.
    pub fn push_diagnostic(&self, kind: IncomingKind, text: &str) {
        self.push(IncomingMessage::diagnostic(kind, text));
    }

    /// Completes a pending connect attempt.
    pub fn accept(&self) {
        let mut inner = lock(&self.inner);
        inner.connected = true;
        inner.push_status(TransportStatus::Connected, "accepted");
    }

    /// Simulates the remote peer dropping the connection.
    pub fn drop_connection(&self, reason: &str) {
        let mut inner = lock(&self.inner);
        inner.remote = None;
        inner.connected = false;
        inner.push_status(TransportStatus::Disconnected, reason);
    }

    /// Makes the next [`Transport::connect`] call fail.
    pub fn fail_next_connect(&self, reason: &str) {
        lock(&self.inner).fail_next_connect = Some(reason.to_string());
    }

    /// Makes the next [`Transport::send`] on a connected transport fail.
    pub fn fail_next_send(&self, reason: &str) {
        lock(&self.inner).fail_next_send = Some(reason.to_string());
    }

    pub fn connects(&self) -> Vec<ConnectRecord> {
        lock(&self.inner).connects.clone()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.inner).sent.clone()
    }

    pub fn send_count(&self) -> usize {
        lock(&self.inner).sent.len()
    }

    pub fn disconnects(&self) -> Vec<String> {
        lock(&self.inner).disconnects.clone()
    }

    /// Number of messages created through [`Transport::create_message`].
    pub fn created_count(&self) -> usize {
        lock(&self.inner).created
    }

    pub fn recycled_count(&self) -> usize {
        lock(&self.inner).recycled
    }

    /// Inbound messages not yet read by the client.
    pub fn pending_inbound(&self) -> usize {
        lock(&self.inner).inbound.len()
    }

    pub fn is_started(&self) -> bool {
        lock(&self.inner).started
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.inner).shut_down
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.inner).connected
    }
}
