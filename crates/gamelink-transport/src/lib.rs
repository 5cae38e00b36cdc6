//! Transport abstraction layer for Gamelink.
//!
//! Gamelink does not implement a UDP reliability layer itself. Instead it
//! talks to one through the [`Transport`] trait, which mirrors the shape of
//! a message-oriented peer library:
//!
//! - **Lifecycle**: `start`, `connect`, `disconnect`, `shutdown`
//! - **Sending**: `create_message` + `send` with a [`SendMode`]
//! - **Receiving**: a non-blocking `read_message` poll. Every message
//!   handed out must be given back with `recycle` once processed.
//!
//! Inbound traffic is classified by [`IncomingKind`]. Status changes carry
//! a [`TransportStatus`] byte followed by a reason string.
//!
//! [`MemoryTransport`] is an in-process implementation for tests and demos.

mod error;
mod memory;
mod message;

pub use error::TransportError;
pub use memory::{ConnectRecord, MemoryTransport, MemoryTransportHandle, SentMessage};
pub use message::{IncomingKind, IncomingMessage, MessageReader, OutgoingMessage};

use std::fmt;
use std::net::SocketAddr;

// ---------------------------------------------------------------------------
// SendMode: delivery semantics offered by the transport
// ---------------------------------------------------------------------------

/// How the transport delivers an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendMode {
    /// Retransmitted until acknowledged, delivered in send order.
    ReliableOrdered,
    /// Retransmitted until acknowledged, delivered as it arrives.
    ReliableUnordered,
    /// Never retransmitted. Stale messages (older than the newest
    /// delivered one) are dropped on arrival.
    UnreliableSequenced,
}

impl SendMode {
    /// Returns `true` if the transport retransmits lost messages.
    pub fn is_reliable(self) -> bool {
        matches!(self, Self::ReliableOrdered | Self::ReliableUnordered)
    }

    /// Returns `true` if the transport preserves send order.
    pub fn is_ordered(self) -> bool {
        matches!(self, Self::ReliableOrdered)
    }
}

// ---------------------------------------------------------------------------
// TransportStatus: connection status reported by status-changed items
// ---------------------------------------------------------------------------

/// Connection status as reported by the transport.
///
/// The numeric values are the status byte that leads a
/// [`IncomingKind::StatusChanged`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransportStatus {
    None = 0,
    InitiatedConnect = 1,
    ReceivedInitiation = 2,
    RespondedAwaitingApproval = 3,
    RespondedConnect = 4,
    Connected = 5,
    Disconnecting = 6,
    Disconnected = 7,
}

impl TransportStatus {
    /// Decodes a status byte.
    pub fn from_byte(byte: u8) -> Result<Self, TransportError> {
        Ok(match byte {
            0 => Self::None,
            1 => Self::InitiatedConnect,
            2 => Self::ReceivedInitiation,
            3 => Self::RespondedAwaitingApproval,
            4 => Self::RespondedConnect,
            5 => Self::Connected,
            6 => Self::Disconnecting,
            7 => Self::Disconnected,
            other => return Err(TransportError::UnknownStatus(other)),
        })
    }

    /// The wire byte for this status.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// A client-side peer on an unreliable, message-oriented network.
///
/// Methods take `&self`: the handle is shared between the caller and a
/// background receive task, so implementations use interior mutability.
/// None of the methods block; `read_message` returns `None` when the
/// inbound queue is empty.
pub trait Transport: Send + Sync + 'static {
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Starts the peer's networking. Must be called before anything else.
    fn start(&self) -> Result<(), Self::Error>;

    /// Begins connecting to `endpoint`, carrying `hail` as
    /// connection-establishment data.
    ///
    /// Returns as soon as the attempt is initiated. Progress is reported
    /// through [`IncomingKind::StatusChanged`] messages.
    fn connect(
        &self,
        endpoint: SocketAddr,
        hail: OutgoingMessage,
    ) -> Result<(), Self::Error>;

    /// Requests a graceful disconnect from the remote peer.
    fn disconnect(&self, reason: &str);

    /// Creates an empty outgoing message.
    fn create_message(&self) -> OutgoingMessage {
        OutgoingMessage::new()
    }

    /// Sends a message to the connected remote peer.
    fn send(
        &self,
        message: OutgoingMessage,
        mode: SendMode,
    ) -> Result<(), Self::Error>;

    /// Pops the next inbound message, if any.
    fn read_message(&self) -> Option<IncomingMessage>;

    /// Returns a processed message to the transport.
    fn recycle(&self, message: IncomingMessage);

    /// Stops the peer. Pending inbound messages are discarded.
    fn shutdown(&self, reason: &str);
}
