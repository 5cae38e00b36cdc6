//! Message buffers exchanged with the transport.
//!
//! Strings are written as a byte count followed by UTF-8 bytes. The count
//! is an unsigned variable-length integer: 7 bits per byte, low bits first,
//! high bit set on every byte except the last.

use std::net::SocketAddr;

use crate::TransportError;

/// The longest encoding of a `u32` length prefix.
const MAX_VARINT_BYTES: usize = 5;

// ---------------------------------------------------------------------------
// OutgoingMessage
// ---------------------------------------------------------------------------

/// A message being built for sending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    data: Vec<u8>,
}

impl OutgoingMessage {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Appends raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) {
        // Strings longer than u32::MAX can't be framed; no message is
        // anywhere near that size.
        self.write_varint(value.len() as u32);
        self.data.extend_from_slice(value.as_bytes());
    }

    fn write_varint(&mut self, mut value: u32) {
        while value >= 0x80 {
            self.data.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.data.push(value as u8);
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the message, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ---------------------------------------------------------------------------
// IncomingMessage
// ---------------------------------------------------------------------------

/// What an inbound message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncomingKind {
    /// Connection status changed: status byte, then a reason string.
    StatusChanged,
    /// Application data from the connected peer.
    Data,
    /// Out-of-band data from a peer we're not connected to.
    UnconnectedData,
    /// Someone is probing for servers.
    DiscoveryRequest,
    /// A server answered a discovery probe.
    DiscoveryResponse,
    /// Transport diagnostics. Each carries a single string.
    VerboseDebug,
    Debug,
    Warning,
    Error,
}

impl IncomingKind {
    /// Returns `true` for the transport's diagnostic channels.
    pub fn is_diagnostic(self) -> bool {
        matches!(
            self,
            Self::VerboseDebug | Self::Debug | Self::Warning | Self::Error
        )
    }
}

/// A message handed out by [`Transport::read_message`](crate::Transport::read_message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    kind: IncomingKind,
    data: Vec<u8>,
    sender: Option<SocketAddr>,
}

impl IncomingMessage {
    pub fn new(kind: IncomingKind, data: Vec<u8>) -> Self {
        Self {
            kind,
            data,
            sender: None,
        }
    }

    /// Builds a status-changed message.
    pub fn status(status: crate::TransportStatus, reason: &str) -> Self {
        let mut buf = OutgoingMessage::new();
        buf.write_u8(status.as_byte());
        buf.write_string(reason);
        Self::new(IncomingKind::StatusChanged, buf.into_bytes())
    }

    /// Builds a diagnostic message of the given kind.
    pub fn diagnostic(kind: IncomingKind, text: &str) -> Self {
        let mut buf = OutgoingMessage::new();
        buf.write_string(text);
        Self::new(kind, buf.into_bytes())
    }

    /// Tags the message with the address it came from.
    pub fn with_sender(mut self, sender: SocketAddr) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn kind(&self) -> IncomingKind {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn sender(&self) -> Option<SocketAddr> {
        self.sender
    }

    /// Returns a reader positioned at the start of the payload.
    pub fn reader(&self) -> MessageReader<'_> {
        MessageReader::new(&self.data)
    }
}

// ---------------------------------------------------------------------------
// MessageReader
// ---------------------------------------------------------------------------

/// Sequential reader over a message payload.
#[derive(Debug, Clone)]
pub struct MessageReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8, TransportError> {
        let bytes = self.take(1)?;
        Ok(bytes[0])
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, TransportError> {
        let len = self.read_varint()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            TransportError::Malformed(format!("string is not UTF-8: {e}"))
        })
    }

    /// Returns everything not yet read and moves to the end.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_varint(&mut self) -> Result<u32, TransportError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(TransportError::Malformed(
            "length prefix longer than 5 bytes".into(),
        ))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], TransportError> {
        if self.remaining() < len {
            return Err(TransportError::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }
}
