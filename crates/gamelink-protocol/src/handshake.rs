//! The two-message identity handshake.
//!
//! A client identifies itself twice:
//!
//! 1. **Hail** ([`HandshakeKind::ConnectRequest`]): carried as
//!    connection-establishment data on the transport connect.
//! 2. **Initialization** ([`HandshakeKind::Initialize`]): sent
//!    reliable-ordered right after the transport reports `Connected`.
//!    The server won't treat the session as established until it sees it.
//!
//! Both use the same five-field layout, each field a length-prefixed
//! string, in this order:
//!
//! ```text
//! protocol-name | message-kind | platform-tag | username | platform-id
//! ```

use std::fmt;

use gamelink_transport::{MessageReader, OutgoingMessage};

use crate::ProtocolError;

/// The protocol name both peers must agree on.
pub const PROTOCOL_NAME: &str = "ROBCO INDUSTRIES (TM) TERMLINK PROTOCOL";

/// Which of the two handshake messages this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeKind {
    /// Pre-connect hail.
    ConnectRequest,
    /// Post-ack identity confirmation.
    Initialize,
}

impl HandshakeKind {
    /// The message-kind string sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectRequest => "CONNECT_REQUEST",
            Self::Initialize => "INITIALIZING NETWORK PROTOCOLS",
        }
    }

    /// Parses a message-kind string.
    pub fn parse(kind: &str) -> Result<Self, ProtocolError> {
        match kind {
            "CONNECT_REQUEST" => Ok(Self::ConnectRequest),
            "INITIALIZING NETWORK PROTOCOLS" => Ok(Self::Initialize),
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for HandshakeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePayload {
    pub protocol: String,
    pub kind: HandshakeKind,
    /// Platform tag, e.g. `"Steam"` or `"GOG"`.
    pub platform: String,
    pub username: String,
    pub platform_id: String,
}

impl HandshakePayload {
    /// Writes the five fields into `msg`, in wire order.
    pub fn write_to(&self, msg: &mut OutgoingMessage) {
        msg.write_string(&self.protocol);
        msg.write_string(self.kind.as_str());
        msg.write_string(&self.platform);
        msg.write_string(&self.username);
        msg.write_string(&self.platform_id);
    }

    /// Encodes into a fresh message.
    pub fn encode(&self) -> OutgoingMessage {
        let mut msg = OutgoingMessage::new();
        self.write_to(&mut msg);
        msg
    }

    /// Reads the five fields from `reader`.
    pub fn read_from(reader: &mut MessageReader<'_>) -> Result<Self, ProtocolError> {
        let protocol = reader.read_string()?;
        let kind = HandshakeKind::parse(&reader.read_string()?)?;
        let platform = reader.read_string()?;
        let username = reader.read_string()?;
        let platform_id = reader.read_string()?;
        Ok(Self {
            protocol,
            kind,
            platform,
            username,
            platform_id,
        })
    }

    /// Decodes a payload and checks it speaks `expected_protocol`.
    ///
    /// This is what a server does with an incoming hail.
    pub fn decode(
        data: &[u8],
        expected_protocol: &str,
    ) -> Result<Self, ProtocolError> {
        let payload = Self::read_from(&mut MessageReader::new(data))?;
        if payload.protocol != expected_protocol {
            return Err(ProtocolError::ProtocolMismatch {
                expected: expected_protocol.to_string(),
                found: payload.protocol,
            });
        }
        Ok(payload)
    }
}
