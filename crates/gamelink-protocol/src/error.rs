//! Error types for the protocol layer.

use gamelink_transport::TransportError;

/// Errors that can occur while decoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The bytes could not be read as a transport buffer.
    #[error("malformed payload: {0}")]
    Malformed(#[from] TransportError),

    /// The leading protocol-name field did not match ours.
    #[error("unexpected protocol {found:?}, expected {expected:?}")]
    ProtocolMismatch {
        /// The protocol name we speak.
        expected: String,
        /// The protocol name the peer sent.
        found: String,
    },

    /// The message-kind field is not one we know.
    #[error("unknown handshake kind {0:?}")]
    UnknownKind(String),
}
