//! Error types for the session layer.

use std::time::Duration;

/// A boxed error from a lower layer (transport, address parsing).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while managing a connection session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configured platform is neither of the supported kinds.
    #[error("unsupported platform {0:?}")]
    UnsupportedPlatform(String),

    /// The identity provider could not supply a name and id.
    #[error("identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// The transport never reported `Connected` within the bound.
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Connection setup failed for any other reason.
    #[error("connect failed: {0}")]
    ConnectError(#[source] BoxError),

    /// Processing one inbound message failed. The receive loop logs
    /// these and moves on to the next message.
    #[error("transport fault: {0}")]
    TransportFault(#[source] BoxError),

    /// The transport rejected a start or send.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}
