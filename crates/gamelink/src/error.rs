//! Unified error type for Gamelink.

use gamelink_protocol::ProtocolError;
use gamelink_registry::RegistryError;
use gamelink_session::SessionError;
use gamelink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GamelinkError {
    /// Transport buffers or the transport itself.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Handshake decoding.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Connecting, identity, or the session lifecycle.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Loading a server config file.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
