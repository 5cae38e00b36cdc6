//! # Gamelink
//!
//! Client-side session and server registry layer for real-time
//! multiplayer games.
//!
//! A [`SessionManager`](gamelink_session::SessionManager) owns one
//! connection to a game server over any [`Transport`](gamelink_transport::Transport):
//! it runs the identity handshake, sends messages with a
//! [`DeliveryTier`](gamelink_protocol::DeliveryTier), and reports status
//! and inbound data as events. A
//! [`ServerRegistry`](gamelink_registry::ServerRegistry) tracks the
//! servers a player can pick from.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gamelink::prelude::*;
//!
//! # async fn run() -> Result<(), GamelinkError> {
//! gamelink::init_tracing("info");
//!
//! let (registry, _registry_events) = ServerRegistry::new(RegistryConfig::default());
//! let server = registry.get_servers().remove(0);
//!
//! let (transport, _remote) = MemoryTransport::auto_accept();
//! let config = SessionConfig { platform: "GOG".into(), ..SessionConfig::default() };
//! let (session, mut events) = SessionManager::new(transport, config)?;
//!
//! session.connect(&server.address, server.port).await?;
//! session.send_message(b"hello", DeliveryTier::OrderedReliable)?;
//! while let Some(event) = events.recv().await {
//!     // react to StatusChanged / DataReceived
//! #   let _ = event;
//! #   break;
//! }
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod logging;

pub use error::GamelinkError;
pub use logging::init_tracing;

pub use gamelink_protocol as protocol;
pub use gamelink_registry as registry;
pub use gamelink_session as session;
pub use gamelink_transport as transport;

/// Everything needed to run a session and a registry.
pub mod prelude {
    pub use crate::{GamelinkError, init_tracing};
    pub use gamelink_protocol::{DeliveryTier, PROTOCOL_NAME};
    pub use gamelink_registry::{
        RegistryConfig, RegistryEvent, ServerKey, ServerRecord, ServerRegistry,
    };
    pub use gamelink_session::{
        ConnectionStatus, IdentityProvider, LocalIdentity, SessionConfig, SessionError,
        SessionEvent, SessionManager, SessionState,
    };
    pub use gamelink_transport::{MemoryTransport, SendMode, Transport};
}
