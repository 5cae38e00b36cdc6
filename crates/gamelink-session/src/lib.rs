//! Client connection sessions for Gamelink.
//!
//! This crate owns the client side of a game connection:
//!
//! 1. **Identity**: who the player connects as ([`Platform`],
//!    [`IdentityProvider`], [`LocalIdentity`])
//! 2. **Handshake**: the connect hail and the post-ack initialization
//! 3. **Session lifecycle**: [`SessionManager`] drives one connection
//!    through [`SessionState`] and reports [`SessionEvent`]s
//! 4. **Dispatch**: outgoing messages by [`DeliveryTier`], inbound
//!    application data forwarded in arrival order
//!
//! # How it fits in the stack
//!
//! ```text
//! Game logic / UI (above)  ← consumes SessionEvents, calls connect/send
//!     ↕
//! Session Layer (this crate)  ← handshake, state machine, receive loop
//!     ↕
//! Protocol + Transport (below)  ← payload layout, send modes, buffers
//! ```
//!
//! [`DeliveryTier`]: gamelink_protocol::DeliveryTier

mod error;
mod identity;
mod manager;
mod session;

pub use error::{BoxError, SessionError};
pub use identity::{Identity, IdentityProvider, LocalIdentity, Platform};
pub use manager::{SessionEvents, SessionManager};
pub use session::{ConnectionStatus, SessionConfig, SessionEvent, SessionState};
