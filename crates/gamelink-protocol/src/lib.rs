//! Wire protocol for Gamelink.
//!
//! - **Handshake** ([`HandshakePayload`], [`HandshakeKind`]): the identity
//!   messages a client sends while connecting.
//! - **Delivery policy** ([`DeliveryTier`]): the reliability/ordering class
//!   of an outgoing message and its transport send mode.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! ```text
//! Transport (buffers) → Protocol (handshake, tiers) → Session (lifecycle)
//! ```

mod delivery;
mod error;
mod handshake;

pub use delivery::DeliveryTier;
pub use error::ProtocolError;
pub use handshake::{HandshakeKind, HandshakePayload, PROTOCOL_NAME};
