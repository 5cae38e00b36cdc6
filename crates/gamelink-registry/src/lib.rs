//! Known-server registry for Gamelink.
//!
//! The registry keeps one [`ServerRecord`] per `(address, port)`, seeded
//! from bootstrap entries and an optional `server.json`, and reports every
//! change as a [`RegistryEvent`].
//!
//! # Key types
//!
//! - [`ServerRegistry`]: add, remove, update, and republish servers
//! - [`ServerRecord`]: one server's identity and liveness
//! - [`RegistryConfig`]: bootstrap entries and config file location
//! - [`ServerConfig`]: the on-disk server config file

mod config;
mod error;
mod record;
mod registry;

pub use config::{BootstrapEntry, DEFAULT_MAX_PLAYERS, DISCOVERY_PORT, RegistryConfig, ServerConfig};
pub use error::RegistryError;
pub use record::{LATENCY_UNKNOWN, STATUS_ONLINE, STATUS_UNKNOWN, ServerKey, ServerRecord};
pub use registry::{RegistryEvent, RegistryEvents, ServerRegistry};
