//! Server records and their keys.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Status label for a server that answered recently.
pub const STATUS_ONLINE: &str = "ONLINE";

/// Status label for a server nobody has heard from yet.
pub const STATUS_UNKNOWN: &str = "UNKNOWN";

/// Latency value meaning "not measured".
pub const LATENCY_UNKNOWN: i32 = -1;

/// Identifies a server: its address and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerKey {
    pub address: String,
    pub port: u16,
}

impl ServerKey {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

/// Formats as `address:port`.
impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// One known server and its last observed liveness.
///
/// Only `status`, `latency`, `player_count` and `last_update` change after
/// the record is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub protocol: String,
    pub version: String,
    pub player_count: u32,
    pub max_players: u32,
    pub game_mode: String,
    /// Free-form label, usually [`STATUS_ONLINE`] or [`STATUS_UNKNOWN`].
    pub status: String,
    /// Round-trip time in milliseconds, or [`LATENCY_UNKNOWN`].
    pub latency: i32,
    pub last_update: SystemTime,
    pub app_identifier: String,
}

impl ServerRecord {
    pub fn key(&self) -> ServerKey {
        ServerKey::new(self.address.clone(), self.port)
    }

    /// Returns `true` if `latency` holds a measurement.
    pub fn has_latency(&self) -> bool {
        self.latency >= 0
    }
}
