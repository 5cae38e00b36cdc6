//! Registry configuration and the on-disk server config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::RegistryError;

/// Well-known port servers listen on.
pub const DISCOVERY_PORT: u16 = 14192;

/// Player limit used when nothing else says otherwise.
pub const DEFAULT_MAX_PLAYERS: u32 = 32;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// A local server configuration file (`server.json`).
///
/// Every field is optional in the file:
///
/// ```json
/// { "ipAddress": "192.0.2.10", "port": 14192, "serverName": "LAN box" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_ip_address")]
    pub ip_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Server simulation rate in Hz. Informational on the client.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,

    #[serde(default = "default_max_players")]
    pub max_players: u32,

    /// Disambiguates games sharing the same server infrastructure.
    #[serde(default)]
    pub app_identifier: String,

    #[serde(default)]
    pub server_name: String,
}

fn default_ip_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    DISCOVERY_PORT
}
fn default_tick_rate() -> u32 {
    60
}
fn default_max_players() -> u32 {
    DEFAULT_MAX_PLAYERS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip_address: default_ip_address(),
            port: default_port(),
            tick_rate: default_tick_rate(),
            max_players: default_max_players(),
            app_identifier: String::new(),
            server_name: String::new(),
        }
    }
}

impl ServerConfig {
    /// Reads and parses a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&content).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses config file contents.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// The configured server name, if one was given.
    pub fn name(&self) -> Option<&str> {
        let name = self.server_name.trim();
        (!name.is_empty()).then_some(name)
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// A server the registry always knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapEntry {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
}

/// Configuration for a [`ServerRegistry`](crate::ServerRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Entries seeded at construction, in order.
    pub bootstrap: Vec<BootstrapEntry>,

    /// Optional [`ServerConfig`] file. A missing or unreadable file is
    /// logged and skipped.
    pub config_path: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bootstrap: vec![BootstrapEntry {
                id: "termlink-1".to_string(),
                name: "Termlink Public Server".to_string(),
                address: "203.0.113.5".to_string(),
                port: DISCOVERY_PORT,
            }],
            config_path: None,
        }
    }
}

impl RegistryConfig {
    /// A config with no bootstrap entries and no config file.
    pub fn empty() -> Self {
        Self {
            bootstrap: Vec::new(),
            config_path: None,
        }
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }
}
