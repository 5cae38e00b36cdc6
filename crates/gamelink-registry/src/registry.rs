//! Server registry: the known servers and their change events.

use std::collections::BTreeMap;
use std::time::SystemTime;

use gamelink_protocol::PROTOCOL_NAME;
use tokio::sync::mpsc;

use crate::config::{BootstrapEntry, DEFAULT_MAX_PLAYERS};
use crate::record::{LATENCY_UNKNOWN, STATUS_ONLINE, STATUS_UNKNOWN};
use crate::{RegistryConfig, ServerConfig, ServerKey, ServerRecord};

/// Name given to added servers when the config file doesn't name one.
const DEFAULT_SERVER_NAME: &str = "Gamelink Server";

/// Version reported for added servers until they tell us otherwise.
const ADDED_SERVER_VERSION: &str = "0.1";

const BOOTSTRAP_VERSION: &str = "1.0.0";
const BOOTSTRAP_GAME_MODE: &str = "Standard";

/// Something that happened to the registry's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A server was added, or republished by
    /// [`discover_servers`](ServerRegistry::discover_servers).
    Discovered(ServerRecord),

    /// A server's status, latency or player count changed.
    Updated(ServerRecord),

    /// A server was explicitly removed.
    Removed(ServerKey),
}

/// Receiving end of a registry's events.
pub type RegistryEvents = mpsc::UnboundedReceiver<RegistryEvent>;

/// Tracks known servers, keyed by `(address, port)`.
///
/// At most one record exists per key. Operations never fail: adding a
/// known key or removing an unknown one changes nothing. The registry
/// has a single owner; share it behind a lock if several tasks need it.
#[derive(Debug)]
pub struct ServerRegistry {
    /// Known servers. The map key is the only place uniqueness is
    /// enforced: every insert goes through `entry` or a `contains_key`
    /// check, never a blind `insert` over an existing key.
    ///
    /// A `BTreeMap` so snapshots come out in a stable order.
    servers: BTreeMap<ServerKey, ServerRecord>,

    /// The loaded config file, used for defaults when adding servers.
    /// `None` if no path was configured or the file didn't load.
    server_config: Option<ServerConfig>,

    /// Sender half of the event channel handed out by [`new`](Self::new).
    /// Sends are ignored once the receiver is dropped.
    events: mpsc::UnboundedSender<RegistryEvent>,
}

impl ServerRegistry {
    /// Creates a registry seeded from `config`.
    ///
    /// Bootstrap entries go in first, then the config file's server if
    /// the file loads. Seeding raises no events; call
    /// [`discover_servers`](Self::discover_servers) to publish them.
    pub fn new(config: RegistryConfig) -> (Self, RegistryEvents) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let mut registry = Self {
            servers: BTreeMap::new(),
            server_config: None,
            events,
        };

        for entry in &config.bootstrap {
            let record = bootstrap_record(entry);
            registry.servers.entry(record.key()).or_insert(record);
        }

        if let Some(path) = &config.config_path {
            match ServerConfig::load(path) {
                Ok(server_config) => {
                    tracing::info!(
                        path = %path.display(),
                        address = %server_config.ip_address,
                        port = server_config.port,
                        "loaded server config"
                    );
                    let key = ServerKey::new(server_config.ip_address.clone(), server_config.port);
                    registry.server_config = Some(server_config);
                    let record = registry.new_record(key);
                    registry.servers.entry(record.key()).or_insert(record);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "server config not loaded; continuing without it");
                }
            }
        }

        tracing::debug!(servers = registry.servers.len(), "server registry seeded");
        (registry, events_rx)
    }

    fn emit(&self, event: RegistryEvent) {
        let _ = self.events.send(event);
    }

    fn new_record(&self, key: ServerKey) -> ServerRecord {
        let config = self.server_config.as_ref();
        ServerRecord {
            id: key.to_string(),
            name: config
                .and_then(ServerConfig::name)
                .unwrap_or(DEFAULT_SERVER_NAME)
                .to_string(),
            address: key.address,
            port: key.port,
            protocol: PROTOCOL_NAME.to_string(),
            version: ADDED_SERVER_VERSION.to_string(),
            player_count: 0,
            max_players: config.map_or(DEFAULT_MAX_PLAYERS, |c| c.max_players),
            game_mode: String::new(),
            status: STATUS_UNKNOWN.to_string(),
            latency: LATENCY_UNKNOWN,
            last_update: SystemTime::now(),
            app_identifier: config
                .map(|c| c.app_identifier.clone())
                .unwrap_or_default(),
        }
    }

    /// Republishes every known server as [`RegistryEvent::Discovered`].
    ///
    /// No network probing happens here; the records carry whatever
    /// [`update_server`](Self::update_server) last wrote.
    pub async fn discover_servers(&self) {
        tracing::debug!(servers = self.servers.len(), "publishing known servers");
        for record in self.servers.values() {
            self.emit(RegistryEvent::Discovered(record.clone()));
        }
    }

    /// Adds a server with default metadata.
    ///
    /// Returns `false` (and changes nothing) if the key is already known.
    pub fn add_server(&mut self, address: &str, port: u16) -> bool {
        let key = ServerKey::new(address, port);
        if self.servers.contains_key(&key) {
            tracing::debug!(%key, "server already known");
            return false;
        }

        let record = self.new_record(key.clone());
        self.servers.insert(key.clone(), record.clone());
        tracing::info!(%key, "server added");
        self.emit(RegistryEvent::Discovered(record));
        true
    }

    /// Removes a server. Returns `false` if it wasn't known.
    pub fn remove_server(&mut self, address: &str, port: u16) -> bool {
        let key = ServerKey::new(address, port);
        if self.servers.remove(&key).is_none() {
            return false;
        }
        tracing::info!(%key, "server removed");
        self.emit(RegistryEvent::Removed(key));
        true
    }

    /// Forgets every server without raising per-server events.
    pub fn clear_servers(&mut self) {
        self.servers.clear();
        tracing::info!("cleared all servers");
    }

    /// Records fresh liveness data for a known server.
    ///
    /// Only the mutable fields change. Returns `false` if the key is
    /// unknown.
    pub fn update_server(
        &mut self,
        address: &str,
        port: u16,
        status: &str,
        latency: i32,
        player_count: u32,
    ) -> bool {
        let key = ServerKey::new(address, port);
        let Some(record) = self.servers.get_mut(&key) else {
            tracing::debug!(%key, "update for unknown server ignored");
            return false;
        };

        record.status = status.to_string();
        record.latency = latency;
        record.player_count = player_count;
        record.last_update = SystemTime::now();
        let snapshot = record.clone();

        tracing::debug!(%key, status, latency, player_count, "server updated");
        self.emit(RegistryEvent::Updated(snapshot));
        true
    }

    /// A snapshot of every known server, ordered by key.
    pub fn get_servers(&self) -> Vec<ServerRecord> {
        self.servers.values().cloned().collect()
    }

    pub fn get(&self, address: &str, port: u16) -> Option<&ServerRecord> {
        self.servers.get(&ServerKey::new(address, port))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// The config file loaded at construction, if any.
    pub fn server_config(&self) -> Option<&ServerConfig> {
        self.server_config.as_ref()
    }
}

fn bootstrap_record(entry: &BootstrapEntry) -> ServerRecord {
    ServerRecord {
        id: entry.id.clone(),
        name: entry.name.clone(),
        address: entry.address.clone(),
        port: entry.port,
        protocol: PROTOCOL_NAME.to_string(),
        version: BOOTSTRAP_VERSION.to_string(),
        player_count: 0,
        max_players: DEFAULT_MAX_PLAYERS,
        game_mode: BOOTSTRAP_GAME_MODE.to_string(),
        status: STATUS_ONLINE.to_string(),
        latency: 0,
        last_update: SystemTime::now(),
        app_identifier: String::new(),
    }
}
