//! Error types for the registry layer.

use std::path::PathBuf;

/// Errors from loading a server configuration file.
///
/// Registry operations themselves never fail; these only come out of
/// [`ServerConfig::load`](crate::ServerConfig::load).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The file couldn't be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file isn't a valid server configuration.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
