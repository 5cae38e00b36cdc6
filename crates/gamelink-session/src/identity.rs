//! Player identity for the connection handshake.
//!
//! Gamelink doesn't authenticate players itself. The handshake carries
//! whatever identity the configured platform supplies:
//!
//! - [`Platform::Steam`]: a networked identity service, reached through
//!   the [`IdentityProvider`] trait. If the service can't be initialized
//!   the connect fails closed with `IdentityUnavailable`.
//! - [`Platform::Gog`]: a local anonymous identity ([`LocalIdentity`])
//!   derived from the machine name. Stable across runs on one machine,
//!   not globally unique.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::SessionError;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// The identity platform a client connects as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Networked identity service.
    Steam,
    /// Local anonymous identity.
    Gog,
}

impl Platform {
    /// The platform tag sent in the handshake.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Steam => "Steam",
            Self::Gog => "GOG",
        }
    }
}

impl FromStr for Platform {
    type Err = SessionError;

    /// Parses a platform tag, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("steam") {
            Ok(Self::Steam)
        } else if s.eq_ignore_ascii_case("gog") {
            Ok(Self::Gog)
        } else {
            Err(SessionError::UnsupportedPlatform(s.to_string()))
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// IdentityProvider
// ---------------------------------------------------------------------------

/// A source of display name and platform id.
///
/// Calls are synchronous and cheap once the provider is ready.
/// `initialize` is only called when `is_ready` reports `false`.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns `true` once the provider can answer identity queries.
    fn is_ready(&self) -> bool;

    /// Brings the provider up. Returns `false` on failure.
    fn initialize(&self) -> bool;

    /// The player's display name.
    fn display_name(&self) -> String;

    /// The player's platform-scoped identifier.
    fn platform_id(&self) -> String;
}

/// A resolved identity, ready to go into a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub platform: Platform,
    pub username: String,
    pub platform_id: String,
}

// ---------------------------------------------------------------------------
// LocalIdentity
// ---------------------------------------------------------------------------

/// An anonymous identity derived from the machine name.
///
/// The name is hashed with 32-bit FNV-1a and reduced to a five-digit
/// tag `n`; the username is `Player_{n:05}` and the platform id is
/// `GOG_{n:08X}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    machine_name: String,
}

impl LocalIdentity {
    pub fn new(machine_name: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
        }
    }

    /// Uses this machine's name.
    pub fn from_environment() -> Self {
        Self::new(machine_name())
    }

    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    /// The five-digit tag both identity strings are built from.
    pub fn tag(&self) -> u32 {
        fnv1a(self.machine_name.as_bytes()) % 100_000
    }
}

impl IdentityProvider for LocalIdentity {
    fn is_ready(&self) -> bool {
        true
    }

    fn initialize(&self) -> bool {
        true
    }

    fn display_name(&self) -> String {
        format!("Player_{:05}", self.tag())
    }

    fn platform_id(&self) -> String {
        format!("GOG_{:08X}", self.tag())
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    bytes.iter().fold(OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(PRIME)
    })
}

/// Best-effort machine name: environment first, then `/etc/hostname`.
fn machine_name() -> String {
    ["COMPUTERNAME", "HOSTNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

// ---------------------------------------------------------------------------
// IdentitySource: picks a provider by platform
// ---------------------------------------------------------------------------

/// The providers a session manager can draw identities from.
pub(crate) struct IdentitySource {
    pub(crate) service: Option<Arc<dyn IdentityProvider>>,
    pub(crate) local: LocalIdentity,
}

impl IdentitySource {
    pub(crate) fn new() -> Self {
        Self {
            service: None,
            local: LocalIdentity::from_environment(),
        }
    }

    /// Resolves the identity to connect as on `platform`.
    pub(crate) fn resolve(
        &self,
        platform: Platform,
    ) -> Result<Identity, SessionError> {
        let provider: &dyn IdentityProvider = match platform {
            Platform::Steam => {
                let service = self.service.as_deref().ok_or_else(|| {
                    SessionError::IdentityUnavailable(
                        "no identity service configured".into(),
                    )
                })?;
                if !service.is_ready() && !service.initialize() {
                    return Err(SessionError::IdentityUnavailable(
                        "identity service failed to initialize".into(),
                    ));
                }
                service
            }
            Platform::Gog => &self.local,
        };

        Ok(Identity {
            platform,
            username: provider.display_name(),
            platform_id: provider.platform_id(),
        })
    }
}
