//! Session types: configuration, lifecycle state, and events.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use gamelink_protocol::PROTOCOL_NAME;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Platform tag to connect as: `"Steam"` or `"GOG"`.
    ///
    /// Parsed on every connect, so an unsupported value surfaces as
    /// `UnsupportedPlatform` from `connect` rather than at construction.
    pub platform: String,

    /// Protocol name sent first in every handshake field list.
    pub protocol_name: String,

    /// How long `connect` waits for the session to reach `Connected`.
    pub connect_timeout: Duration,

    /// How often `connect` checks the session state while waiting.
    pub poll_interval: Duration,

    /// How long the receive loop sleeps after draining the inbound queue.
    pub idle_backoff: Duration,

    /// How long a reconnect waits for the previous connection's
    /// `Disconnected` report before starting the new attempt.
    pub teardown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            platform: "Steam".to_string(),
            protocol_name: PROTOCOL_NAME.to_string(),
            connect_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            idle_backoff: Duration::from_millis(1),
            teardown_timeout: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of the single connection a session manager owns.
///
/// ```text
/// Idle → Connecting → Connected → Disconnecting → Disconnected
///            │            │
///            └────────────┴──→ Failed
/// ```
///
/// `Disconnected` and `Failed` are both valid starting points for a new
/// `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
    Disconnected = 4,
    Failed = 5,
}

impl SessionState {
    /// Returns `true` while a connection is being set up or is up.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnecting,
            4 => Self::Disconnected,
            _ => Self::Failed,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Atomic cell holding a [`SessionState`].
///
/// The caller and the receive loop both drive transitions, so every
/// conditional move goes through a compare-and-swap.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Unconditionally sets the state, returning the previous one.
    pub(crate) fn replace(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }

    /// Moves to `to` if the current state is one of `from`.
    ///
    /// Returns the state that was replaced, or `None` if the current
    /// state wasn't in `from` and nothing changed.
    pub(crate) fn transition(
        &self,
        from: &[SessionState],
        to: SessionState,
    ) -> Option<SessionState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                from.contains(&SessionState::from_u8(current))
                    .then_some(to as u8)
            })
            .ok()
            .map(SessionState::from_u8)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The status transitions reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Failed,
}

/// Something the session manager reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Raised once per transition.
    StatusChanged(ConnectionStatus),

    /// One inbound application-data message, in arrival order.
    DataReceived(Vec<u8>),
}
