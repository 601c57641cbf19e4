//! Session state types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque session identifier, one per UI-visible connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Session lifecycle state.
///
/// ```text
/// Idle -> [Probing ->] Connecting -> Connected -> Disconnecting -> Idle
/// Connected -> ReconnectWaiting -> Reconnecting -> Connected
/// ReconnectWaiting -> Closed            (budget exhausted / user cancel)
/// *  -> Closed                          (explicit close)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Not connected, nothing in flight.
    Idle,
    /// Fail-fast reachability check before a user-initiated connect.
    Probing,
    /// User-initiated connect in flight.
    Connecting,
    /// Transport connected.
    Connected,
    /// User-initiated disconnect in progress.
    Disconnecting,
    /// Lost connection; polling the endpoint until it is reachable again.
    ReconnectWaiting,
    /// Automatic reconnect in flight.
    Reconnecting,
    /// No further automatic attempts will be made.
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Probing => "probing",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnecting => "disconnecting",
            SessionState::ReconnectWaiting => "reconnect-waiting",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
        }
    }

    /// A user-visible "reconnect pending" indicator should be shown.
    pub fn is_reconnect_pending(&self) -> bool {
        matches!(self, SessionState::ReconnectWaiting | SessionState::Reconnecting)
    }

    /// A connect attempt (user or automatic) is outstanding.
    pub fn is_attempt_in_flight(&self) -> bool {
        matches!(
            self,
            SessionState::Probing | SessionState::Connecting | SessionState::Reconnecting
        )
    }

    /// A user connect request is accepted from this state.
    pub fn accepts_user_connect(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::ReconnectWaiting | SessionState::Closed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a session, including which owned resources are live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    /// Remaining automatic reconnect attempts.
    pub reconnect_budget: u32,
    /// Reconnect probe timer is running.
    pub reconnect_timer_active: bool,
    /// A dial (user or automatic) is outstanding.
    pub attempt_in_flight: bool,
    /// A proxy tunnel is open for the current attempt.
    pub tunnel_open: bool,
    /// A debounced resize is waiting for its quiet period.
    pub resize_pending: bool,
    /// Successful automatic reconnections so far.
    pub reconnect_count: u32,
    /// Last disconnect reason reported by a transport.
    pub last_disconnect: Option<String>,
}

impl SessionSnapshot {
    /// True when no timer, dial, or tunnel is alive.
    pub fn is_quiescent(&self) -> bool {
        !self.reconnect_timer_active && !self.attempt_in_flight && !self.tunnel_open && !self.resize_pending
    }
}
