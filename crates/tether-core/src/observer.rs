//! Hooks into the presentation layer.
//!
//! Sessions never talk to a UI directly. User-visible events go through an
//! injected [`SessionObserver`]; local layout changes go to a
//! [`DisplaySurface`]. Both default to doing nothing beyond logging.

use tracing::{error, info, warn};

use crate::error::Error;
use crate::session::{SessionId, SessionState};
use crate::transport::DisplaySize;

/// Receives user-visible session events.
///
/// Called from the session's actor task; implementations must not block.
pub trait SessionObserver: Send + Sync {
    /// The session moved between states.
    fn state_changed(&self, _id: SessionId, _from: SessionState, _to: SessionState) {}

    /// A reconnect probe completed while waiting to reconnect.
    ///
    /// `server_ready` is the probe result; drives a "reconnect pending"
    /// indicator.
    fn reconnect_pending(&self, _id: SessionId, _server_ready: bool) {}

    /// Informational message, e.g. a transient failure that will be retried.
    fn info(&self, _id: SessionId, _message: &str) {}

    /// An error the user should see.
    fn error(&self, _id: SessionId, _error: &Error) {}

    /// The session reached `Closed`; `last_reason` is the final message.
    fn closed(&self, _id: SessionId, _last_reason: Option<&str>) {}
}

/// Observer that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn state_changed(&self, id: SessionId, from: SessionState, to: SessionState) {
        info!(session = %id, %from, %to, "session state changed");
    }

    fn reconnect_pending(&self, id: SessionId, server_ready: bool) {
        info!(session = %id, server_ready, "reconnect pending");
    }

    fn info(&self, id: SessionId, message: &str) {
        info!(session = %id, "{message}");
    }

    fn error(&self, id: SessionId, error: &Error) {
        error!(session = %id, error = %error, "session error");
    }

    fn closed(&self, id: SessionId, last_reason: Option<&str>) {
        warn!(session = %id, reason = last_reason.unwrap_or("none"), "session closed");
    }
}

/// Local rendering surface of a session.
pub trait DisplaySurface: Send + Sync {
    /// Apply a new local layout. Called synchronously on every resize request.
    fn apply_local_layout(&self, size: DisplaySize);
}
