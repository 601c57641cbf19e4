//! Session state and reconnection accounting.
//!
//! The session actor itself lives in `tether-client`; this module holds the
//! transport-agnostic pieces it is built from.

mod reconnect;
mod state;

pub use reconnect::{ExtendedReconnect, ReconnectBudget};
pub use state::{SessionId, SessionSnapshot, SessionState};
