//! Error types for tether-core.

use thiserror::Error;

/// Main error type for tether operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reachability probe failed before a dial was attempted.
    #[error("{host}:{port} is not reachable")]
    Unreachable { host: String, port: u16 },

    /// Bounded dialer exceeded its budget.
    #[error("timed out connecting to {host}:{port} after {elapsed_secs}s")]
    DialTimeout {
        host: String,
        port: u16,
        elapsed_secs: u64,
    },

    /// Proxy configuration is unusable (missing host, port 0, oversized credentials).
    #[error("invalid proxy configuration: {message}")]
    InvalidProxy { message: String },

    /// Proxy handshake or authentication failed.
    #[error("proxy handshake failed: {message}")]
    ProxyHandshake { message: String },

    /// The transport's own connect routine failed.
    #[error("transport connect failed: {message}")]
    TransportConnect { message: String },

    /// Automatic reconnection gave up.
    #[error("reconnect budget exhausted after {attempts} attempts")]
    BudgetExhausted {
        attempts: u32,
        last_reason: Option<String>,
    },

    /// A connect attempt is already outstanding for this session.
    #[error("a connect attempt is already in progress")]
    ConnectInProgress,

    /// The session was closed and accepts no more requests.
    #[error("session closed")]
    SessionClosed,

    /// Invalid state transition.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Configuration could not be parsed or failed validation.
    #[error("config error: {message}")]
    Config { message: String },

    /// A pending operation was superseded by a disconnect or close.
    #[error("operation cancelled: {reason}")]
    Cancelled { reason: String },

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    /// Returns true if this error is transient and another automatic attempt may help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Unreachable { .. }
                | Error::DialTimeout { .. }
                | Error::ProxyHandshake { .. }
                | Error::TransportConnect { .. }
                | Error::Timeout
        )
    }

    /// Returns true if this error ends the current attempt for good.
    ///
    /// Configuration problems will not fix themselves on retry, and a closed
    /// or exhausted session has nothing left to retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidProxy { .. }
                | Error::Config { .. }
                | Error::BudgetExhausted { .. }
                | Error::SessionClosed
        )
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

/// Convenience result type for tether operations.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Tests
// =============================================================================
