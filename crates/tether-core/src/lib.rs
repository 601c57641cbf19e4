//! tether-core: Shared library for tether session lifecycle.
//!
//! This crate provides:
//! - Error types and logging setup
//! - Session configuration (TOML)
//! - Endpoint and transport abstractions
//! - Observer and display-surface hooks
//! - Connectivity prober
//! - Bounded dialer
//! - Session state and reconnect accounting

pub mod config;
pub mod constants;
pub mod dialer;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod observer;
pub mod probe;
pub mod session;
pub mod transport;

pub use config::{ProxyConfig, ProxyKind, SessionConfig};
pub use dialer::{dial_transport, dial_with_timeout};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use logging::{LogFormat, init_logging};
pub use observer::{DisplaySurface, SessionObserver, TracingObserver};
pub use probe::{ReachabilityProbe, TcpProbe, probe, wait_until_reachable};
pub use session::{ExtendedReconnect, ReconnectBudget, SessionId, SessionSnapshot, SessionState};
pub use transport::{
    DisconnectReason, DisplaySize, EventReceiver, EventSender, Transport, TransportEvent,
    TransportFactory,
};
