//! Transport abstraction consumed by the session core.
//!
//! A transport is one concrete remote-protocol backend (RDP, VNC, a terminal
//! protocol, ...). The core never looks past this trait: it dials, resizes,
//! disconnects, and listens to lifecycle events on the channel returned by
//! [`Transport::subscribe`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::endpoint::Endpoint;
use crate::error::Result;

/// Remote display size in pixels (or cells, for terminal transports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for DisplaySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Why a transport disconnected.
///
/// Transports decide which reasons are deliberate; the core trusts that
/// distinction and only reconnects after non-deliberate drops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The remote user logged off.
    UserLogoff,
    /// Normal, locally requested disconnect.
    Normal,
    /// Network failure (reset, idle timeout, route loss).
    Network(String),
    /// The connect routine itself failed.
    DialFailed(String),
    /// Protocol-specific reason code reported by the remote side.
    Remote { code: u32, description: String },
}

impl DisconnectReason {
    /// Deliberate disconnects never trigger automatic reconnection.
    pub fn is_deliberate(&self) -> bool {
        matches!(self, DisconnectReason::UserLogoff | DisconnectReason::Normal)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::UserLogoff => f.write_str("user logged off"),
            DisconnectReason::Normal => f.write_str("disconnected"),
            DisconnectReason::Network(msg) => write!(f, "network error: {msg}"),
            DisconnectReason::DialFailed(msg) => write!(f, "connect failed: {msg}"),
            DisconnectReason::Remote { code, description } => {
                write!(f, "remote disconnect 0x{code:X}: {description}")
            }
        }
    }
}

/// Lifecycle event raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected(DisconnectReason),
}

/// Sending half of a transport's event channel.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of a transport's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// One remote-protocol connection.
///
/// Instances are single-use: the session creates a fresh transport through a
/// [`TransportFactory`] for every user-initiated or scheduler-driven attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection. May take a long time; the session bounds it.
    async fn connect(&self) -> Result<()>;

    /// Tear the connection down. Must be safe to call at any time, including
    /// while `connect` is still running.
    async fn disconnect(&self);

    /// Renegotiate the remote display size.
    async fn resize(&self, size: DisplaySize) -> Result<()>;

    /// Subscribe to lifecycle events. Only one subscriber is supported; the
    /// session calls this exactly once per instance.
    fn subscribe(&self) -> EventReceiver;

    /// Ceiling of the transport's internal automatic-reconnect counter, if it
    /// has one.
    fn reconnect_ceiling(&self) -> Option<u32> {
        None
    }

    /// Arm the internal automatic-reconnect counter. Ignored by transports
    /// without one.
    fn set_reconnect_attempts(&self, _attempts: u32) {}
}

/// Creates a transport that dials `endpoint`.
///
/// `endpoint` is either the real target or a local proxy tunnel.
pub trait TransportFactory: Send + Sync {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&Endpoint) -> Arc<dyn Transport> + Send + Sync,
{
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn Transport> {
        self(endpoint)
    }
}
