//! Scripted in-memory transport.
//!
//! A [`MockTransportFactory`] hands out a fresh [`MockTransport`] per attempt,
//! like a real factory, while all instances record into one shared log so a
//! test can assert on the whole session history: endpoints dialed, connect
//! and disconnect calls, resizes, reconnect arming.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tracing::debug;

use tether_core::endpoint::Endpoint;
use tether_core::error::{Error, Result};
use tether_core::transport::{
    DisconnectReason, DisplaySize, EventReceiver, EventSender, Transport, TransportEvent,
    TransportFactory,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// How the next `connect` call behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Connect immediately.
    Succeed,
    /// Fail immediately with `TransportConnect`.
    Fail(String),
    /// Connect after a delay.
    SucceedAfter(Duration),
    /// Never finish on its own; returns an error once `disconnect` is called.
    Hang,
    /// Report `Connected` then `Disconnected(reason)` from inside `connect`,
    /// and still return success, as a link whose peer hangs up at once.
    DropDuringConnect(DisconnectReason),
}

#[derive(Default)]
struct Shared {
    script: Mutex<VecDeque<ConnectOutcome>>,
    transports: Mutex<Vec<Arc<MockTransport>>>,
    resizes: Mutex<Vec<DisplaySize>>,
    armed: Mutex<Vec<u32>>,
    connects: AtomicU32,
    disconnects: AtomicU32,
    ceiling: Option<u32>,
}

/// Factory producing [`MockTransport`]s that share one script and one log.
///
/// Clones share state, so a test keeps one clone for assertions and hands
/// another to the session.
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    shared: Arc<Shared>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transports created by this factory report an internal reconnect
    /// counter capped at `ceiling`.
    pub fn with_reconnect_ceiling(ceiling: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                ceiling: Some(ceiling),
                ..Shared::default()
            }),
        }
    }

    /// Queue outcomes for upcoming `connect` calls. Unscripted calls succeed.
    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = ConnectOutcome>) {
        lock(&self.shared.script).extend(outcomes);
    }

    /// Most recently created transport.
    pub fn latest(&self) -> Option<Arc<MockTransport>> {
        lock(&self.shared.transports).last().cloned()
    }

    /// Transport created by the `index`th call to `create`.
    pub fn nth(&self, index: usize) -> Option<Arc<MockTransport>> {
        lock(&self.shared.transports).get(index).cloned()
    }

    /// Number of transports created so far.
    pub fn created(&self) -> usize {
        lock(&self.shared.transports).len()
    }

    /// Endpoints passed to `create`, in order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        lock(&self.shared.transports)
            .iter()
            .map(|t| t.endpoint.clone())
            .collect()
    }

    pub fn connect_calls(&self) -> u32 {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.shared.disconnects.load(Ordering::SeqCst)
    }

    /// Resizes received by any transport, in order.
    pub fn resizes(&self) -> Vec<DisplaySize> {
        lock(&self.shared.resizes).clone()
    }

    /// Values passed to `set_reconnect_attempts`, in order.
    pub fn armed_attempts(&self) -> Vec<u32> {
        lock(&self.shared.armed).clone()
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn Transport> {
        let transport = Arc::new(MockTransport::new(endpoint.clone(), Arc::clone(&self.shared)));
        lock(&self.shared.transports).push(Arc::clone(&transport));
        transport
    }
}

/// One scripted transport instance.
pub struct MockTransport {
    endpoint: Endpoint,
    shared: Arc<Shared>,
    events_tx: EventSender,
    events_rx: Mutex<Option<EventReceiver>>,
    abort: Notify,
    connected: AtomicBool,
}

impl MockTransport {
    fn new(endpoint: Endpoint, shared: Arc<Shared>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            endpoint,
            shared,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            abort: Notify::new(),
            connected: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Raise a lifecycle event as the remote side would.
    pub fn emit(&self, event: TransportEvent) {
        if let TransportEvent::Disconnected(_) = &event {
            self.connected.store(false, Ordering::SeqCst);
        }
        let _ = self.events_tx.send(event);
    }

    /// Simulate the connection dropping.
    pub fn drop_connection(&self, reason: DisconnectReason) {
        self.emit(TransportEvent::Disconnected(reason));
    }

    fn next_outcome(&self) -> ConnectOutcome {
        lock(&self.shared.script)
            .pop_front()
            .unwrap_or(ConnectOutcome::Succeed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<()> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        let outcome = self.next_outcome();
        debug!(endpoint = %self.endpoint, ?outcome, "mock connect");

        match outcome {
            ConnectOutcome::Succeed => {}
            ConnectOutcome::Fail(message) => return Err(Error::TransportConnect { message }),
            ConnectOutcome::SucceedAfter(delay) => tokio::time::sleep(delay).await,
            ConnectOutcome::Hang => {
                self.abort.notified().await;
                return Err(Error::TransportConnect {
                    message: "connect aborted".into(),
                });
            }
            ConnectOutcome::DropDuringConnect(reason) => {
                self.emit(TransportEvent::Connected);
                self.emit(TransportEvent::Disconnected(reason));
                tokio::task::yield_now().await;
                return Ok(());
            }
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.shared.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.abort.notify_one();
    }

    async fn resize(&self, size: DisplaySize) -> Result<()> {
        lock(&self.shared.resizes).push(size);
        Ok(())
    }

    fn subscribe(&self) -> EventReceiver {
        match lock(&self.events_rx).take() {
            Some(rx) => rx,
            None => mpsc::unbounded_channel().1,
        }
    }

    fn reconnect_ceiling(&self) -> Option<u32> {
        self.shared.ceiling
    }

    fn set_reconnect_attempts(&self, attempts: u32) {
        lock(&self.shared.armed).push(attempts);
    }
}

// =============================================================================
// Tests
// =============================================================================
