//! Session controller.
//!
//! A [`Session`] is a cheap, cloneable handle to one remote session. All
//! state lives on a dedicated actor task; handles send it commands and read
//! the published [`SessionState`].
//!
//! ```text
//! Idle -> [Probing ->] Connecting -> Connected -> Disconnecting -> Idle
//! Connected -> ReconnectWaiting -> Reconnecting -> Connected
//! ReconnectWaiting -> Closed   (budget exhausted / cancel_reconnect)
//! any -> Closed                (close)
//! ```
//!
//! The session owns its transport, proxy tunnel, reconnect timer and resize
//! debouncer. Closing it, or dropping the last handle, releases all of them.

mod actor;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use tether_core::config::SessionConfig;
use tether_core::observer::{DisplaySurface, SessionObserver, TracingObserver};
use tether_core::probe::{ReachabilityProbe, TcpProbe};
use tether_core::session::{SessionId, SessionSnapshot, SessionState};
use tether_core::transport::{DisplaySize, TransportFactory};
use tether_core::{Error, Result};

use crate::proxy::{DefaultProxyFactory, ProxyClientFactory};
use crate::resize::ResizeDebouncer;

use actor::{Collaborators, Command, Internal, SessionActor};

/// Bound on queued commands per session.
const COMMAND_QUEUE: usize = 32;

/// Handle to a running session.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    debouncer: Arc<ResizeDebouncer>,
}

impl Session {
    /// Start building a session for `config`, creating transports with
    /// `transports`.
    pub fn builder(
        id: SessionId,
        config: SessionConfig,
        transports: Arc<dyn TransportFactory>,
    ) -> SessionBuilder {
        SessionBuilder {
            id,
            config,
            transports,
            proxies: Arc::new(DefaultProxyFactory),
            prober: Arc::new(TcpProbe),
            observer: Arc::new(TracingObserver),
            surface: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Last published state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver that observes every published state.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the session publishes `target`.
    pub async fn wait_for_state(&self, target: SessionState) -> Result<()> {
        let mut rx = self.state.clone();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| Error::SessionClosed)
    }

    /// User-initiated connect.
    ///
    /// Resolves once the transport is connected or the attempt failed. From
    /// `ReconnectWaiting` this is a manual reconnect: the scheduler stops and
    /// the reconnect budget is restored.
    pub async fn connect(&self) -> Result<()> {
        self.request(Command::Connect).await?
    }

    /// User-initiated disconnect. Never triggers automatic reconnection.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(Command::Disconnect).await?
    }

    /// Stop waiting to reconnect and move to `Closed`.
    pub async fn cancel_reconnect(&self) -> Result<()> {
        self.request(Command::CancelReconnect).await?
    }

    /// Record a new display size. Cheap and synchronous; the local surface
    /// is updated at once and the transport after the debounce interval.
    pub fn request_resize(&self, size: DisplaySize) {
        self.debouncer.request(size);
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Release every resource and stop the actor. Later calls on any handle
    /// return [`Error::SessionClosed`].
    pub async fn close(&self) -> Result<SessionSnapshot> {
        self.request(Command::Close).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)
    }
}

/// Configures and spawns a [`Session`].
pub struct SessionBuilder {
    id: SessionId,
    config: SessionConfig,
    transports: Arc<dyn TransportFactory>,
    proxies: Arc<dyn ProxyClientFactory>,
    prober: Arc<dyn ReachabilityProbe>,
    observer: Arc<dyn SessionObserver>,
    surface: Option<Arc<dyn DisplaySurface>>,
}

impl SessionBuilder {
    pub fn proxy_factory(mut self, proxies: Arc<dyn ProxyClientFactory>) -> Self {
        self.proxies = proxies;
        self
    }

    pub fn prober(mut self, prober: Arc<dyn ReachabilityProbe>) -> Self {
        self.prober = prober;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Local surface that receives every resize immediately.
    pub fn surface(mut self, surface: Arc<dyn DisplaySurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Validate the configuration and start the session actor in `Idle`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> Result<Session> {
        self.config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let resize_tx = internal_tx.clone();
        let debouncer = Arc::new(ResizeDebouncer::new(
            self.config.resize_debounce(),
            self.surface,
            move |size| {
                let _ = resize_tx.send(Internal::ApplyResize(size));
            },
        ));

        let actor = SessionActor::new(
            self.id,
            self.config,
            state_tx,
            internal_tx,
            Collaborators {
                transports: self.transports,
                proxies: self.proxies,
                prober: self.prober,
                observer: self.observer,
                debouncer: Arc::clone(&debouncer),
            },
        );
        tokio::spawn(actor.run(command_rx, internal_rx));
        debug!(session = %self.id, "session spawned");

        Ok(Session {
            id: self.id,
            commands: command_tx,
            state: state_rx,
            debouncer,
        })
    }
}
