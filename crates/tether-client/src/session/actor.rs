//! Session actor: the single writer of all session state.
//!
//! Every transition runs on this task. Slow work (probing, tunnel setup,
//! dialing, reconnect timers, transport teardown) runs on spawned tasks that
//! report back through the internal channel, tagged with the attempt
//! generation that started them. A message whose generation is not current
//! is dropped, so a superseded attempt can never touch the session.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use tether_core::config::SessionConfig;
use tether_core::constants::DISCONNECT_TIMEOUT;
use tether_core::dialer::dial_transport;
use tether_core::endpoint::Endpoint;
use tether_core::observer::SessionObserver;
use tether_core::probe::ReachabilityProbe;
use tether_core::session::{
    ExtendedReconnect, ReconnectBudget, SessionId, SessionSnapshot, SessionState,
};
use tether_core::transport::{
    DisconnectReason, DisplaySize, EventReceiver, Transport, TransportEvent, TransportFactory,
};
use tether_core::{Error, Result};

use crate::proxy::ProxyClientFactory;
use crate::resize::ResizeDebouncer;
use crate::tunnel::{ProxyTunnel, open_route};

/// Requests from [`Session`](super::Session) handles.
pub(super) enum Command {
    Connect(oneshot::Sender<Result<()>>),
    Disconnect(oneshot::Sender<Result<()>>),
    CancelReconnect(oneshot::Sender<Result<()>>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Close(oneshot::Sender<SessionSnapshot>),
}

/// Results of spawned work, reported back to the actor.
pub(super) enum Internal {
    PrecheckDone { generation: u64, reachable: bool },
    Prepared { generation: u64, result: Result<PreparedAttempt> },
    DialFinished { generation: u64, result: Result<()> },
    Transport { generation: u64, event: TransportEvent },
    Tick { generation: u64, ready: bool },
    ExtendedRetry { generation: u64 },
    DisconnectDone { generation: u64 },
    ApplyResize(DisplaySize),
}

/// A transport ready to dial, with its event stream and optional tunnel.
pub(super) struct PreparedAttempt {
    transport: Arc<dyn Transport>,
    events: EventReceiver,
    tunnel: Option<ProxyTunnel>,
}

/// Who started the outstanding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptKind {
    User,
    Automatic,
    ExtendedRetry,
}

/// Collaborators injected by the builder.
pub(super) struct Collaborators {
    pub transports: Arc<dyn TransportFactory>,
    pub proxies: Arc<dyn ProxyClientFactory>,
    pub prober: Arc<dyn ReachabilityProbe>,
    pub observer: Arc<dyn SessionObserver>,
    pub debouncer: Arc<ResizeDebouncer>,
}

pub(super) struct SessionActor {
    id: SessionId,
    config: SessionConfig,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    deps: Collaborators,

    generation: u64,
    attempt_kind: AttemptKind,
    transport: Option<Arc<dyn Transport>>,
    event_pump: Option<JoinHandle<()>>,
    tunnel: Option<ProxyTunnel>,
    attempt: Option<JoinHandle<()>>,
    teardown: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    extended_timer: Option<JoinHandle<()>>,

    budget: ReconnectBudget,
    extended: Option<ExtendedReconnect>,
    pending_connect: Option<oneshot::Sender<Result<()>>>,
    pending_disconnect: Option<oneshot::Sender<Result<()>>>,
    deferred_resize: Option<DisplaySize>,
    /// A drop reported by the transport before its dial returned.
    dropped_during_dial: Option<DisconnectReason>,
    last_reason: Option<DisconnectReason>,
    reconnect_count: u32,
    finished: bool,
}

impl SessionActor {
    pub(super) fn new(
        id: SessionId,
        config: SessionConfig,
        state_tx: watch::Sender<SessionState>,
        internal_tx: mpsc::UnboundedSender<Internal>,
        deps: Collaborators,
    ) -> Self {
        let budget = ReconnectBudget::new(config.reconnect_attempts);
        Self {
            id,
            config,
            state: SessionState::Idle,
            state_tx,
            internal_tx,
            deps,
            generation: 0,
            attempt_kind: AttemptKind::User,
            transport: None,
            event_pump: None,
            tunnel: None,
            attempt: None,
            teardown: None,
            reconnect_timer: None,
            extended_timer: None,
            budget,
            extended: None,
            pending_connect: None,
            pending_disconnect: None,
            deferred_resize: None,
            dropped_during_dial: None,
            last_reason: None,
            reconnect_count: 0,
            finished: false,
        }
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        debug!(session = %self.id, target = %self.config.target, "session actor started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        debug!(session = %self.id, "all session handles dropped");
                        self.shutdown().await;
                        break;
                    }
                },
                Some(message) = internal.recv() => self.handle_internal(message),
            }
        }
        debug!(session = %self.id, "session actor stopped");
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Returns false once the session is closed for good.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Connect(reply) => self.handle_connect(reply),
            Command::Disconnect(reply) => self.handle_disconnect(reply),
            Command::CancelReconnect(reply) => {
                let _ = reply.send(self.handle_cancel_reconnect());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Close(reply) => {
                self.shutdown().await;
                let _ = reply.send(self.snapshot());
                return false;
            }
        }
        true
    }

    fn handle_connect(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.state.is_attempt_in_flight() || self.attempt.is_some() {
            let _ = reply.send(Err(Error::ConnectInProgress));
            return;
        }
        if !self.state.accepts_user_connect() {
            let _ = reply.send(Err(Error::InvalidState {
                expected: "idle, reconnect-waiting or closed".into(),
                actual: self.state.to_string(),
            }));
            return;
        }

        if self.state == SessionState::ReconnectWaiting {
            info!(session = %self.id, "manual reconnect requested");
        }
        self.stop_timers();
        self.budget.reset();
        self.extended = None;
        self.pending_connect = Some(reply);
        self.start_attempt(AttemptKind::User);
    }

    fn handle_disconnect(&mut self, reply: oneshot::Sender<Result<()>>) {
        match self.state {
            SessionState::Idle | SessionState::Closed | SessionState::Disconnecting => {
                let _ = reply.send(Ok(()));
            }
            SessionState::Connected => {
                self.generation += 1;
                let generation = self.generation;
                self.stop_event_pump();
                self.extended = None;
                self.set_state(SessionState::Disconnecting);

                let transport = self.transport.take();
                let tx = self.internal_tx.clone();
                self.pending_disconnect = Some(reply);
                self.teardown = Some(tokio::spawn(async move {
                    if let Some(transport) = transport {
                        if tokio::time::timeout(DISCONNECT_TIMEOUT, transport.disconnect())
                            .await
                            .is_err()
                        {
                            warn!("transport disconnect timed out");
                        }
                    }
                    let _ = tx.send(Internal::DisconnectDone { generation });
                }));
            }
            SessionState::Probing
            | SessionState::Connecting
            | SessionState::ReconnectWaiting
            | SessionState::Reconnecting => {
                self.abandon_attempt();
                if let Some(pending) = self.pending_connect.take() {
                    let _ = pending.send(Err(Error::Cancelled {
                        reason: "disconnect requested".into(),
                    }));
                }
                self.set_state(SessionState::Idle);
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn handle_cancel_reconnect(&mut self) -> Result<()> {
        if !self.state.is_reconnect_pending() {
            return Err(Error::InvalidState {
                expected: "reconnect-waiting or reconnecting".into(),
                actual: self.state.to_string(),
            });
        }
        info!(session = %self.id, "reconnect cancelled by user");
        self.abandon_attempt();
        self.set_state(SessionState::Closed);
        let last = self.last_reason_text();
        self.deps.observer.closed(self.id, last.as_deref());
        Ok(())
    }

    // =========================================================================
    // Internal events
    // =========================================================================

    fn handle_internal(&mut self, message: Internal) {
        if self.finished {
            return;
        }
        match message {
            Internal::ApplyResize(size) => self.apply_resize(size),
            Internal::PrecheckDone {
                generation,
                reachable,
            } => {
                if generation != self.generation || self.state != SessionState::Probing {
                    return;
                }
                self.attempt = None;
                if reachable {
                    self.set_state(SessionState::Connecting);
                    self.spawn_prepare(generation);
                } else {
                    let endpoint = self.config.probe_endpoint();
                    self.fail_user_attempt(Error::Unreachable {
                        host: endpoint.host,
                        port: endpoint.port,
                    });
                }
            }
            Internal::Prepared { generation, result } => {
                if generation != self.generation {
                    trace!(session = %self.id, generation, "dropping stale prepared attempt");
                    return;
                }
                self.attempt = None;
                match result {
                    Ok(prepared) => self.install(generation, prepared),
                    Err(e) => self.attempt_failed(e),
                }
            }
            Internal::DialFinished { generation, result } => {
                if generation != self.generation || self.attempt.is_none() {
                    return;
                }
                self.attempt = None;
                let dropped = self.dropped_during_dial.take();
                match result {
                    Ok(()) => {
                        self.on_connected();
                        if let Some(reason) = dropped {
                            self.on_dropped(reason);
                        }
                    }
                    Err(e) => self.attempt_failed(e),
                }
            }
            Internal::Transport { generation, event } => {
                if generation != self.generation {
                    trace!(session = %self.id, generation, ?event, "dropping stale transport event");
                    return;
                }
                self.on_transport_event(event);
            }
            Internal::Tick { generation, ready } => {
                if generation != self.generation || self.state != SessionState::ReconnectWaiting {
                    return;
                }
                self.on_tick(ready);
            }
            Internal::ExtendedRetry { generation } => {
                if generation != self.generation || self.state != SessionState::Reconnecting {
                    return;
                }
                self.extended_timer = None;
                if let Some(transport) = self.transport.clone() {
                    debug!(session = %self.id, "re-driving transport connect");
                    self.spawn_dial(generation, transport);
                }
            }
            Internal::DisconnectDone { generation } => {
                if generation != self.generation {
                    return;
                }
                self.teardown = None;
                self.tunnel = None;
                self.set_state(SessionState::Idle);
                if let Some(reply) = self.pending_disconnect.take() {
                    let _ = reply.send(Ok(()));
                }
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                // The transport's own reconnect succeeded while we waited to re-drive it.
                if self.state == SessionState::Reconnecting
                    && self.extended.is_some()
                    && self.attempt.is_none()
                {
                    info!(session = %self.id, "transport reconnected on its own");
                    self.on_connected();
                }
            }
            TransportEvent::Disconnected(reason) => {
                // Held until the dial returns: a success is followed by the drop.
                if self.attempt.is_some() {
                    debug!(session = %self.id, %reason, "transport dropped before dial returned");
                    self.dropped_during_dial = Some(reason);
                    return;
                }
                if self.state != SessionState::Connected {
                    debug!(session = %self.id, %reason, state = %self.state, "ignoring disconnect event");
                    return;
                }
                self.on_dropped(reason);
            }
        }
    }

    fn on_dropped(&mut self, reason: DisconnectReason) {
        warn!(session = %self.id, %reason, "transport disconnected");
        self.last_reason = Some(reason.clone());

        if reason.is_deliberate() {
            self.teardown_transport();
            self.extended = None;
            self.set_state(SessionState::Idle);
            self.deps
                .observer
                .info(self.id, &format!("disconnected: {reason}"));
            return;
        }

        if self.extended.is_some() {
            self.on_batch_exhausted();
            return;
        }

        self.teardown_transport();
        if !self.config.reconnect_on_disconnect {
            self.set_state(SessionState::Closed);
            self.deps
                .observer
                .closed(self.id, Some(reason.to_string().as_str()));
            return;
        }

        self.deps
            .observer
            .info(self.id, &format!("connection lost ({reason}), waiting to reconnect"));
        self.enter_reconnect_waiting();
    }

    fn on_tick(&mut self, ready: bool) {
        self.deps.observer.reconnect_pending(self.id, ready);
        if !ready {
            trace!(session = %self.id, "endpoint not reachable yet");
            return;
        }

        self.stop_reconnect_timer();
        if !self.budget.try_consume() {
            self.close_exhausted(self.budget.configured());
            return;
        }
        info!(
            session = %self.id,
            remaining = self.budget.remaining(),
            "endpoint reachable, reconnecting"
        );
        self.start_attempt(AttemptKind::Automatic);
    }

    // =========================================================================
    // Attempts
    // =========================================================================

    fn start_attempt(&mut self, kind: AttemptKind) {
        self.teardown_transport();
        self.generation += 1;
        let generation = self.generation;
        self.attempt_kind = kind;

        match (kind, self.config.precheck_timeout()) {
            (AttemptKind::User, Some(timeout)) => {
                self.set_state(SessionState::Probing);
                let prober = Arc::clone(&self.deps.prober);
                let endpoint = self.config.probe_endpoint();
                let tx = self.internal_tx.clone();
                self.attempt = Some(tokio::spawn(async move {
                    let reachable = prober.is_reachable(&endpoint, timeout).await;
                    let _ = tx.send(Internal::PrecheckDone {
                        generation,
                        reachable,
                    });
                }));
            }
            _ => {
                let state = if kind == AttemptKind::User {
                    SessionState::Connecting
                } else {
                    SessionState::Reconnecting
                };
                self.set_state(state);
                self.spawn_prepare(generation);
            }
        }
    }

    fn spawn_prepare(&mut self, generation: u64) {
        let transports = Arc::clone(&self.deps.transports);
        let proxies = Arc::clone(&self.deps.proxies);
        let config = self.config.clone();
        let tx = self.internal_tx.clone();
        self.attempt = Some(tokio::spawn(async move {
            let result = prepare_attempt(&*transports, &*proxies, &config).await;
            let _ = tx.send(Internal::Prepared { generation, result });
        }));
    }

    fn install(&mut self, generation: u64, prepared: PreparedAttempt) {
        let PreparedAttempt {
            transport,
            events,
            tunnel,
        } = prepared;

        // The previous transport's pump is gone before this one starts.
        self.stop_event_pump();
        self.tunnel = tunnel;
        self.event_pump = Some(spawn_event_pump(events, generation, self.internal_tx.clone()));
        self.transport = Some(Arc::clone(&transport));
        self.spawn_dial(generation, transport);
    }

    fn spawn_dial(&mut self, generation: u64, transport: Arc<dyn Transport>) {
        let target = self.config.target.clone();
        let timeout = self.config.connect_timeout();
        let tx = self.internal_tx.clone();
        self.attempt = Some(tokio::spawn(async move {
            let result = dial_transport(transport, &target, timeout).await;
            let _ = tx.send(Internal::DialFinished { generation, result });
        }));
    }

    fn on_connected(&mut self) {
        let kind = self.attempt_kind;
        if kind != AttemptKind::User {
            self.reconnect_count += 1;
        }
        self.stop_timers();

        if let Some(transport) = &self.transport {
            if let Some(ceiling) = transport.reconnect_ceiling() {
                let (extended, first) = ExtendedReconnect::arm(self.config.reconnect_attempts, ceiling);
                transport.set_reconnect_attempts(first);
                debug!(
                    session = %self.id,
                    ceiling,
                    armed = first,
                    extended = extended.remaining(),
                    "armed transport reconnect counter"
                );
                self.extended = Some(extended);
            }
        }

        self.set_state(SessionState::Connected);
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Ok(()));
        }
        if kind != AttemptKind::User {
            self.deps.observer.info(self.id, "reconnected");
        }
        if let Some(size) = self.deferred_resize.take() {
            self.apply_resize(size);
        }
    }

    fn attempt_failed(&mut self, error: Error) {
        match self.attempt_kind {
            AttemptKind::User => self.fail_user_attempt(error),
            AttemptKind::Automatic => {
                warn!(session = %self.id, error = %error, "reconnect attempt failed");
                self.last_reason = Some(DisconnectReason::DialFailed(error.to_string()));
                self.deps
                    .observer
                    .info(self.id, &format!("reconnect attempt failed: {error}"));
                self.teardown_transport();
                self.enter_reconnect_waiting();
            }
            AttemptKind::ExtendedRetry => {
                warn!(session = %self.id, error = %error, "transport re-drive failed");
                self.last_reason = Some(DisconnectReason::DialFailed(error.to_string()));
                self.on_batch_exhausted();
            }
        }
    }

    fn fail_user_attempt(&mut self, error: Error) {
        warn!(session = %self.id, error = %error, "connect failed");
        self.teardown_transport();
        self.set_state(SessionState::Idle);
        self.deps.observer.error(self.id, &error);
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(error));
        }
    }

    // =========================================================================
    // Reconnection
    // =========================================================================

    fn enter_reconnect_waiting(&mut self) {
        if self.budget.is_exhausted() {
            self.close_exhausted(self.budget.configured());
            return;
        }
        self.set_state(SessionState::ReconnectWaiting);
        self.start_reconnect_timer();
    }

    fn start_reconnect_timer(&mut self) {
        self.stop_reconnect_timer();
        let prober = Arc::clone(&self.deps.prober);
        let endpoint = self.config.probe_endpoint();
        let tick = self.config.reconnect_tick();
        let probe_timeout = self.config.probe_timeout();
        let generation = self.generation;
        let tx = self.internal_tx.clone();

        debug!(session = %self.id, %endpoint, tick_ms = tick.as_millis() as u64, "reconnect timer started");
        self.reconnect_timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let ready = prober.is_reachable(&endpoint, probe_timeout).await;
                if tx.send(Internal::Tick { generation, ready }).is_err() {
                    break;
                }
            }
        }));
    }

    /// The transport used up its internal attempts: hand it the next batch
    /// or give up.
    fn on_batch_exhausted(&mut self) {
        let next = self
            .extended
            .as_mut()
            .and_then(|ext| ext.next_batch().map(|batch| (batch, ext.remaining())));

        let Some((batch, remaining)) = next else {
            self.close_exhausted(self.config.reconnect_attempts);
            return;
        };

        if let Some(transport) = &self.transport {
            transport.set_reconnect_attempts(batch);
        }
        info!(session = %self.id, batch, remaining, "transport reconnect exhausted, re-arming");
        self.deps.observer.info(
            self.id,
            &format!("Auto-reconnect exhausted. Retrying... ({remaining} extended attempts remaining)"),
        );
        self.attempt_kind = AttemptKind::ExtendedRetry;
        self.set_state(SessionState::Reconnecting);

        let generation = self.generation;
        let delay = self.config.extended_retry_delay();
        let tx = self.internal_tx.clone();
        self.extended_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::ExtendedRetry { generation });
        }));
    }

    fn close_exhausted(&mut self, attempts: u32) {
        self.abandon_attempt();
        let last = self.last_reason_text();
        let error = Error::BudgetExhausted {
            attempts,
            last_reason: last.clone(),
        };
        warn!(session = %self.id, attempts, reason = ?last, "giving up on reconnection");
        self.set_state(SessionState::Closed);
        self.deps.observer.error(self.id, &error);
        self.deps.observer.closed(self.id, last.as_deref());
    }

    // =========================================================================
    // Resize
    // =========================================================================

    fn apply_resize(&mut self, size: DisplaySize) {
        match (&self.transport, self.state) {
            (Some(transport), SessionState::Connected) => {
                let transport = Arc::clone(transport);
                let id = self.id;
                tokio::spawn(async move {
                    if let Err(e) = transport.resize(size).await {
                        warn!(session = %id, %size, error = %e, "resize failed");
                    }
                });
            }
            _ => {
                debug!(session = %self.id, %size, state = %self.state, "deferring resize until connected");
                self.deferred_resize = Some(size);
            }
        }
    }

    // =========================================================================
    // Resource management
    // =========================================================================

    fn set_state(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        self.state_tx.send_replace(to);
        debug!(session = %self.id, %from, %to, "state transition");
        self.deps.observer.state_changed(self.id, from, to);
    }

    fn stop_reconnect_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    fn stop_timers(&mut self) {
        self.stop_reconnect_timer();
        if let Some(timer) = self.extended_timer.take() {
            timer.abort();
        }
    }

    fn stop_event_pump(&mut self) {
        if let Some(pump) = self.event_pump.take() {
            pump.abort();
        }
    }

    /// Unsubscribe from the current transport, disconnect it in the
    /// background and close its tunnel.
    fn teardown_transport(&mut self) {
        self.stop_event_pump();
        self.dropped_during_dial = None;
        if let Some(transport) = self.transport.take() {
            tokio::spawn(async move {
                let _ = tokio::time::timeout(DISCONNECT_TIMEOUT, transport.disconnect()).await;
            });
        }
        if let Some(tunnel) = self.tunnel.take() {
            tunnel.close();
        }
    }

    /// Stop everything in flight and invalidate its pending results.
    fn abandon_attempt(&mut self) {
        self.generation += 1;
        self.stop_timers();
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        self.teardown_transport();
        self.extended = None;
    }

    async fn shutdown(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.generation += 1;
        self.stop_timers();
        self.stop_event_pump();
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        if let Some(teardown) = self.teardown.take() {
            teardown.abort();
        }
        self.deps.debouncer.shutdown();

        if let Some(transport) = self.transport.take() {
            if tokio::time::timeout(DISCONNECT_TIMEOUT, transport.disconnect())
                .await
                .is_err()
            {
                warn!(session = %self.id, "transport disconnect timed out during close");
            }
        }
        if let Some(tunnel) = self.tunnel.take() {
            tunnel.close();
        }
        self.extended = None;

        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(Error::SessionClosed));
        }
        if let Some(reply) = self.pending_disconnect.take() {
            let _ = reply.send(Ok(()));
        }

        let was = self.state;
        self.set_state(SessionState::Closed);
        if was != SessionState::Closed {
            let last = self.last_reason_text();
            self.deps.observer.closed(self.id, last.as_deref());
        }
        info!(session = %self.id, "session closed");
    }

    fn last_reason_text(&self) -> Option<String> {
        self.last_reason.as_ref().map(ToString::to_string)
    }

    pub(super) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            reconnect_budget: self.budget.remaining(),
            reconnect_timer_active: self.reconnect_timer.is_some() || self.extended_timer.is_some(),
            attempt_in_flight: self.attempt.is_some(),
            tunnel_open: self.tunnel.as_ref().is_some_and(|t| !t.is_closed()),
            resize_pending: self.deps.debouncer.is_pending(),
            reconnect_count: self.reconnect_count,
            last_disconnect: self.last_reason_text(),
        }
    }
}

/// Resolve the dial endpoint (opening a tunnel if needed) and create the
/// transport for one attempt.
async fn prepare_attempt(
    transports: &dyn TransportFactory,
    proxies: &dyn ProxyClientFactory,
    config: &SessionConfig,
) -> Result<PreparedAttempt> {
    let (endpoint, tunnel): (Endpoint, Option<ProxyTunnel>) =
        open_route(proxies, &config.proxy, &config.target, config.connect_timeout()).await?;
    let transport = transports.create(&endpoint);
    let events = transport.subscribe();
    Ok(PreparedAttempt {
        transport,
        events,
        tunnel,
    })
}

fn spawn_event_pump(
    mut events: EventReceiver,
    generation: u64,
    tx: mpsc::UnboundedSender<Internal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if tx.send(Internal::Transport { generation, event }).is_err() {
                break;
            }
        }
    })
}
