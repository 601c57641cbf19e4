//! End-to-end session lifecycle tests against scripted transports.
//!
//! All tests run on a paused clock, so reconnect ticks and debounce periods
//! elapse instantly.

use std::sync::Arc;
use std::time::Duration;

use tether_client::Session;
use tether_core::config::SessionConfig;
use tether_core::endpoint::Endpoint;
use tether_core::observer::{DisplaySurface, SessionObserver};
use tether_core::probe::ReachabilityProbe;
use tether_core::session::{SessionId, SessionState};
use tether_core::transport::{DisconnectReason, DisplaySize, TransportFactory};
use tether_core::Error;
use tether_test_utils::{
    ConnectOutcome, MockTransportFactory, ObservedEvent, RecordingObserver, RecordingSurface,
    ScriptedProbe,
};

struct Harness {
    session: Session,
    transports: MockTransportFactory,
    probe: Arc<ScriptedProbe>,
    observer: Arc<RecordingObserver>,
}

fn config() -> SessionConfig {
    SessionConfig::for_target(Endpoint::new("10.0.0.5", 3389))
}

fn start(config: SessionConfig, transports: MockTransportFactory, probe: ScriptedProbe) -> Harness {
    let probe = Arc::new(probe);
    let observer = Arc::new(RecordingObserver::new());
    let session = Session::builder(
        SessionId(7),
        config,
        Arc::new(transports.clone()) as Arc<dyn TransportFactory>,
    )
    .prober(probe.clone() as Arc<dyn ReachabilityProbe>)
    .observer(observer.clone() as Arc<dyn SessionObserver>)
    .spawn()
    .unwrap();

    Harness {
        session,
        transports,
        probe,
        observer,
    }
}

async fn wait_for(session: &Session, state: SessionState) {
    tokio::time::timeout(Duration::from_secs(120), session.wait_for_state(state))
        .await
        .unwrap_or_else(|_| panic!("session never reached {state}"))
        .unwrap();
}

fn network_drop() -> DisconnectReason {
    DisconnectReason::Network("connection reset".into())
}

// =============================================================================
// Connect / disconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn connect_then_user_disconnect_returns_to_idle() {
    let h = start(config(), MockTransportFactory::new(), ScriptedProbe::reachable());

    h.session.connect().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Connected);
    assert_eq!(h.transports.endpoints(), vec![Endpoint::new("10.0.0.5", 3389)]);

    h.session.disconnect().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.transports.disconnect_calls() >= 1);

    // A user disconnect never schedules a reconnect.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.probe.calls(), 0);
    assert_eq!(
        h.observer.states(),
        vec![
            SessionState::Connecting,
            SessionState::Connected,
            SessionState::Disconnecting,
            SessionState::Idle,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn connect_twice_while_connected_is_invalid() {
    let h = start(config(), MockTransportFactory::new(), ScriptedProbe::reachable());
    h.session.connect().await.unwrap();

    assert!(matches!(
        h.session.connect().await,
        Err(Error::InvalidState { .. })
    ));
    assert_eq!(h.transports.connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_user_connect_returns_to_idle() {
    let transports = MockTransportFactory::new();
    transports.push_outcomes([ConnectOutcome::Fail("handshake refused".into())]);
    let h = start(config(), transports, ScriptedProbe::reachable());

    let err = h.session.connect().await.unwrap_err();
    assert!(matches!(err, Error::TransportConnect { .. }));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.observer.errors().len(), 1);

    // A failed user attempt is not retried automatically.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.probe.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_dial_times_out() {
    let transports = MockTransportFactory::new();
    transports.push_outcomes([ConnectOutcome::Hang]);
    let mut cfg = config();
    cfg.connect_timeout_ms = 5_000;
    let h = start(cfg, transports, ScriptedProbe::reachable());

    let err = h.session.connect().await.unwrap_err();
    assert!(matches!(err, Error::DialTimeout { port: 3389, .. }), "got {err:?}");
    assert_eq!(h.session.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn second_connect_while_hanging_is_rejected() {
    let transports = MockTransportFactory::new();
    transports.push_outcomes([ConnectOutcome::Hang]);
    let h = start(config(), transports, ScriptedProbe::reachable());

    let first = {
        let session = h.session.clone();
        tokio::spawn(async move { session.connect().await })
    };
    wait_for(&h.session, SessionState::Connecting).await;

    assert!(matches!(
        h.session.connect().await,
        Err(Error::ConnectInProgress)
    ));

    // Disconnect abandons the hanging attempt and answers the first caller.
    h.session.disconnect().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(matches!(first.await.unwrap(), Err(Error::Cancelled { .. })));

    let snapshot = h.session.snapshot().await.unwrap();
    assert!(!snapshot.attempt_in_flight);
}

#[tokio::test(start_paused = true)]
async fn slow_connect_completes_after_rejecting_duplicate() {
    let transports = MockTransportFactory::new();
    transports.push_outcomes([ConnectOutcome::SucceedAfter(Duration::from_secs(3))]);
    let h = start(config(), transports, ScriptedProbe::reachable());

    let first = {
        let session = h.session.clone();
        tokio::spawn(async move { session.connect().await })
    };
    wait_for(&h.session, SessionState::Connecting).await;
    assert!(matches!(
        h.session.connect().await,
        Err(Error::ConnectInProgress)
    ));

    first.await.unwrap().unwrap();
    assert_eq!(h.session.state(), SessionState::Connected);
    assert_eq!(h.transports.connect_calls(), 1);
}

// =============================================================================
// Precheck
// =============================================================================

#[tokio::test(start_paused = true)]
async fn precheck_failure_is_unreachable() {
    let mut cfg = config();
    cfg.precheck_timeout_ms = Some(500);
    let h = start(cfg, MockTransportFactory::new(), ScriptedProbe::unreachable());

    let err = h.session.connect().await.unwrap_err();
    assert!(matches!(err, Error::Unreachable { ref host, port: 3389 } if host == "10.0.0.5"));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.transports.created(), 0);
    assert_eq!(
        h.observer.states(),
        vec![SessionState::Probing, SessionState::Idle]
    );
}

#[tokio::test(start_paused = true)]
async fn precheck_success_connects() {
    let mut cfg = config();
    cfg.precheck_timeout_ms = Some(500);
    let h = start(cfg, MockTransportFactory::new(), ScriptedProbe::reachable());

    h.session.connect().await.unwrap();
    assert_eq!(h.probe.calls(), 1);
    assert_eq!(
        h.observer.states(),
        vec![
            SessionState::Probing,
            SessionState::Connecting,
            SessionState::Connected,
        ]
    );
}

// =============================================================================
// Automatic reconnection
// =============================================================================

#[tokio::test(start_paused = true)]
async fn reconnects_once_endpoint_is_reachable_again() {
    let h = start(
        config(),
        MockTransportFactory::new(),
        ScriptedProbe::new([false, false, false, true], false),
    );
    h.session.connect().await.unwrap();

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::ReconnectWaiting).await;
    wait_for(&h.session, SessionState::Connected).await;

    assert_eq!(h.observer.pending_ticks(), vec![false, false, false, true]);
    assert_eq!(h.transports.connect_calls(), 2);
    assert_eq!(h.transports.created(), 2);
    assert!(h.probe.probed().iter().all(|e| *e == Endpoint::new("10.0.0.5", 3389)));
    assert_eq!(
        h.observer.states(),
        vec![
            SessionState::Connecting,
            SessionState::Connected,
            SessionState::ReconnectWaiting,
            SessionState::Reconnecting,
            SessionState::Connected,
        ]
    );

    let snapshot = h.session.snapshot().await.unwrap();
    assert_eq!(snapshot.reconnect_count, 1);
    // An automatic reconnect spends budget and does not restore it.
    assert_eq!(snapshot.reconnect_budget, 4);
    assert!(!snapshot.reconnect_timer_active);
    assert_eq!(
        snapshot.last_disconnect.as_deref(),
        Some("network error: connection reset")
    );

    // The scheduler stopped on reconnect.
    let calls = h.probe.calls();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(h.probe.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn repeated_drops_spend_budget_until_closed() {
    let mut cfg = config();
    cfg.reconnect_attempts = 2;
    let h = start(cfg, MockTransportFactory::new(), ScriptedProbe::reachable());
    h.session.connect().await.unwrap();

    for remaining in [1, 0] {
        h.transports.latest().unwrap().drop_connection(network_drop());
        tokio::time::sleep(Duration::from_secs(10)).await;
        let snapshot = h.session.snapshot().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Connected);
        assert_eq!(snapshot.reconnect_budget, remaining);
    }

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::Closed).await;

    assert_eq!(h.transports.connect_calls(), 3);
    assert!(h.observer.errors().last().unwrap().contains("exhausted after 2 attempts"));
    assert_eq!(
        h.observer.closures(),
        vec![Some("network error: connection reset".to_string())]
    );
    assert_eq!(h.session.snapshot().await.unwrap().reconnect_count, 2);

    // A manual connect restores the budget.
    h.session.connect().await.unwrap();
    assert_eq!(h.session.snapshot().await.unwrap().reconnect_budget, 2);
}

#[tokio::test(start_paused = true)]
async fn drop_reported_before_dial_returns_triggers_reconnect() {
    let transports = MockTransportFactory::new();
    transports.push_outcomes([ConnectOutcome::DropDuringConnect(DisconnectReason::Network(
        "eof".into(),
    ))]);
    let h = start(config(), transports, ScriptedProbe::reachable());

    // The dial itself succeeded, so the caller sees success.
    h.session.connect().await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = h.session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Connected);
    assert_eq!(snapshot.reconnect_count, 1);
    assert_eq!(snapshot.last_disconnect.as_deref(), Some("network error: eof"));
    assert_eq!(h.transports.created(), 2);
    assert_eq!(h.transports.connect_calls(), 2);
    assert!(!h.transports.nth(0).unwrap().is_connected());
    assert_eq!(
        h.observer.states(),
        vec![
            SessionState::Connecting,
            SessionState::Connected,
            SessionState::ReconnectWaiting,
            SessionState::Reconnecting,
            SessionState::Connected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn events_from_replaced_transport_are_ignored() {
    let h = start(config(), MockTransportFactory::new(), ScriptedProbe::reachable());
    h.session.connect().await.unwrap();

    h.transports.latest().unwrap().drop_connection(network_drop());
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.session.state(), SessionState::Connected);
    assert_eq!(h.transports.created(), 2);
    let states = h.observer.states().len();

    // The first transport keeps talking after it was replaced.
    let replaced = h.transports.nth(0).unwrap();
    replaced.drop_connection(DisconnectReason::Network("late reset".into()));
    replaced.drop_connection(DisconnectReason::UserLogoff);
    tokio::time::sleep(Duration::from_secs(10)).await;

    let snapshot = h.session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Connected);
    assert_eq!(snapshot.reconnect_count, 1);
    assert_eq!(
        snapshot.last_disconnect.as_deref(),
        Some("network error: connection reset")
    );
    assert_eq!(h.observer.states().len(), states);
    assert_eq!(h.transports.connect_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_reconnects_exhaust_budget_and_close() {
    let transports = MockTransportFactory::new();
    transports.push_outcomes([
        ConnectOutcome::Succeed,
        ConnectOutcome::Fail("refused".into()),
        ConnectOutcome::Fail("still refused".into()),
    ]);
    let mut cfg = config();
    cfg.reconnect_attempts = 2;
    let h = start(cfg, transports, ScriptedProbe::reachable());
    h.session.connect().await.unwrap();

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::Closed).await;

    assert_eq!(h.transports.connect_calls(), 3);
    let errors = h.observer.errors();
    assert!(errors.last().unwrap().contains("exhausted after 2 attempts"), "{errors:?}");
    let closures = h.observer.closures();
    assert_eq!(closures.len(), 1);
    assert!(closures[0].as_deref().unwrap().contains("still refused"));

    let snapshot = h.session.snapshot().await.unwrap();
    assert!(snapshot.is_quiescent());
    assert_eq!(snapshot.reconnect_budget, 0);
}

#[tokio::test(start_paused = true)]
async fn zero_budget_closes_on_first_drop() {
    let mut cfg = config();
    cfg.reconnect_attempts = 0;
    let h = start(cfg, MockTransportFactory::new(), ScriptedProbe::reachable());
    h.session.connect().await.unwrap();

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::Closed).await;
    assert_eq!(h.probe.calls(), 0);
    assert!(!h.observer.states().contains(&SessionState::ReconnectWaiting));
}

#[tokio::test(start_paused = true)]
async fn deliberate_disconnect_does_not_reconnect() {
    let h = start(config(), MockTransportFactory::new(), ScriptedProbe::reachable());
    h.session.connect().await.unwrap();

    h.transports
        .latest()
        .unwrap()
        .drop_connection(DisconnectReason::UserLogoff);
    wait_for(&h.session, SessionState::Idle).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.probe.calls(), 0);
    assert_eq!(h.transports.connect_calls(), 1);
    assert!(h.observer.closures().is_empty());
}

#[tokio::test(start_paused = true)]
async fn drop_without_auto_reconnect_closes() {
    let mut cfg = config();
    cfg.reconnect_on_disconnect = false;
    let h = start(cfg, MockTransportFactory::new(), ScriptedProbe::reachable());
    h.session.connect().await.unwrap();

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::Closed).await;
    assert_eq!(
        h.observer.closures(),
        vec![Some("network error: connection reset".to_string())]
    );
    assert_eq!(h.probe.calls(), 0);

    // Closed still accepts a manual connect.
    h.session.connect().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn cancel_reconnect_closes_then_manual_connect_works() {
    let h = start(config(), MockTransportFactory::new(), ScriptedProbe::unreachable());
    h.session.connect().await.unwrap();

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::ReconnectWaiting).await;

    h.session.cancel_reconnect().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Closed);
    let snapshot = h.session.snapshot().await.unwrap();
    assert!(!snapshot.reconnect_timer_active);
    assert!(matches!(
        h.session.cancel_reconnect().await,
        Err(Error::InvalidState { .. })
    ));

    let calls = h.probe.calls();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(h.probe.calls(), calls);

    h.session.connect().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn manual_connect_while_waiting_restores_budget() {
    let transports = MockTransportFactory::new();
    transports.push_outcomes([ConnectOutcome::Succeed, ConnectOutcome::Fail("refused".into())]);
    let mut cfg = config();
    cfg.reconnect_attempts = 3;
    let h = start(cfg, transports, ScriptedProbe::new([true], false));
    h.session.connect().await.unwrap();

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::ReconnectWaiting).await;
    // First tick succeeds, the dial fails and the session waits again.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(h.observer.states().contains(&SessionState::Reconnecting));
    let snapshot = h.session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::ReconnectWaiting);
    assert_eq!(snapshot.reconnect_budget, 2);

    h.session.connect().await.unwrap();
    let snapshot = h.session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Connected);
    assert_eq!(snapshot.reconnect_budget, 3);
    assert!(!snapshot.reconnect_timer_active);
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_waiting_goes_idle() {
    let h = start(config(), MockTransportFactory::new(), ScriptedProbe::unreachable());
    h.session.connect().await.unwrap();
    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::ReconnectWaiting).await;

    h.session.disconnect().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Idle);
    let snapshot = h.session.snapshot().await.unwrap();
    assert!(snapshot.is_quiescent());
}

// =============================================================================
// Extended reconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn extended_budget_rearms_in_batches_then_closes() {
    let transports = MockTransportFactory::with_reconnect_ceiling(20);
    transports.push_outcomes([
        ConnectOutcome::Succeed,
        ConnectOutcome::Fail("batch 2 failed".into()),
        ConnectOutcome::Fail("batch 3 failed".into()),
    ]);
    let mut cfg = config();
    cfg.reconnect_attempts = 45;
    let h = start(cfg, transports, ScriptedProbe::reachable());
    h.session.connect().await.unwrap();
    assert_eq!(h.transports.armed_attempts(), vec![20]);

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::Closed).await;

    assert_eq!(h.transports.armed_attempts(), vec![20, 20, 5]);
    // The same transport is re-driven; the probe scheduler is never used.
    assert_eq!(h.transports.created(), 1);
    assert_eq!(h.transports.connect_calls(), 3);
    assert_eq!(h.probe.calls(), 0);

    let infos: Vec<String> = h
        .observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ObservedEvent::Info(msg) if msg.starts_with("Auto-reconnect exhausted") => Some(msg),
            _ => None,
        })
        .collect();
    assert_eq!(
        infos,
        vec![
            "Auto-reconnect exhausted. Retrying... (5 extended attempts remaining)".to_string(),
            "Auto-reconnect exhausted. Retrying... (0 extended attempts remaining)".to_string(),
        ]
    );
    assert!(h.observer.errors().last().unwrap().contains("exhausted after 45 attempts"));
}

#[tokio::test(start_paused = true)]
async fn extended_retry_success_rearms_from_scratch() {
    let transports = MockTransportFactory::with_reconnect_ceiling(20);
    let mut cfg = config();
    cfg.reconnect_attempts = 30;
    let h = start(cfg, transports, ScriptedProbe::reachable());
    h.session.connect().await.unwrap();

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::Reconnecting).await;
    wait_for(&h.session, SessionState::Connected).await;

    assert_eq!(h.transports.armed_attempts(), vec![20, 10, 20]);
    assert_eq!(h.session.snapshot().await.unwrap().reconnect_count, 1);
}

#[tokio::test(start_paused = true)]
async fn ceiling_above_budget_arms_once() {
    let transports = MockTransportFactory::with_reconnect_ceiling(20);
    let mut cfg = config();
    cfg.reconnect_attempts = 5;
    let h = start(cfg, transports, ScriptedProbe::reachable());
    h.session.connect().await.unwrap();
    assert_eq!(h.transports.armed_attempts(), vec![5]);

    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::Closed).await;
    assert_eq!(h.transports.armed_attempts(), vec![5]);
    assert_eq!(h.transports.connect_calls(), 1);
}

// =============================================================================
// Resize
// =============================================================================

#[tokio::test(start_paused = true)]
async fn resize_burst_reaches_transport_once() {
    let transports = MockTransportFactory::new();
    let surface = Arc::new(RecordingSurface::new());
    let session = Session::builder(
        SessionId(1),
        config(),
        Arc::new(transports.clone()) as Arc<dyn TransportFactory>,
    )
    .prober(Arc::new(ScriptedProbe::reachable()))
    .surface(surface.clone() as Arc<dyn DisplaySurface>)
    .spawn()
    .unwrap();
    session.connect().await.unwrap();

    for width in [1024, 1100, 1200, 1280, 1366, 1440, 1600, 1920] {
        session.request_resize(DisplaySize::new(width, 1080));
        tokio::time::sleep(Duration::from_millis(40)).await;
    }
    assert!(transports.resizes().is_empty());
    assert_eq!(surface.layouts().len(), 8);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(transports.resizes(), vec![DisplaySize::new(1920, 1080)]);
}

#[tokio::test(start_paused = true)]
async fn resize_before_connect_is_applied_on_connect() {
    let transports = MockTransportFactory::new();
    let h = start(config(), transports, ScriptedProbe::reachable());

    h.session.request_resize(DisplaySize::new(1280, 800));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.transports.resizes().is_empty());

    h.session.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.transports.resizes(), vec![DisplaySize::new(1280, 800)]);
}

// =============================================================================
// Close
// =============================================================================

#[tokio::test(start_paused = true)]
async fn close_while_waiting_releases_everything() {
    let h = start(config(), MockTransportFactory::new(), ScriptedProbe::unreachable());
    h.session.connect().await.unwrap();
    h.transports.latest().unwrap().drop_connection(network_drop());
    wait_for(&h.session, SessionState::ReconnectWaiting).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    h.session.request_resize(DisplaySize::new(800, 600));
    let snapshot = h.session.close().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Closed);
    assert!(snapshot.is_quiescent(), "{snapshot:?}");
    assert_eq!(h.observer.closures().len(), 1);

    let calls = h.probe.calls();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.probe.calls(), calls);
    assert!(h.transports.resizes().is_empty());

    assert!(matches!(h.session.connect().await, Err(Error::SessionClosed)));
    assert!(matches!(h.session.close().await, Err(Error::SessionClosed)));
}

#[tokio::test(start_paused = true)]
async fn close_during_hanging_connect_answers_caller() {
    let transports = MockTransportFactory::new();
    transports.push_outcomes([ConnectOutcome::Hang]);
    let h = start(config(), transports, ScriptedProbe::reachable());

    let pending = {
        let session = h.session.clone();
        tokio::spawn(async move { session.connect().await })
    };
    wait_for(&h.session, SessionState::Connecting).await;

    let snapshot = h.session.close().await.unwrap();
    assert!(snapshot.is_quiescent());
    assert!(matches!(pending.await.unwrap(), Err(Error::SessionClosed)));
}

#[tokio::test(start_paused = true)]
async fn invalid_config_is_rejected_at_spawn() {
    let mut cfg = config();
    cfg.reconnect_tick_ms = 0;
    let result = Session::builder(
        SessionId(1),
        cfg,
        Arc::new(MockTransportFactory::new()) as Arc<dyn TransportFactory>,
    )
    .spawn();
    assert!(matches!(result, Err(Error::Config { .. })));
}
