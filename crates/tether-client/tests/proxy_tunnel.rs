//! Proxy tunnel tests against stub proxies on loopback.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use tether_client::{DefaultProxyFactory, ProxyTunnel, Session, open_route};
use tether_core::config::{ProxyConfig, ProxyKind, SessionConfig};
use tether_core::endpoint::Endpoint;
use tether_core::session::{SessionId, SessionState};
use tether_core::transport::TransportFactory;
use tether_core::Error;
use tether_test_utils::{EchoServer, MockTransportFactory, ProxyRequest, ScriptedProbe, StubProxy};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn round_trip(tunnel: &ProxyTunnel, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(tunnel.local_endpoint().as_pair()).await.unwrap();
    stream.write_all(payload).await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    tokio::time::timeout(TIMEOUT, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    buf
}

#[tokio::test]
async fn http_connect_with_basic_auth() {
    let echo = EchoServer::start().await.unwrap();
    let proxy = StubProxy::http(Some(("alice", "s3cret"))).await.unwrap();
    let config = ProxyConfig::new(ProxyKind::Http, "127.0.0.1", proxy.port()).with_credentials("alice", "s3cret");

    let tunnel = ProxyTunnel::open(&DefaultProxyFactory, &config, &echo.endpoint(), TIMEOUT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tunnel.local_endpoint().host, "127.0.0.1");
    assert_ne!(tunnel.local_endpoint().port, echo.addr().port());

    assert_eq!(round_trip(&tunnel, b"GET / HTTP/1.0\r\n\r\n").await, b"GET / HTTP/1.0\r\n\r\n");
    assert_eq!(
        proxy.requests(),
        vec![ProxyRequest {
            target: echo.endpoint().to_string(),
            credentials: Some(("alice".into(), "s3cret".into())),
        }]
    );
}

#[tokio::test]
async fn http_connect_rejects_bad_credentials() {
    let echo = EchoServer::start().await.unwrap();
    let proxy = StubProxy::http(Some(("alice", "s3cret"))).await.unwrap();
    let config = ProxyConfig::new(ProxyKind::Http, "127.0.0.1", proxy.port()).with_credentials("alice", "wrong");

    let result = ProxyTunnel::open(&DefaultProxyFactory, &config, &echo.endpoint(), TIMEOUT).await;
    assert!(matches!(result, Err(Error::ProxyHandshake { .. })));
}

#[tokio::test]
async fn socks4a_resolves_host_name_at_proxy() {
    let echo = EchoServer::start().await.unwrap();
    let proxy = StubProxy::socks4().await.unwrap();
    let config = ProxyConfig::new(ProxyKind::Socks4, "127.0.0.1", proxy.port());
    let target = Endpoint::new("localhost", echo.addr().port());

    let tunnel = ProxyTunnel::open(&DefaultProxyFactory, &config, &target, TIMEOUT)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(round_trip(&tunnel, b"ping").await, b"ping");
    assert_eq!(proxy.requests()[0].target, format!("localhost:{}", echo.addr().port()));
}

#[tokio::test]
async fn socks5_with_username_password() {
    let echo = EchoServer::start().await.unwrap();
    let proxy = StubProxy::socks5(Some(("bob", "pw"))).await.unwrap();
    let config = ProxyConfig::new(ProxyKind::Socks5, "127.0.0.1", proxy.port()).with_credentials("bob", "pw");

    let tunnel = ProxyTunnel::open(&DefaultProxyFactory, &config, &echo.endpoint(), TIMEOUT)
        .await
        .unwrap()
        .unwrap();

    let payload: Vec<u8> = (0..=255u8).cycle().take(16 * 1024).collect();
    assert_eq!(round_trip(&tunnel, &payload).await, payload);
    assert_eq!(
        proxy.requests()[0].credentials,
        Some(("bob".to_string(), "pw".to_string()))
    );
}

#[tokio::test]
async fn socks5_rejects_bad_credentials() {
    let echo = EchoServer::start().await.unwrap();
    let proxy = StubProxy::socks5(Some(("bob", "pw"))).await.unwrap();
    let config = ProxyConfig::new(ProxyKind::Socks5, "127.0.0.1", proxy.port()).with_credentials("bob", "nope");

    let result = ProxyTunnel::open(&DefaultProxyFactory, &config, &echo.endpoint(), TIMEOUT).await;
    assert!(matches!(result, Err(Error::ProxyHandshake { .. })));
    assert!(proxy.requests().is_empty());
}

#[tokio::test]
async fn closed_tunnel_refuses_local_connections() {
    let echo = EchoServer::start().await.unwrap();
    let proxy = StubProxy::socks5(None).await.unwrap();
    let config = ProxyConfig::new(ProxyKind::Socks5, "127.0.0.1", proxy.port());

    let (local, tunnel) = open_route(&DefaultProxyFactory, &config, &echo.endpoint(), TIMEOUT)
        .await
        .unwrap();
    let tunnel = tunnel.unwrap();
    assert_eq!(&local, tunnel.local_endpoint());

    tunnel.close();
    assert!(tunnel.is_closed());
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(local.as_pair()).await.is_err());
}

#[tokio::test]
async fn session_dials_through_tunnel() {
    let echo = EchoServer::start().await.unwrap();
    let proxy = StubProxy::http(None).await.unwrap();
    let transports = MockTransportFactory::new();

    let mut config = SessionConfig::for_target(echo.endpoint());
    config.proxy = ProxyConfig::new(ProxyKind::Http, "127.0.0.1", proxy.port());
    let session = Session::builder(
        SessionId(3),
        config,
        Arc::new(transports.clone()) as Arc<dyn TransportFactory>,
    )
    .prober(Arc::new(ScriptedProbe::reachable()))
    .spawn()
    .unwrap();

    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    // The transport was pointed at the loopback end of the tunnel.
    let dialed = transports.endpoints();
    assert_eq!(dialed.len(), 1);
    assert_eq!(dialed[0].host, "127.0.0.1");
    assert_ne!(dialed[0], echo.endpoint());
    assert_eq!(proxy.requests()[0].target, echo.endpoint().to_string());

    let snapshot = session.snapshot().await.unwrap();
    assert!(snapshot.tunnel_open);

    let snapshot = session.close().await.unwrap();
    assert!(!snapshot.tunnel_open);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(dialed[0].as_pair()).await.is_err());
}

#[tokio::test]
async fn session_reports_proxy_failure() {
    let echo = EchoServer::start().await.unwrap();
    let proxy = StubProxy::http(Some(("alice", "s3cret"))).await.unwrap();
    let transports = MockTransportFactory::new();

    let mut config = SessionConfig::for_target(echo.endpoint());
    config.proxy = ProxyConfig::new(ProxyKind::Http, "127.0.0.1", proxy.port());
    let session = Session::builder(
        SessionId(4),
        config,
        Arc::new(transports.clone()) as Arc<dyn TransportFactory>,
    )
    .spawn()
    .unwrap();

    assert!(matches!(
        session.connect().await,
        Err(Error::ProxyHandshake { .. })
    ));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(transports.created(), 0);
}
