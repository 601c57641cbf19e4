//! Loopback proxy tunnel.
//!
//! Transports only know how to dial `host:port`. To route one through an
//! upstream proxy, the session first opens a [`ProxyTunnel`]:
//!
//! 1. Connect through the proxy to the real target
//! 2. Bind an ephemeral port on 127.0.0.1 with a backlog of one
//! 3. Accept exactly one local connection (the transport's)
//! 4. Pump bytes both ways until either side closes, errors, or the tunnel
//!    is closed
//!
//! The transport is then pointed at the tunnel's local endpoint.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tether_core::config::ProxyConfig;
use tether_core::constants::RELAY_BUFFER_SIZE;
use tether_core::endpoint::Endpoint;
use tether_core::Result;

use crate::proxy::ProxyClientFactory;

/// A single-connection relay from a loopback port to a proxied target.
///
/// Closing is idempotent and also happens on drop.
pub struct ProxyTunnel {
    local: Endpoint,
    target: Endpoint,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl ProxyTunnel {
    /// Open a tunnel to `target` through `proxy`.
    ///
    /// Returns `Ok(None)` when the factory has no client for the proxy kind
    /// (including no proxy at all); the caller then dials `target` directly.
    pub async fn open(
        factory: &dyn ProxyClientFactory,
        proxy: &ProxyConfig,
        target: &Endpoint,
        connect_timeout: Duration,
    ) -> Result<Option<Self>> {
        proxy.validate()?;
        let Some(client) = factory.create(proxy) else {
            return Ok(None);
        };

        let upstream = client
            .connect(&target.host, target.port, connect_timeout)
            .await?;

        let socket = TcpSocket::new_v4()?;
        socket.bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
        let listener = socket.listen(1)?;
        let local = Endpoint::loopback(listener.local_addr()?.port());

        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump(listener, upstream, cancel.clone(), target.clone()));

        info!(%local, %target, proxy = %proxy.endpoint(), kind = %proxy.kind, "proxy tunnel open");
        Ok(Some(Self {
            local,
            target: target.clone(),
            cancel,
            pump,
        }))
    }

    /// Loopback endpoint the transport should dial.
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    pub fn target(&self) -> &Endpoint {
        &self.target
    }

    /// True once closed or once the relay has ended on its own.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.pump.is_finished()
    }

    /// Stop the relay and release the listener and both sockets.
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.pump.abort();
        debug!(local = %self.local, target = %self.target, "proxy tunnel closed");
    }
}

impl Drop for ProxyTunnel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolve the endpoint a transport should dial for `target`.
///
/// With a usable proxy client this opens a tunnel and returns its loopback
/// endpoint; otherwise `target` is returned unchanged.
pub async fn open_route(
    factory: &dyn ProxyClientFactory,
    proxy: &ProxyConfig,
    target: &Endpoint,
    connect_timeout: Duration,
) -> Result<(Endpoint, Option<ProxyTunnel>)> {
    match ProxyTunnel::open(factory, proxy, target, connect_timeout).await? {
        Some(tunnel) => Ok((tunnel.local_endpoint().clone(), Some(tunnel))),
        None => Ok((target.clone(), None)),
    }
}

async fn pump(
    listener: TcpListener,
    mut upstream: TcpStream,
    cancel: CancellationToken,
    target: Endpoint,
) {
    let accepted = tokio::select! {
        _ = cancel.cancelled() => return,
        accepted = listener.accept() => accepted,
    };
    // Exactly one local connection per tunnel.
    drop(listener);

    let (mut local, peer) = match accepted {
        Ok(conn) => conn,
        Err(e) => {
            debug!(%target, error = %e, "tunnel accept failed");
            return;
        }
    };
    let _ = local.set_nodelay(true);
    debug!(%peer, %target, "tunnel accepted local connection");

    let (mut local_read, mut local_write) = local.split();
    let (mut upstream_read, mut upstream_write) = upstream.split();

    tokio::select! {
        _ = cancel.cancelled() => {
            debug!(%target, "tunnel relay cancelled");
        }
        result = copy_one_way(&mut local_read, &mut upstream_write) => {
            debug!(%target, ?result, "tunnel local side finished");
        }
        result = copy_one_way(&mut upstream_read, &mut local_write) => {
            debug!(%target, ?result, "tunnel upstream side finished");
        }
    }
}

async fn copy_one_way<R, W>(reader: &mut R, writer: &mut W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            let _ = writer.shutdown().await;
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

// =============================================================================
// Tests
// =============================================================================
