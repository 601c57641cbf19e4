//! Raw TCP link transport.
//!
//! Connect is a plain TCP connect, with no protocol handshake. Anything the
//! peer sends is drained and counted. The link reports `Disconnected` when
//! the peer closes or the socket fails. Useful for driving a session against
//! any TCP service and for exercising the session core end to end.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tether_core::constants::RELAY_BUFFER_SIZE;
use tether_core::endpoint::Endpoint;
use tether_core::transport::{
    DisconnectReason, DisplaySize, EventReceiver, EventSender, Transport, TransportEvent,
    TransportFactory,
};
use tether_core::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Single-use TCP link to one endpoint.
pub struct TcpLinkTransport {
    endpoint: Endpoint,
    events_tx: EventSender,
    events_rx: Mutex<Option<EventReceiver>>,
    cancel: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
    received: Arc<AtomicU64>,
}

impl TcpLinkTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            endpoint,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            cancel: CancellationToken::new(),
            reader: Mutex::new(None),
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bytes received from the peer so far.
    pub fn bytes_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for TcpLinkTransport {
    async fn connect(&self) -> Result<()> {
        let stream = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(Error::Cancelled { reason: "link disconnected while connecting".into() });
            }
            stream = TcpStream::connect(self.endpoint.as_pair()) => stream?,
        };
        stream.set_nodelay(true)?;
        info!(endpoint = %self.endpoint, "link connected");

        // The write half is kept alive by the reader task so the socket stays open.
        let (read_half, write_half) = stream.into_split();
        let task = tokio::spawn(drain(
            read_half,
            write_half,
            self.events_tx.clone(),
            self.cancel.clone(),
            Arc::clone(&self.received),
            self.endpoint.clone(),
        ));
        if let Some(old) = lock(&self.reader).replace(task) {
            old.abort();
        }
        let _ = self.events_tx.send(TransportEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) {
        self.cancel.cancel();
        debug!(endpoint = %self.endpoint, "link disconnect requested");
    }

    async fn resize(&self, size: DisplaySize) -> Result<()> {
        // A raw link has no display to renegotiate.
        debug!(endpoint = %self.endpoint, %size, "link ignoring resize");
        Ok(())
    }

    fn subscribe(&self) -> EventReceiver {
        match lock(&self.events_rx).take() {
            Some(rx) => rx,
            None => mpsc::unbounded_channel().1,
        }
    }
}

impl Drop for TcpLinkTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = lock(&self.reader).take() {
            task.abort();
        }
    }
}

async fn drain(
    mut reader: OwnedReadHalf,
    _writer: tokio::net::tcp::OwnedWriteHalf,
    events: EventSender,
    cancel: CancellationToken,
    received: Arc<AtomicU64>,
    endpoint: Endpoint,
) {
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => break DisconnectReason::Normal,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break DisconnectReason::Network("connection closed by peer".into()),
                Ok(n) => {
                    received.fetch_add(n as u64, Ordering::Relaxed);
                }
                Err(e) => break DisconnectReason::Network(e.to_string()),
            },
        }
    };
    info!(%endpoint, %reason, "link disconnected");
    let _ = events.send(TransportEvent::Disconnected(reason));
}

/// Factory creating a [`TcpLinkTransport`] per attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpLinkFactory;

impl TransportFactory for TcpLinkFactory {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn Transport> {
        Arc::new(TcpLinkTransport::new(endpoint.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_then_peer_close_reports_network_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let link = TcpLinkTransport::new(Endpoint::loopback(port));
        let mut events = link.subscribe();

        link.connect().await.unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();
        assert_eq!(events.recv().await, Some(TransportEvent::Connected));

        peer.write_all(b"banner").await.unwrap();
        drop(peer);

        match events.recv().await {
            Some(TransportEvent::Disconnected(DisconnectReason::Network(_))) => {}
            other => panic!("expected network drop, got {:?}", other),
        }
        assert_eq!(link.bytes_received(), 6);
    }

    #[tokio::test]
    async fn local_disconnect_is_normal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let link = TcpLinkTransport::new(Endpoint::loopback(port));
        let mut events = link.subscribe();

        link.connect().await.unwrap();
        let _peer = listener.accept().await.unwrap();
        assert_eq!(events.recv().await, Some(TransportEvent::Connected));

        link.disconnect().await;
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Disconnected(DisconnectReason::Normal))
        );
    }

    #[tokio::test]
    async fn refused_connect_errors() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let link = TcpLinkFactory.create(&Endpoint::loopback(port));
        assert!(matches!(link.connect().await, Err(Error::Io(_))));
    }
}
