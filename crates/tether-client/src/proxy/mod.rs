//! Upstream proxy clients.
//!
//! A [`ProxyClient`] opens a TCP stream to a destination through an explicit
//! forward proxy. The stream returned by [`ProxyClient::connect`] is already
//! past the proxy handshake: bytes written to it reach the destination.
//!
//! Supported protocols:
//! - HTTP CONNECT with optional Basic authentication
//! - SOCKS4, with SOCKS4a for host names
//! - SOCKS5 (RFC 1928) with optional username/password (RFC 1929)

mod http;
mod socks4;
mod socks5;

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use tether_core::config::{ProxyConfig, ProxyKind};
use tether_core::endpoint::Endpoint;
use tether_core::{Error, Result};

pub use http::HttpConnectClient;
pub use socks4::Socks4Client;
pub use socks5::Socks5Client;

/// Opens streams to a destination through an upstream proxy.
#[async_trait]
pub trait ProxyClient: Send + Sync {
    /// Connect through the proxy to `host:port`.
    ///
    /// `timeout` bounds the whole operation, including the connect to the
    /// proxy itself and the handshake.
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<TcpStream>;
}

/// Builds a [`ProxyClient`] for a proxy configuration.
pub trait ProxyClientFactory: Send + Sync {
    /// Returns `None` for [`ProxyKind::None`] or an unsupported kind.
    fn create(&self, config: &ProxyConfig) -> Option<Box<dyn ProxyClient>>;
}

/// Factory for the built-in HTTP, SOCKS4 and SOCKS5 clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProxyFactory;

impl ProxyClientFactory for DefaultProxyFactory {
    fn create(&self, config: &ProxyConfig) -> Option<Box<dyn ProxyClient>> {
        let proxy = config.endpoint();
        let username = config.username.clone();
        let password = config.password.clone();
        match config.kind {
            ProxyKind::None => None,
            ProxyKind::Http => Some(Box::new(HttpConnectClient::new(proxy, username, password))),
            ProxyKind::Socks4 => Some(Box::new(Socks4Client::new(proxy, username))),
            ProxyKind::Socks5 => Some(Box::new(Socks5Client::new(proxy, username, password))),
        }
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Open the TCP connection to the proxy itself.
async fn connect_to_proxy(proxy: &Endpoint, timeout: Duration) -> Result<TcpStream> {
    proxy.validate().map_err(|e| Error::InvalidProxy {
        message: e.to_string(),
    })?;

    let stream = tokio::time::timeout(timeout, TcpStream::connect(proxy.as_pair()))
        .await
        .map_err(|_| {
            handshake_error(format!(
                "connect to proxy {proxy} timed out after {} ms",
                timeout.as_millis()
            ))
        })??;
    stream.set_nodelay(true)?;
    debug!(%proxy, "connected to proxy");
    Ok(stream)
}

/// Run a proxy handshake under `timeout`. An elapsed deadline is a failed
/// handshake.
async fn with_deadline<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, fut).await.map_err(|_| {
        handshake_error(format!(
            "proxy handshake timed out after {} ms",
            timeout.as_millis()
        ))
    })?
}

/// Length-prefixed protocol fields are limited to 255 bytes.
fn check_field_len(field: &str, value: &str) -> Result<u8> {
    u8::try_from(value.len()).map_err(|_| Error::InvalidProxy {
        message: format!("{field} is longer than 255 bytes"),
    })
}

fn handshake_error(message: impl Into<String>) -> Error {
    Error::ProxyHandshake {
        message: message.into(),
    }
}
