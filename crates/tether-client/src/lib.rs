//! tether client library.
//!
//! This crate provides the client side of a self-healing remote session:
//! - Session controller actor with automatic reconnection
//! - Upstream proxy clients (HTTP CONNECT, SOCKS4/4a, SOCKS5)
//! - Loopback proxy tunnel for transports that only dial `host:port`
//! - Resize debouncing
//! - A raw TCP link transport

pub mod cli;
pub mod proxy;
pub mod resize;
pub mod session;
pub mod transport;
pub mod tunnel;

pub use cli::{Cli, CliLogFormat, CliProxyKind, Command};
pub use proxy::{
    DefaultProxyFactory, HttpConnectClient, ProxyClient, ProxyClientFactory, Socks4Client,
    Socks5Client,
};
pub use resize::ResizeDebouncer;
pub use session::{Session, SessionBuilder};
pub use transport::{TcpLinkFactory, TcpLinkTransport};
pub use tunnel::{ProxyTunnel, open_route};
