//! Loopback servers for exercising real sockets in tests.
//!
//! - [`EchoServer`]: echoes every byte back
//! - [`StubProxy`]: minimal HTTP CONNECT, SOCKS4/4a and SOCKS5 proxies that
//!   record each request and then relay to the requested target

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

use tether_core::endpoint::Endpoint;
use tether_core::error::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn handshake_error(message: impl Into<String>) -> Error {
    Error::ProxyHandshake {
        message: message.into(),
    }
}

// =============================================================================
// Echo server
// =============================================================================

/// TCP server on 127.0.0.1 that echoes everything it receives.
pub struct EchoServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl EchoServer {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let (mut reader, mut writer) = stream.split();
                    let _ = tokio::io::copy(&mut reader, &mut writer).await;
                });
            }
        });
        Ok(Self { addr, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::loopback(self.addr.port())
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Stub proxies
// =============================================================================

/// What a stub proxy was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    /// Requested destination as `host:port`.
    pub target: String,
    /// Credentials presented by the client, if any.
    pub credentials: Option<(String, String)>,
}

#[derive(Debug, Clone, Copy)]
enum Flavor {
    Http,
    Socks4,
    Socks5,
}

type Credentials = Option<(String, String)>;

/// A single-purpose upstream proxy bound to 127.0.0.1.
pub struct StubProxy {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<ProxyRequest>>>,
    task: JoinHandle<()>,
}

impl StubProxy {
    /// HTTP CONNECT proxy. With `required_auth`, answers 407 to anything else.
    pub async fn http(required_auth: Option<(&str, &str)>) -> Result<Self> {
        Self::start(Flavor::Http, owned(required_auth)).await
    }

    /// SOCKS4 proxy with SOCKS4a host name support.
    pub async fn socks4() -> Result<Self> {
        Self::start(Flavor::Socks4, None).await
    }

    /// SOCKS5 proxy. With `required_auth`, only username/password is offered.
    pub async fn socks5(required_auth: Option<(&str, &str)>) -> Result<Self> {
        Self::start(Flavor::Socks5, owned(required_auth)).await
    }

    async fn start(flavor: Flavor, required_auth: Credentials) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let required_auth = required_auth.clone();
                tokio::spawn(async move {
                    let result = match flavor {
                        Flavor::Http => serve_http(stream, required_auth, log).await,
                        Flavor::Socks4 => serve_socks4(stream, log).await,
                        Flavor::Socks5 => serve_socks5(stream, required_auth, log).await,
                    };
                    if let Err(e) = result {
                        debug!(?flavor, error = %e, "stub proxy connection ended");
                    }
                });
            }
        });

        Ok(Self {
            addr,
            requests,
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Requests accepted so far, in order.
    pub fn requests(&self) -> Vec<ProxyRequest> {
        lock(&self.requests).clone()
    }
}

impl Drop for StubProxy {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn owned(auth: Option<(&str, &str)>) -> Credentials {
    auth.map(|(u, p)| (u.to_string(), p.to_string()))
}

async fn relay(mut client: TcpStream, target: &str) -> Result<()> {
    let mut upstream = TcpStream::connect(target).await?;
    tokio::io::copy_bidirectional(&mut client, &mut upstream).await?;
    Ok(())
}

async fn read_until_nul(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let byte = stream.read_u8().await?;
        if byte == 0 {
            return Ok(out);
        }
        out.push(byte);
    }
}

async fn serve_http(
    mut stream: TcpStream,
    required_auth: Credentials,
    log: Arc<Mutex<Vec<ProxyRequest>>>,
) -> Result<()> {
    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        head.push(stream.read_u8().await?);
    }
    let head = String::from_utf8_lossy(&head).into_owned();
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some("CONNECT"), Some(target)) = (parts.next(), parts.next()) else {
        stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n").await?;
        return Err(handshake_error(format!("unexpected request: {request_line}")));
    };
    let target = target.to_string();

    let credentials = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Proxy-Authorization"))
        .and_then(|(_, value)| value.trim().strip_prefix("Basic ").map(str::to_string))
        .and_then(|encoded| BASE64.decode(encoded).ok())
        .and_then(|raw| {
            let raw = String::from_utf8(raw).ok()?;
            let (user, pass) = raw.split_once(':')?;
            Some((user.to_string(), pass.to_string()))
        });

    if required_auth.is_some() && credentials != required_auth {
        stream
            .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
            .await?;
        return Err(handshake_error("bad proxy credentials"));
    }

    lock(&log).push(ProxyRequest {
        target: target.clone(),
        credentials,
    });
    stream
        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
        .await?;
    relay(stream, &target).await
}

async fn serve_socks4(mut stream: TcpStream, log: Arc<Mutex<Vec<ProxyRequest>>>) -> Result<()> {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).await?;
    if header[0] != 0x04 || header[1] != 0x01 {
        return Err(handshake_error("not a SOCKS4 CONNECT"));
    }
    let port = u16::from_be_bytes([header[2], header[3]]);
    let ip = Ipv4Addr::new(header[4], header[5], header[6], header[7]);
    let user = read_until_nul(&mut stream).await?;

    // 0.0.0.x with x != 0 marks a SOCKS4a host name after the user id.
    let host = if header[4..7] == [0, 0, 0] && header[7] != 0 {
        String::from_utf8_lossy(&read_until_nul(&mut stream).await?).into_owned()
    } else {
        ip.to_string()
    };
    let target = format!("{host}:{port}");

    lock(&log).push(ProxyRequest {
        target: target.clone(),
        credentials: (!user.is_empty())
            .then(|| (String::from_utf8_lossy(&user).into_owned(), String::new())),
    });
    stream
        .write_all(&[0x00, 0x5A, header[2], header[3], header[4], header[5], header[6], header[7]])
        .await?;
    relay(stream, &target).await
}

async fn serve_socks5(
    mut stream: TcpStream,
    required_auth: Credentials,
    log: Arc<Mutex<Vec<ProxyRequest>>>,
) -> Result<()> {
    let mut buf = [0u8; 258];
    stream.read_exact(&mut buf[..2]).await?;
    if buf[0] != 0x05 {
        return Err(handshake_error(format!("unsupported SOCKS version: {}", buf[0])));
    }
    let nmethods = buf[1] as usize;
    stream.read_exact(&mut buf[..nmethods]).await?;
    let offered = &buf[..nmethods];

    let mut credentials = None;
    if let Some(expected) = required_auth {
        if !offered.contains(&0x02) {
            stream.write_all(&[0x05, 0xFF]).await?;
            return Err(handshake_error("client did not offer username/password"));
        }
        stream.write_all(&[0x05, 0x02]).await?;

        // RFC 1929: VER ULEN UNAME PLEN PASSWD
        let version = stream.read_u8().await?;
        let ulen = stream.read_u8().await? as usize;
        let mut user = vec![0u8; ulen];
        stream.read_exact(&mut user).await?;
        let plen = stream.read_u8().await? as usize;
        let mut pass = vec![0u8; plen];
        stream.read_exact(&mut pass).await?;
        let presented = (
            String::from_utf8_lossy(&user).into_owned(),
            String::from_utf8_lossy(&pass).into_owned(),
        );
        if version != 0x01 || presented != expected {
            stream.write_all(&[0x01, 0x01]).await?;
            return Err(handshake_error("bad proxy credentials"));
        }
        stream.write_all(&[0x01, 0x00]).await?;
        credentials = Some(presented);
    } else if offered.contains(&0x00) {
        stream.write_all(&[0x05, 0x00]).await?;
    } else {
        stream.write_all(&[0x05, 0xFF]).await?;
        return Err(handshake_error("no acceptable authentication method"));
    }

    stream.read_exact(&mut buf[..4]).await?;
    if buf[0] != 0x05 || buf[1] != 0x01 {
        return Err(handshake_error("not a SOCKS5 CONNECT"));
    }
    let host = match buf[3] {
        0x01 => {
            let mut addr = [0u8; 4];
            stream.read_exact(&mut addr).await?;
            Ipv4Addr::from(addr).to_string()
        }
        0x04 => {
            let mut addr = [0u8; 16];
            stream.read_exact(&mut addr).await?;
            format!("[{}]", Ipv6Addr::from(addr))
        }
        0x03 => {
            let len = stream.read_u8().await? as usize;
            let mut name = vec![0u8; len];
            stream.read_exact(&mut name).await?;
            String::from_utf8_lossy(&name).into_owned()
        }
        other => return Err(handshake_error(format!("unsupported address type: {other}"))),
    };
    let port = stream.read_u16().await?;
    let target = format!("{host}:{port}");

    lock(&log).push(ProxyRequest {
        target: target.clone(),
        credentials,
    });
    // VER REP RSV ATYP BND.ADDR BND.PORT, bound to 0.0.0.0:0
    stream
        .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
        .await?;
    relay(stream, &target).await
}

// =============================================================================
// Tests
// =============================================================================
