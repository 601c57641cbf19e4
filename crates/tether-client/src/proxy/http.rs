//! HTTP CONNECT proxy client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use tether_core::Result;
use tether_core::constants::MAX_PROXY_RESPONSE;
use tether_core::endpoint::Endpoint;

use super::{ProxyClient, connect_to_proxy, handshake_error, with_deadline};

/// Tunnels through an HTTP proxy with `CONNECT host:port HTTP/1.1`.
pub struct HttpConnectClient {
    proxy: Endpoint,
    username: String,
    password: String,
}

impl HttpConnectClient {
    pub fn new(proxy: Endpoint, username: String, password: String) -> Self {
        Self {
            proxy,
            username,
            password,
        }
    }

    fn request(&self, host: &str, port: u16) -> String {
        let destination = Endpoint::new(host, port).to_string();
        let mut request = format!(
            "CONNECT {destination} HTTP/1.1\r\nHost: {destination}\r\nProxy-Connection: Keep-Alive\r\n"
        );
        if !self.username.is_empty() {
            let credentials = BASE64.encode(format!("{}:{}", self.username, self.password));
            request.push_str(&format!("Proxy-Authorization: Basic {credentials}\r\n"));
        }
        request.push_str("\r\n");
        request
    }
}

/// Read the response head byte by byte so nothing past `\r\n\r\n` is consumed.
async fn read_response_head(stream: &mut TcpStream) -> Result<String> {
    let mut head = Vec::with_capacity(256);
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_PROXY_RESPONSE {
            return Err(handshake_error(format!(
                "HTTP proxy response header exceeds {MAX_PROXY_RESPONSE} bytes"
            )));
        }
        match stream.read_u8().await {
            Ok(byte) => head.push(byte),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(handshake_error("HTTP proxy closed the connection during CONNECT"));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

fn check_status(head: &str) -> Result<()> {
    let status_line = head.lines().next().unwrap_or_default();
    match status_line.split_whitespace().nth(1) {
        Some("200") => Ok(()),
        _ => Err(handshake_error(format!(
            "HTTP proxy CONNECT failed: {status_line}"
        ))),
    }
}

#[async_trait]
impl ProxyClient for HttpConnectClient {
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
        with_deadline(timeout, async {
            let mut stream = connect_to_proxy(&self.proxy, timeout).await?;
            stream.write_all(self.request(host, port).as_bytes()).await?;

            let head = read_response_head(&mut stream).await?;
            check_status(&head)?;
            debug!(proxy = %self.proxy, host, port, "HTTP CONNECT established");
            Ok(stream)
        })
        .await
    }
}
