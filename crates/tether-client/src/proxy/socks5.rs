//! SOCKS5 proxy client (RFC 1928, RFC 1929).

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use tether_core::Result;
use tether_core::endpoint::Endpoint;

use super::{ProxyClient, check_field_len, connect_to_proxy, handshake_error, with_deadline};

// SOCKS5 constants
const SOCKS_VERSION: u8 = 0x05;
const AUTH_NO_AUTH: u8 = 0x00;
const AUTH_USER_PASS: u8 = 0x02;
const AUTH_NO_ACCEPTABLE: u8 = 0xFF;
const USER_PASS_VERSION: u8 = 0x01;
const CMD_CONNECT: u8 = 0x01;
const ADDR_IPV4: u8 = 0x01;
const ADDR_DOMAIN: u8 = 0x03;
const ADDR_IPV6: u8 = 0x04;
const REPLY_SUCCESS: u8 = 0x00;

/// SOCKS5 client offering no-auth, plus username/password when configured.
pub struct Socks5Client {
    proxy: Endpoint,
    username: String,
    password: String,
}

impl Socks5Client {
    pub fn new(proxy: Endpoint, username: String, password: String) -> Self {
        Self {
            proxy,
            username,
            password,
        }
    }

    fn greeting(&self) -> Vec<u8> {
        if self.username.is_empty() {
            vec![SOCKS_VERSION, 1, AUTH_NO_AUTH]
        } else {
            vec![SOCKS_VERSION, 2, AUTH_NO_AUTH, AUTH_USER_PASS]
        }
    }

    fn auth_request(&self) -> Result<Vec<u8>> {
        let ulen = check_field_len("SOCKS5 username", &self.username)?;
        let plen = check_field_len("SOCKS5 password", &self.password)?;

        let mut request = vec![USER_PASS_VERSION, ulen];
        request.extend_from_slice(self.username.as_bytes());
        request.push(plen);
        request.extend_from_slice(self.password.as_bytes());
        Ok(request)
    }

    async fn authenticate(&self, stream: &mut TcpStream) -> Result<()> {
        let mut selection = [0u8; 2];
        stream.read_exact(&mut selection).await?;
        if selection[0] != SOCKS_VERSION {
            return Err(handshake_error("SOCKS5 proxy returned an invalid protocol version"));
        }

        match selection[1] {
            AUTH_NO_AUTH => Ok(()),
            AUTH_USER_PASS => {
                stream.write_all(&self.auth_request()?).await?;
                let mut reply = [0u8; 2];
                stream.read_exact(&mut reply).await?;
                if reply[1] != REPLY_SUCCESS {
                    return Err(handshake_error(
                        "SOCKS5 proxy username/password authentication failed",
                    ));
                }
                Ok(())
            }
            AUTH_NO_ACCEPTABLE => Err(handshake_error(
                "SOCKS5 proxy did not accept any authentication method",
            )),
            other => Err(handshake_error(format!(
                "SOCKS5 proxy selected unsupported auth method 0x{other:02X}"
            ))),
        }
    }
}

/// Build a CONNECT request for `host:port`.
fn connect_request(host: &str, port: u16) -> Result<Vec<u8>> {
    let mut request = vec![SOCKS_VERSION, CMD_CONNECT, 0x00];
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            request.push(ADDR_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            request.push(ADDR_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            let len = check_field_len("SOCKS5 destination host", host)?;
            request.push(ADDR_DOMAIN);
            request.push(len);
            request.extend_from_slice(host.as_bytes());
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    Ok(request)
}

/// Validate the CONNECT reply and consume the bound address.
async fn read_connect_reply(stream: &mut TcpStream) -> Result<()> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    if header[0] != SOCKS_VERSION {
        return Err(handshake_error(
            "SOCKS5 proxy returned an invalid protocol version for CONNECT response",
        ));
    }
    if header[1] != REPLY_SUCCESS {
        return Err(handshake_error(format!(
            "SOCKS5 proxy CONNECT failed with status 0x{:02X}",
            header[1]
        )));
    }

    let addr_len = match header[3] {
        ADDR_IPV4 => 4,
        ADDR_IPV6 => 16,
        ADDR_DOMAIN => stream.read_u8().await? as usize,
        other => {
            return Err(handshake_error(format!(
                "SOCKS5 proxy returned unsupported address type 0x{other:02X}"
            )));
        }
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await?;
    Ok(())
}

#[async_trait]
impl ProxyClient for Socks5Client {
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
        // Oversized fields are rejected before any socket is opened.
        let request = connect_request(host, port)?;
        if !self.username.is_empty() {
            self.auth_request()?;
        }

        with_deadline(timeout, async {
            let mut stream = connect_to_proxy(&self.proxy, timeout).await?;
            stream.write_all(&self.greeting()).await?;
            self.authenticate(&mut stream).await?;

            stream.write_all(&request).await?;
            read_connect_reply(&mut stream).await?;
            debug!(proxy = %self.proxy, host, port, "SOCKS5 CONNECT established");
            Ok(stream)
        })
        .await
    }
}
