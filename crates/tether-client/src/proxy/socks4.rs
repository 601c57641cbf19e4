//! SOCKS4 / SOCKS4a proxy client.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use tether_core::Result;
use tether_core::endpoint::Endpoint;

use super::{ProxyClient, connect_to_proxy, handshake_error, with_deadline};

const SOCKS4_VERSION: u8 = 0x04;
const CMD_CONNECT: u8 = 0x01;
const REPLY_GRANTED: u8 = 0x5A;

/// SOCKS4 client. Host names are sent with the SOCKS4a extension.
pub struct Socks4Client {
    proxy: Endpoint,
    user_id: String,
}

impl Socks4Client {
    pub fn new(proxy: Endpoint, user_id: String) -> Self {
        Self { proxy, user_id }
    }

    fn request(&self, host: &str, port: u16) -> Vec<u8> {
        let ipv4 = host.parse::<Ipv4Addr>().ok();

        let mut request = vec![SOCKS4_VERSION, CMD_CONNECT];
        request.extend_from_slice(&port.to_be_bytes());
        match ipv4 {
            Some(ip) => request.extend_from_slice(&ip.octets()),
            // SOCKS4a: 0.0.0.1 marks a host name following the user id
            None => request.extend_from_slice(&[0, 0, 0, 1]),
        }
        request.extend_from_slice(self.user_id.as_bytes());
        request.push(0);
        if ipv4.is_none() {
            request.extend_from_slice(host.as_bytes());
            request.push(0);
        }
        request
    }
}

#[async_trait]
impl ProxyClient for Socks4Client {
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
        with_deadline(timeout, async {
            let mut stream = connect_to_proxy(&self.proxy, timeout).await?;
            stream.write_all(&self.request(host, port)).await?;

            let mut reply = [0u8; 8];
            stream.read_exact(&mut reply).await?;
            if reply[1] != REPLY_GRANTED {
                return Err(handshake_error(format!(
                    "SOCKS4 proxy CONNECT failed with status 0x{:02X}",
                    reply[1]
                )));
            }
            debug!(proxy = %self.proxy, host, port, "SOCKS4 CONNECT established");
            Ok(stream)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_request() {
        let client = Socks4Client::new(Endpoint::new("proxy", 1080), "bob".into());
        assert_eq!(
            client.request("10.0.0.5", 3389),
            vec![0x04, 0x01, 0x0D, 0x3D, 10, 0, 0, 5, b'b', b'o', b'b', 0]
        );
    }

    #[test]
    fn hostname_uses_socks4a() {
        let client = Socks4Client::new(Endpoint::new("proxy", 1080), String::new());
        assert_eq!(
            client.request("rdp.lan", 80),
            vec![0x04, 0x01, 0x00, 0x50, 0, 0, 0, 1, 0, b'r', b'd', b'p', b'.', b'l', b'a', b'n', 0]
        );
    }
}
