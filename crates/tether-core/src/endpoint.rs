//! Network endpoint (`host:port`) used for targets, proxies and probes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A host name or address plus a TCP port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Loopback endpoint on the given port.
    pub fn loopback(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    /// Check the endpoint can be dialed at all.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("endpoint host is empty"));
        }
        if self.port == 0 {
            return Err(Error::config(format!("endpoint {} has port 0", self.host)));
        }
        Ok(())
    }

    /// Address pair accepted by `TcpStream::connect`.
    pub fn as_pair(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    /// Parse `host:port` or `[v6addr]:port`.
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| Error::config(format!("unterminated IPv6 literal in {s:?}")))?;
            let port = tail
                .strip_prefix(':')
                .ok_or_else(|| Error::config(format!("missing port in {s:?}")))?;
            (host, port)
        } else {
            s.rsplit_once(':')
                .ok_or_else(|| Error::config(format!("missing port in {s:?}")))?
        };

        let port: u16 = port
            .parse()
            .map_err(|_| Error::config(format!("invalid port in {s:?}")))?;
        let endpoint = Endpoint::new(host, port);
        endpoint.validate()?;
        Ok(endpoint)
    }
}
