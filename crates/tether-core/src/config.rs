//! Session configuration.
//!
//! The configuration surface consumed by a session: target, optional
//! upstream proxy, reconnect policy and timing knobs. Loadable from TOML:
//!
//! ```toml
//! reconnect_attempts = 45
//! resize_debounce_ms = 300
//!
//! [target]
//! host = "10.0.0.5"
//! port = 3389
//!
//! [proxy]
//! kind = "socks5"
//! host = "proxy.corp"
//! port = 1080
//! username = "alice"
//! password = "hunter2"
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CONNECT_TIMEOUT, DEFAULT_RECONNECT_ATTEMPTS, EXTENDED_RETRY_DELAY, MAX_RECONNECT_ATTEMPTS,
    PROBE_TIMEOUT, RECONNECT_TICK, RESIZE_DEBOUNCE,
};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// Upstream proxy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// Dial the target directly.
    #[default]
    None,
    /// HTTP CONNECT.
    Http,
    /// SOCKS4 (SOCKS4a for host names).
    Socks4,
    /// SOCKS5 (RFC 1928) with optional username/password.
    Socks5,
}

impl ProxyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::None => "none",
            ProxyKind::Http => "http",
            ProxyKind::Socks4 => "socks4",
            ProxyKind::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream proxy settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl ProxyConfig {
    /// No proxy: dial the target directly.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(kind: ProxyKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Whether connections are routed through a proxy.
    pub fn is_enabled(&self) -> bool {
        self.kind != ProxyKind::None
    }

    /// The proxy's own address.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Reject a proxy that cannot be dialed.
    pub fn validate(&self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        if self.host.trim().is_empty() {
            return Err(Error::InvalidProxy {
                message: format!("{} proxy has no host", self.kind),
            });
        }
        if self.port == 0 {
            return Err(Error::InvalidProxy {
                message: format!("{} proxy {} has port 0", self.kind, self.host),
            });
        }
        Ok(())
    }
}

/// Everything a session needs to connect and stay connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Remote endpoint the transport talks to.
    pub target: Endpoint,
    /// Optional upstream proxy.
    pub proxy: ProxyConfig,
    /// Enter the reconnect scheduler after an abnormal disconnect.
    pub reconnect_on_disconnect: bool,
    /// Desired total of automatic reconnect attempts.
    pub reconnect_attempts: u32,
    /// Interval between probes while waiting to reconnect.
    pub reconnect_tick_ms: u64,
    /// Timeout for one reachability probe.
    pub probe_timeout_ms: u64,
    /// Overall timeout for one transport connect.
    pub connect_timeout_ms: u64,
    /// Fail-fast probe before a user-initiated connect. Disabled when unset.
    pub precheck_timeout_ms: Option<u64>,
    /// Quiet period before forwarding a resize.
    pub resize_debounce_ms: u64,
    /// Delay before re-driving a transport's internal reconnect.
    pub extended_retry_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target: Endpoint::new("127.0.0.1", 3389),
            proxy: ProxyConfig::none(),
            reconnect_on_disconnect: true,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_tick_ms: RECONNECT_TICK.as_millis() as u64,
            probe_timeout_ms: PROBE_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
            precheck_timeout_ms: None,
            resize_debounce_ms: RESIZE_DEBOUNCE.as_millis() as u64,
            extended_retry_delay_ms: EXTENDED_RETRY_DELAY.as_millis() as u64,
        }
    }
}

impl SessionConfig {
    /// Default configuration for the given target.
    pub fn for_target(target: Endpoint) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Parse a TOML document and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(s).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.target.validate()?;
        self.proxy.validate()?;
        if self.reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
            return Err(Error::config(format!(
                "reconnect_attempts {} exceeds maximum {}",
                self.reconnect_attempts, MAX_RECONNECT_ATTEMPTS
            )));
        }
        for (name, value) in [
            ("reconnect_tick_ms", self.reconnect_tick_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }
        if self.precheck_timeout_ms == Some(0) {
            return Err(Error::config("precheck_timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    /// Endpoint the reconnect scheduler probes: the proxy when one is
    /// configured, the real target otherwise.
    pub fn probe_endpoint(&self) -> Endpoint {
        if self.proxy.is_enabled() {
            self.proxy.endpoint()
        } else {
            self.target.clone()
        }
    }

    pub fn reconnect_tick(&self) -> Duration {
        Duration::from_millis(self.reconnect_tick_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn precheck_timeout(&self) -> Option<Duration> {
        self.precheck_timeout_ms.map(Duration::from_millis)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn extended_retry_delay(&self) -> Duration {
        Duration::from_millis(self.extended_retry_delay_ms)
    }
}
