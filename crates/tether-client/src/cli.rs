//! Command-line interface for the `tether` binary.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use tether_core::config::{ProxyConfig, ProxyKind};
use tether_core::endpoint::Endpoint;
use tether_core::logging::LogFormat;

/// Session lifecycle toolkit: probe endpoints, open proxy tunnels, and run
/// self-healing sessions.
#[derive(Debug, Parser)]
#[command(name = "tether", version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log to file instead of stderr
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text", global = true)]
    pub log_format: CliLogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check whether HOST:PORT accepts TCP connections
    Probe {
        /// Endpoint to probe
        #[arg(value_name = "HOST:PORT")]
        endpoint: Endpoint,

        /// Timeout for a single probe in milliseconds
        #[arg(long = "timeout-ms", default_value_t = 1000)]
        timeout_ms: u64,

        /// Keep polling until reachable or this many milliseconds elapse
        #[arg(long = "wait-ms", value_name = "MS")]
        wait_ms: Option<u64>,
    },

    /// Open a loopback tunnel to TARGET through an upstream proxy
    Tunnel {
        /// Proxy protocol
        #[arg(long = "proxy-kind", default_value = "socks5")]
        proxy_kind: CliProxyKind,

        /// Proxy address
        #[arg(long = "proxy", value_name = "HOST:PORT")]
        proxy: Endpoint,

        /// Proxy username (SOCKS4 user id, SOCKS5 or HTTP Basic user)
        #[arg(long = "proxy-user", value_name = "USER")]
        proxy_user: Option<String>,

        /// Proxy password
        #[arg(long = "proxy-pass", value_name = "PASS", requires = "proxy_user")]
        proxy_pass: Option<String>,

        /// Timeout for the proxy connect and handshake in milliseconds
        #[arg(long = "timeout-ms", default_value_t = 30_000)]
        timeout_ms: u64,

        /// Destination reached through the proxy
        #[arg(value_name = "TARGET")]
        target: Endpoint,
    },

    /// Run a self-healing session described by a TOML file
    Session {
        /// Session configuration file
        #[arg(short = 'c', long = "config", value_name = "FILE")]
        config: PathBuf,

        /// Override the configured target
        #[arg(long = "target", value_name = "HOST:PORT")]
        target: Option<Endpoint>,

        /// Probe the endpoint before connecting and fail fast if unreachable
        #[arg(long = "precheck")]
        precheck: bool,
    },
}

/// CLI log format option.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum CliLogFormat {
    #[default]
    Text,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(f: CliLogFormat) -> Self {
        match f {
            CliLogFormat::Text => LogFormat::Text,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

/// CLI proxy protocol option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliProxyKind {
    Http,
    Socks4,
    Socks5,
}

impl From<CliProxyKind> for ProxyKind {
    fn from(k: CliProxyKind) -> Self {
        match k {
            CliProxyKind::Http => ProxyKind::Http,
            CliProxyKind::Socks4 => ProxyKind::Socks4,
            CliProxyKind::Socks5 => ProxyKind::Socks5,
        }
    }
}

/// Build the proxy configuration for the `tunnel` subcommand.
pub fn tunnel_proxy(
    kind: CliProxyKind,
    proxy: &Endpoint,
    user: Option<&str>,
    pass: Option<&str>,
) -> ProxyConfig {
    let config = ProxyConfig::new(kind.into(), proxy.host.clone(), proxy.port);
    match user {
        Some(user) => config.with_credentials(user, pass.unwrap_or_default()),
        None => config,
    }
}

// =============================================================================
// Tests
// =============================================================================
