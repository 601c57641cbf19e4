//! tether binary entry point.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use tether_client::cli::tunnel_proxy;
use tether_client::{Cli, Command, DefaultProxyFactory, ProxyTunnel, Session, TcpLinkFactory};
use tether_core::config::SessionConfig;
use tether_core::constants::{PORT_POLL_INTERVAL, PRECHECK_TIMEOUT};
use tether_core::endpoint::Endpoint;
use tether_core::probe::{TcpProbe, probe, wait_until_reachable};
use tether_core::session::{SessionId, SessionState};
use tether_core::{Error, Result};

fn main() {
    let cli = Cli::parse();

    let log_format = cli.log_format.into();
    if let Err(e) = tether_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "tether starting");

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("tether: failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    match rt.block_on(run(cli.command)) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("tether: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but reported a negative result.
async fn run(command: Command) -> Result<bool> {
    match command {
        Command::Probe {
            endpoint,
            timeout_ms,
            wait_ms,
        } => Ok(run_probe(&endpoint, timeout_ms, wait_ms).await),
        Command::Tunnel {
            proxy_kind,
            proxy,
            proxy_user,
            proxy_pass,
            timeout_ms,
            target,
        } => {
            let config = tunnel_proxy(proxy_kind, &proxy, proxy_user.as_deref(), proxy_pass.as_deref());
            let tunnel = ProxyTunnel::open(
                &DefaultProxyFactory,
                &config,
                &target,
                Duration::from_millis(timeout_ms),
            )
            .await?
            .ok_or_else(|| Error::InvalidProxy {
                message: format!("no client for {} proxies", config.kind),
            })?;

            println!("{}", tunnel.local_endpoint());
            tokio::signal::ctrl_c().await?;
            tunnel.close();
            Ok(true)
        }
        Command::Session {
            config,
            target,
            precheck,
        } => run_session(&config, target, precheck).await.map(|_| true),
    }
}

async fn run_probe(endpoint: &Endpoint, timeout_ms: u64, wait_ms: Option<u64>) -> bool {
    let reachable = match wait_ms {
        Some(wait) => {
            wait_until_reachable(&TcpProbe, endpoint, PORT_POLL_INTERVAL, Duration::from_millis(wait)).await
        }
        None => probe(&endpoint.host, endpoint.port, Duration::from_millis(timeout_ms)).await,
    };
    println!("{} {}", endpoint, if reachable { "reachable" } else { "unreachable" });
    reachable
}

async fn run_session(path: &Path, target: Option<Endpoint>, precheck: bool) -> Result<()> {
    let mut config = SessionConfig::load(path)?;
    if let Some(target) = target {
        config.target = target;
    }
    if precheck && config.precheck_timeout_ms.is_none() {
        config.precheck_timeout_ms = Some(PRECHECK_TIMEOUT.as_millis() as u64);
    }
    config.validate()?;

    let session = Session::builder(SessionId(1), config, Arc::new(TcpLinkFactory)).spawn()?;
    session.connect().await?;

    let mut states = session.watch_state();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(session = %session.id(), "interrupted, closing session");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                println!("{}", state);
                if state == SessionState::Closed {
                    warn!(session = %session.id(), "session closed");
                    break;
                }
            }
        }
    }

    let snapshot = session.close().await?;
    info!(
        session = %snapshot.id,
        reconnects = snapshot.reconnect_count,
        last_disconnect = snapshot.last_disconnect.as_deref().unwrap_or("none"),
        "session finished"
    );
    Ok(())
}
