//! TCP reachability probing.
//!
//! A probe is a plain TCP connect with a hard timeout. It is much cheaper
//! than a transport's own connect and is used to decide when an endpoint is
//! worth dialing again, and to fail fast before handing off to a transport
//! whose internal connect logic may hang for a long time.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::endpoint::Endpoint;

/// Returns true iff a TCP connection to `host:port` completes within `timeout`.
///
/// Refused, unreachable, resolution failures and timeouts all map to `false`.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            trace!(host, port, "probe succeeded");
            true
        }
        Ok(Err(e)) => {
            trace!(host, port, error = %e, "probe failed");
            false
        }
        Err(_) => {
            trace!(host, port, timeout_ms = timeout.as_millis() as u64, "probe timed out");
            false
        }
    }
}

/// Injectable reachability check.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self, endpoint: &Endpoint, timeout: Duration) -> bool;
}

/// Probe backed by a real TCP connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn is_reachable(&self, endpoint: &Endpoint, timeout: Duration) -> bool {
        probe(&endpoint.host, endpoint.port, timeout).await
    }
}

/// Poll until `endpoint` accepts connections or `deadline` elapses.
///
/// Each individual probe is bounded by `poll_interval`, so the call returns
/// no later than roughly `deadline + poll_interval`.
pub async fn wait_until_reachable(
    prober: &dyn ReachabilityProbe,
    endpoint: &Endpoint,
    poll_interval: Duration,
    deadline: Duration,
) -> bool {
    let started = Instant::now();
    loop {
        if prober.is_reachable(endpoint, poll_interval).await {
            debug!(%endpoint, elapsed_ms = started.elapsed().as_millis() as u64, "endpoint reachable");
            return true;
        }
        if started.elapsed() >= deadline {
            debug!(%endpoint, "endpoint still unreachable at deadline");
            return false;
        }
        tokio::time::sleep(poll_interval).await;
    }
}
