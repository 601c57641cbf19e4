//! Bounded dialing of transport connect routines.
//!
//! Transport connect routines are not all cancellable, and some sit in their
//! own connect logic far longer than the user is willing to wait. The dialer
//! runs the routine on a separate task and races it against a timer. If the
//! timer wins, the in-flight attempt is torn down best-effort and a
//! [`Error::DialTimeout`] is returned; the worker is left to finish in the
//! background and its result is discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Run `connect` on a worker task, bounded by `timeout`.
///
/// On timeout `abort` is spawned (not awaited) so the call itself always
/// returns within `timeout` plus scheduling latency.
pub async fn dial_with_timeout<C, A>(
    target: &Endpoint,
    timeout: Duration,
    connect: C,
    abort: A,
) -> Result<()>
where
    C: Future<Output = Result<()>> + Send + 'static,
    A: Future<Output = ()> + Send + 'static,
{
    let started = Instant::now();
    let mut worker = tokio::spawn(connect);

    tokio::select! {
        joined = &mut worker => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match joined {
                Ok(Ok(())) => {
                    debug!(%target, elapsed_ms, "dial completed");
                    Ok(())
                }
                Ok(Err(e)) => {
                    debug!(%target, elapsed_ms, error = %e, "dial failed");
                    Err(e)
                }
                Err(e) => Err(Error::TransportConnect {
                    message: format!("connect worker for {target} failed: {e}"),
                }),
            }
        }
        _ = tokio::time::sleep(timeout) => {
            let elapsed = started.elapsed();
            warn!(
                %target,
                timeout_ms = timeout.as_millis() as u64,
                "dial timed out, forcing disconnect"
            );
            // The worker keeps running detached; only its result is dropped.
            drop(worker);
            tokio::spawn(abort);
            Err(Error::DialTimeout {
                host: target.host.clone(),
                port: target.port,
                elapsed_secs: elapsed.as_secs(),
            })
        }
    }
}

/// Dial a transport with [`dial_with_timeout`], using its `disconnect` as the
/// abort path.
pub async fn dial_transport(
    transport: Arc<dyn Transport>,
    target: &Endpoint,
    timeout: Duration,
) -> Result<()> {
    let connecting = Arc::clone(&transport);
    dial_with_timeout(
        target,
        timeout,
        async move { connecting.connect().await },
        async move { transport.disconnect().await },
    )
    .await
}
