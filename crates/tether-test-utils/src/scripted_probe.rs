//! Reachability probe driven by a script instead of the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use tether_core::endpoint::Endpoint;
use tether_core::probe::ReachabilityProbe;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Returns scripted results in order, then `fallback` forever.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: AtomicU32,
    probed: Mutex<Vec<Endpoint>>,
}

impl ScriptedProbe {
    pub fn new(script: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicU32::new(0),
            probed: Mutex::new(Vec::new()),
        }
    }

    /// Always reachable.
    pub fn reachable() -> Self {
        Self::new([], true)
    }

    /// Never reachable.
    pub fn unreachable() -> Self {
        Self::new([], false)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Endpoints probed, in order.
    pub fn probed(&self) -> Vec<Endpoint> {
        lock(&self.probed).clone()
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn is_reachable(&self, endpoint: &Endpoint, _timeout: Duration) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.probed).push(endpoint.clone());
        lock(&self.script).pop_front().unwrap_or(self.fallback)
    }
}
