//! Resize debouncing.
//!
//! Window managers emit resize events in bursts while the user drags a
//! border. Every event is applied to the local surface at once, but only the
//! last size of a burst is forwarded downstream, after a quiet period with no
//! further events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use tether_core::observer::DisplaySurface;
use tether_core::transport::DisplaySize;

/// Last requested size and whether it still has to be forwarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PendingResize {
    size: Option<DisplaySize>,
    dirty: bool,
}

/// Coalesces resize requests into one downstream resize per quiet period.
pub struct ResizeDebouncer {
    pending: Arc<watch::Sender<PendingResize>>,
    surface: Option<Arc<dyn DisplaySurface>>,
    task: JoinHandle<()>,
    shut_down: AtomicBool,
}

impl ResizeDebouncer {
    /// Start a debouncer that calls `sink` with the last size of each burst.
    pub fn new<F>(quiet: Duration, surface: Option<Arc<dyn DisplaySurface>>, sink: F) -> Self
    where
        F: Fn(DisplaySize) + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(PendingResize::default());
        let pending = Arc::new(tx);
        let task = tokio::spawn(debounce_loop(Arc::clone(&pending), rx, quiet, sink));
        Self {
            pending,
            surface,
            task,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Record a new size. Applies the local layout immediately and restarts
    /// the quiet timer. Ignored after [`shutdown`](Self::shutdown).
    pub fn request(&self, size: DisplaySize) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        if let Some(surface) = &self.surface {
            surface.apply_local_layout(size);
        }
        trace!(%size, "resize requested");
        self.pending.send_modify(|p| {
            p.size = Some(size);
            p.dirty = true;
        });
    }

    /// A size is waiting for its quiet period to elapse.
    pub fn is_pending(&self) -> bool {
        !self.shut_down.load(Ordering::Acquire) && self.pending.borrow().dirty
    }

    /// Stop the timer without firing. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.task.abort();
        self.pending.send_if_modified(|p| {
            p.dirty = false;
            false
        });
        debug!("resize debouncer stopped");
    }
}

impl Drop for ResizeDebouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn debounce_loop<F>(
    pending: Arc<watch::Sender<PendingResize>>,
    mut rx: watch::Receiver<PendingResize>,
    quiet: Duration,
    sink: F,
) where
    F: Fn(DisplaySize),
{
    loop {
        if rx.changed().await.is_err() {
            return;
        }

        // Every further request restarts the quiet period.
        loop {
            tokio::select! {
                _ = tokio::time::sleep(quiet) => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        let mut fired = None;
        pending.send_if_modified(|p| {
            if p.dirty {
                p.dirty = false;
                fired = p.size;
            }
            false
        });
        if let Some(size) = fired {
            debug!(%size, "debounced resize fired");
            sink(size);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
