//! Observer and display surface that record what they see.

use std::sync::{Mutex, MutexGuard};

use tether_core::error::Error;
use tether_core::observer::{DisplaySurface, SessionObserver};
use tether_core::session::{SessionId, SessionState};
use tether_core::transport::DisplaySize;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// One observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    State { from: SessionState, to: SessionState },
    ReconnectPending { server_ready: bool },
    Info(String),
    Error(String),
    Closed(Option<String>),
}

/// Observer that keeps every callback for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        lock(&self.events).clone()
    }

    /// Every state entered, in order.
    pub fn states(&self) -> Vec<SessionState> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::State { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    /// Probe results reported while waiting to reconnect.
    pub fn pending_ticks(&self) -> Vec<bool> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::ReconnectPending { server_ready } => Some(*server_ready),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Error(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    /// Final messages reported on `Closed`.
    pub fn closures(&self) -> Vec<Option<String>> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Closed(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ObservedEvent) {
        lock(&self.events).push(event);
    }
}

impl SessionObserver for RecordingObserver {
    fn state_changed(&self, _id: SessionId, from: SessionState, to: SessionState) {
        self.push(ObservedEvent::State { from, to });
    }

    fn reconnect_pending(&self, _id: SessionId, server_ready: bool) {
        self.push(ObservedEvent::ReconnectPending { server_ready });
    }

    fn info(&self, _id: SessionId, message: &str) {
        self.push(ObservedEvent::Info(message.to_string()));
    }

    fn error(&self, _id: SessionId, error: &Error) {
        self.push(ObservedEvent::Error(error.to_string()));
    }

    fn closed(&self, _id: SessionId, last_reason: Option<&str>) {
        self.push(ObservedEvent::Closed(last_reason.map(str::to_string)));
    }
}

/// Surface that records every local layout it is asked to apply.
#[derive(Default)]
pub struct RecordingSurface {
    layouts: Mutex<Vec<DisplaySize>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layouts(&self) -> Vec<DisplaySize> {
        lock(&self.layouts).clone()
    }
}

impl DisplaySurface for RecordingSurface {
    fn apply_local_layout(&self, size: DisplaySize) {
        lock(&self.layouts).push(size);
    }
}
