//! Reconnection accounting.
//!
//! Two counters drive automatic reconnection:
//! - [`ReconnectBudget`]: automatic dials the scheduler may still make
//! - [`ExtendedReconnect`]: spreads a desired total over a transport whose
//!   internal reconnect counter is capped below it

/// Remaining automatic reconnect attempts for a session.
///
/// Reset to the configured total only by a user-initiated connect; one unit
/// is consumed per scheduler-driven dial, and automatic reconnects that
/// succeed do not restore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectBudget {
    configured: u32,
    remaining: u32,
}

impl ReconnectBudget {
    pub fn new(configured: u32) -> Self {
        Self {
            configured,
            remaining: configured,
        }
    }

    /// Restore the full budget.
    pub fn reset(&mut self) {
        self.remaining = self.configured;
    }

    /// Take one attempt. Returns false (and changes nothing) when exhausted.
    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn configured(&self) -> u32 {
        self.configured
    }

    /// Attempts consumed since the last reset.
    pub fn used(&self) -> u32 {
        self.configured - self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Extended reconnect counter for transports with a reconnect ceiling.
///
/// The transport is armed with `min(total, ceiling)` attempts on connect.
/// Each time its internal batch runs out the next `min(remaining, ceiling)`
/// is handed out, until the desired total has been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedReconnect {
    ceiling: u32,
    remaining: u32,
    batches: u32,
}

impl ExtendedReconnect {
    /// Start a new cycle. Returns the counter and the first batch to arm.
    ///
    /// A ceiling of zero is treated as one so that every batch makes progress.
    pub fn arm(total: u32, ceiling: u32) -> (Self, u32) {
        let ceiling = ceiling.max(1);
        let first = total.min(ceiling);
        let counter = Self {
            ceiling,
            remaining: total - first,
            batches: u32::from(first > 0),
        };
        (counter, first)
    }

    /// Next batch after the transport exhausted its internal attempts, or
    /// `None` when the desired total has been issued.
    pub fn next_batch(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        let batch = self.remaining.min(self.ceiling);
        self.remaining -= batch;
        self.batches += 1;
        Some(batch)
    }

    /// Attempts not yet handed to the transport.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Non-empty batches issued so far, including the initial arm.
    pub fn batches(&self) -> u32 {
        self.batches
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }
}

// =============================================================================
// Tests
// =============================================================================
