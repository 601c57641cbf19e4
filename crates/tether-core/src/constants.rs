//! Timing and sizing defaults for tether sessions.

use std::time::Duration;

// =============================================================================
// Reconnection
// =============================================================================

/// Interval between reachability probes while waiting to reconnect.
pub const RECONNECT_TICK: Duration = Duration::from_secs(2);

/// Delay before re-driving a transport whose internal reconnect batch ran out.
pub const EXTENDED_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Default desired total of automatic reconnect attempts.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Upper bound accepted for the desired reconnect total.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 200;

// =============================================================================
// Connectivity
// =============================================================================

/// Timeout for a single reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Overall budget for one transport connect.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fail-fast reachability pre-check before handing off to a transport.
pub const PRECHECK_TIMEOUT: Duration = Duration::from_millis(500);

/// Poll interval used when waiting for an endpoint to come up.
pub const PORT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound for a best-effort transport disconnect during teardown.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Display
// =============================================================================

/// Quiet period before a burst of resize events is forwarded.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(300);

// =============================================================================
// Proxy Tunnel
// =============================================================================

/// Buffer size for each direction of the tunnel relay.
pub const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// Largest HTTP CONNECT response header accepted from a proxy.
pub const MAX_PROXY_RESPONSE: usize = 32 * 1024;
