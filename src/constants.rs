//! Application-wide constants for inbox-relay.
//!
//! Centralizes the timing and sizing knobs used by the chat channel, the
//! REST client and the CLI. Values that users may want to tune are also
//! exposed through [`crate::config::Config`]; the constants here are the
//! defaults.

use std::time::Duration;

// ============================================================================
// Endpoints
// ============================================================================

/// Default WebSocket endpoint of the chat server.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";

/// Default base URL of the REST backend.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

// ============================================================================
// Reconnection
// ============================================================================

/// Delay before the first reconnect attempt after a transport closes.
///
/// Each further consecutive failure doubles the delay, up to
/// [`DEFAULT_MAX_RECONNECT_DELAY`].
pub const DEFAULT_BASE_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the reconnect delay.
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// How long the event loop waits for a close frame to flush on teardown.
pub const TRANSPORT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Notifications
// ============================================================================

/// How long an inbound-message notification stays visible.
pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_secs(3);

/// Icon shown next to chat notifications.
pub const NOTIFICATION_ICON: &str = "💬";

// ============================================================================
// Queues
// ============================================================================

/// Buffer size of the transport event queue feeding the event loop.
///
/// Socket reader tasks block on this queue when the loop falls behind,
/// which in turn applies backpressure to the socket.
pub const TRANSPORT_EVENT_BUFFER: usize = 256;

// ============================================================================
// Timeouts
// ============================================================================

/// HTTP client request timeout for REST calls.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `inbox-relay send` waits for the server to acknowledge the
/// session before giving up.
pub const READY_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval of the CLI shutdown-flag loop.
pub const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(100);
