//! Connection state machine for the chat channel.
//!
//! [`ConnectionManager`] holds no sockets and no timers. Every lifecycle
//! input (login, transport open/close/error, retry timer expiry, teardown)
//! is a method call that returns the [`Action`]s the event loop must carry
//! out. Keeping I/O out of this type is what lets the reconnect rules be
//! tested exhaustively without a network.
//!
//! # Lifecycle
//!
//! ```text
//!             connect()                 on_open()
//! Disconnected ─────────► Connecting ─────────────► Open ──(auth_success)──► ready
//!      ▲                      │                      │
//!      │      on_close()      │       on_close()     │
//!      ├──────────────────────┴──────────────────────┘
//!      │   (schedule retry while a session exists)
//!      │
//!      │      on_close()
//!      └──────────────── Closing ◄──── teardown()
//! ```
//!
//! Each transport gets a fresh [`TransportId`]. Events carrying an id other
//! than the current one belong to a superseded transport and are ignored.

use std::time::Duration;

use super::frames::auth_frame;
use crate::constants;
use crate::session::Session;

/// Transport lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport handshake in flight.
    Connecting,
    /// Transport open.
    Open,
    /// Transport being closed on request.
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Snapshot of the channel published to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    /// Transport state.
    pub state: ConnectionState,
    /// Server acknowledged the session with `auth_success`.
    pub ready: bool,
    /// Consecutive failed attempts since the last successful open.
    pub attempt: u32,
    /// A reconnect timer is armed.
    pub retry_pending: bool,
}

impl ConnectionStatus {
    /// Open and acknowledged by the server.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open && self.ready
    }
}

/// Identifies one transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(u64);

impl std::fmt::Display for TransportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start opening a new transport.
    OpenTransport(TransportId),
    /// Write a text frame on the current transport.
    SendText(String),
    /// Close the given transport; the loop reports back via `on_close`.
    CloseTransport(TransportId),
    /// Arm the reconnect timer.
    ScheduleRetry(Duration),
    /// Disarm the reconnect timer.
    CancelRetry,
}

/// Exponential reconnect delay, `min(max, base * 2^attempt)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Creates a policy. `max` is raised to `base` if smaller.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// First-retry delay.
    #[must_use]
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Delay cap.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            constants::DEFAULT_BASE_RECONNECT_DELAY,
            constants::DEFAULT_MAX_RECONNECT_DELAY,
        )
    }
}

/// Reconnect and handshake rules for a single chat transport.
#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    session: Option<Session>,
    backoff: Backoff,
    attempt: u32,
    retry_pending: bool,
    ready: bool,
    current: Option<TransportId>,
    next_id: u64,
}

impl ConnectionManager {
    /// Creates a disconnected manager with no session.
    #[must_use]
    pub fn new(backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: None,
            backoff,
            attempt: 0,
            retry_pending: false,
            ready: false,
            current: None,
            next_id: 0,
        }
    }

    /// Current transport state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Session the channel is authenticated as, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Transport the manager currently tracks.
    #[must_use]
    pub fn current_transport(&self) -> Option<TransportId> {
        self.current
    }

    /// Snapshot for observers.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            ready: self.ready,
            attempt: self.attempt,
            retry_pending: self.retry_pending,
        }
    }

    /// The application authenticated as `session`.
    ///
    /// Switching to a different user tears the old transport down first so
    /// the next `auth` frame carries the new identity.
    pub fn login(&mut self, session: Session) -> Vec<Action> {
        let mut actions = Vec::new();
        let switching_user = self
            .session
            .as_ref()
            .is_some_and(|existing| !existing.same_user(&session));
        if switching_user {
            log::info!("[ChatChannel] Session changed, restarting connection");
            actions.extend(self.teardown());
        }
        self.session = Some(session);
        actions.extend(self.connect());
        actions
    }

    /// The application left the authenticated state.
    pub fn logout(&mut self) -> Vec<Action> {
        self.session = None;
        self.teardown()
    }

    /// Start a transport unless one is open or opening.
    pub fn connect(&mut self) -> Vec<Action> {
        if self.session.is_none() {
            log::debug!("[ChatChannel] connect() without a session, ignoring");
            return Vec::new();
        }
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Open) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.retry_pending {
            self.retry_pending = false;
            actions.push(Action::CancelRetry);
        }

        self.next_id += 1;
        let id = TransportId(self.next_id);
        self.current = Some(id);
        self.state = ConnectionState::Connecting;
        self.ready = false;
        log::debug!("[ChatChannel] Opening transport {}", id);
        actions.push(Action::OpenTransport(id));
        actions
    }

    /// Transport `id` finished its handshake.
    pub fn on_open(&mut self, id: TransportId) -> Vec<Action> {
        if self.current != Some(id) || self.state != ConnectionState::Connecting {
            log::debug!("[ChatChannel] Ignoring open of stale transport {}", id);
            return Vec::new();
        }
        let Some(session) = &self.session else {
            return Vec::new();
        };

        self.attempt = 0;
        self.state = ConnectionState::Open;
        log::info!("[ChatChannel] Transport {} open, authenticating", id);
        vec![Action::SendText(auth_frame(session))]
    }

    /// Server acknowledged the session. Returns `true` if readiness changed.
    pub fn on_auth_success(&mut self) -> bool {
        if self.state != ConnectionState::Open {
            log::debug!("[ChatChannel] auth_success while {}, ignoring", self.state);
            return false;
        }
        let changed = !self.ready;
        self.ready = true;
        changed
    }

    /// Transport `id` reported an error. Recovery is driven by the close.
    pub fn on_error(&self, id: TransportId, error: &str) {
        log::warn!("[ChatChannel] Transport {} error: {}", id, error);
    }

    /// Transport `id` is gone.
    pub fn on_close(&mut self, id: TransportId) -> Vec<Action> {
        if self.current != Some(id) {
            return Vec::new();
        }

        let previous = self.state;
        self.state = ConnectionState::Disconnected;
        self.current = None;
        self.ready = false;

        match previous {
            ConnectionState::Disconnected | ConnectionState::Closing => Vec::new(),
            ConnectionState::Connecting | ConnectionState::Open => self.schedule_retry(),
        }
    }

    /// The reconnect timer fired.
    pub fn on_retry_elapsed(&mut self) -> Vec<Action> {
        if !self.retry_pending {
            return Vec::new();
        }
        self.retry_pending = false;
        if self.session.is_none() {
            log::debug!("[ChatChannel] Retry fired after logout, not reconnecting");
            return Vec::new();
        }
        self.connect()
    }

    /// Frame submitted by a caller. Dropped unless the transport is open.
    pub fn send(&self, text: String) -> Option<Action> {
        if self.state == ConnectionState::Open {
            Some(Action::SendText(text))
        } else {
            log::debug!("[ChatChannel] Dropping outbound frame while {}", self.state);
            None
        }
    }

    /// Cancel the retry timer, close the transport, reset counters.
    pub fn teardown(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.retry_pending {
            self.retry_pending = false;
            actions.push(Action::CancelRetry);
        }
        if let Some(id) = self.current {
            if matches!(self.state, ConnectionState::Connecting | ConnectionState::Open) {
                self.state = ConnectionState::Closing;
                actions.push(Action::CloseTransport(id));
            }
        }
        self.attempt = 0;
        self.ready = false;
        actions
    }

    fn schedule_retry(&mut self) -> Vec<Action> {
        if self.session.is_none() || self.retry_pending {
            return Vec::new();
        }
        let delay = self.backoff.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.retry_pending = true;
        log::info!(
            "[ChatChannel] Disconnected, reconnecting in {:.1}s (attempt {})",
            delay.as_secs_f32(),
            self.attempt
        );
        vec![Action::ScheduleRetry(delay)]
    }
}
