//! Real-time chat channel.
//!
//! [`ChatChannel`] is a cheap handle onto a background task that keeps one
//! WebSocket to the chat server alive for the logged-in user:
//!
//! - **Connection management**: connects on login, authenticates with an
//!   `auth` frame, reconnects with exponential backoff after any unexpected
//!   close, and stops on logout or [`ChatChannel::teardown`].
//! - **Subscribers**: any number of callbacks receive every inbound chat
//!   message; each is removed by the id returned when it subscribed.
//! - **Routing**: inbound frames are classified by `type`; chat messages go
//!   to subscribers and raise a notification unless the user is already
//!   looking at that conversation.
//!
//! # Example
//!
//! ```ignore
//! let channel = ChatChannel::spawn(settings, navigator, sink);
//! let id = channel.subscribe(|message| println!("{}", message.text));
//! channel.login(Session::new("u1"));
//!
//! if channel.wait_until_connected(Duration::from_secs(10)).await {
//!     channel.send(&ChatFrame::new(&session, "r1", "u2", "Hello!")).await;
//! }
//! channel.unsubscribe(id);
//! channel.shutdown().await;
//! ```

mod event_loop;
pub mod frames;
pub mod router;
pub mod state;
pub mod subscribers;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub use frames::{ChatFrame, ChatMessage, FrameError, InboundFrame};
pub use router::{MessageRouter, Routed};
pub use state::{Backoff, ConnectionManager, ConnectionState, ConnectionStatus};
pub use subscribers::{SubscriberRegistry, SubscriptionId};

use crate::config::Config;
use crate::constants;
use crate::navigation::Navigator;
use crate::notifications::{NotificationBoard, NotificationId, NotificationSink};
use crate::session::Session;
use event_loop::{ChannelCommand, EventLoop};

/// Connection parameters for a [`ChatChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Reconnect delay policy.
    pub backoff: Backoff,
    /// How long a notification stays up.
    pub notification_duration: Duration,
}

impl ChannelSettings {
    /// Settings for `url` with default timings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backoff: Backoff::default(),
            notification_duration: constants::DEFAULT_NOTIFICATION_DURATION,
        }
    }

    /// Override the reconnect policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Override the notification duration.
    #[must_use]
    pub fn with_notification_duration(mut self, duration: Duration) -> Self {
        self.notification_duration = duration;
        self
    }
}

impl From<&Config> for ChannelSettings {
    fn from(config: &Config) -> Self {
        Self {
            url: config.ws_url.clone(),
            backoff: Backoff::new(config.base_delay(), config.max_delay()),
            notification_duration: config.notification_duration(),
        }
    }
}

/// Handle onto the chat channel task.
///
/// Dropping the handle stops the task and closes the transport.
pub struct ChatChannel {
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
    subscribers: SubscriberRegistry,
    status_rx: watch::Receiver<ConnectionStatus>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ChatChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatChannel")
            .field("status", &*self.status_rx.borrow())
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}

impl ChatChannel {
    /// Start the channel task. Nothing connects until [`Self::login`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        settings: ChannelSettings,
        navigator: Arc<dyn Navigator>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let subscribers = SubscriberRegistry::new();

        let event_loop = EventLoop::new(
            settings.url,
            ConnectionManager::new(settings.backoff),
            MessageRouter::new(subscribers.clone(), Arc::clone(&navigator)),
            NotificationBoard::new(sink, settings.notification_duration),
            navigator,
            status_tx,
            command_rx,
        );
        let task = tokio::spawn(event_loop.run());

        Self {
            command_tx,
            subscribers,
            status_rx,
            task: Some(task),
        }
    }

    /// The user authenticated: connect as `session`.
    pub fn login(&self, session: Session) {
        self.command(ChannelCommand::Login(session));
    }

    /// The user logged out: disconnect and stop reconnecting.
    pub fn logout(&self) {
        self.command(ChannelCommand::Logout);
    }

    /// Close the transport and cancel any pending reconnect.
    ///
    /// The session is kept, so a later [`Self::login`] reconnects.
    pub fn teardown(&self) {
        self.command(ChannelCommand::Teardown);
    }

    /// Send a chat frame.
    ///
    /// Resolves to `true` once the frame was written to an open transport.
    /// Otherwise the frame is dropped and this resolves to `false`.
    pub async fn send(&self, frame: &ChatFrame) -> bool {
        let (reply, verdict) = oneshot::channel();
        let text = frame.to_text();
        if !self.command(ChannelCommand::Send { text, reply }) {
            return false;
        }
        let sent = verdict.await.unwrap_or(false);
        if !sent {
            log::debug!("[ChatChannel] Message to {} was not sent", frame.receiver_id);
        }
        sent
    }

    /// Register `callback` for every inbound chat message.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Remove one subscriber. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// The user activated notification `id`: dismiss it and navigate to its
    /// conversation.
    pub fn activate_notification(&self, id: NotificationId) {
        self.command(ChannelCommand::ActivateNotification(id));
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Open and acknowledged by the server.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Watch status changes.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Wait up to `timeout` for the channel to become connected.
    pub async fn wait_until_connected(&self, timeout: Duration) -> bool {
        let mut status = self.status_rx.clone();
        tokio::time::timeout(timeout, status.wait_for(ConnectionStatus::is_connected))
            .await
            .is_ok_and(|result| result.is_ok())
    }

    /// Stop the task and wait for it to close the transport.
    pub async fn shutdown(mut self) {
        self.command(ChannelCommand::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("[ChatChannel] Event loop ended abnormally: {}", e);
            }
        }
    }

    fn command(&self, command: ChannelCommand) -> bool {
        if self.command_tx.send(command).is_err() {
            log::warn!("[ChatChannel] Event loop is not running");
            return false;
        }
        true
    }
}

impl Drop for ChatChannel {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.command_tx.send(ChannelCommand::Shutdown);
        }
    }
}
