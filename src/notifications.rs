//! Transient notifications for inbound chat messages.
//!
//! When a message arrives while the user is somewhere other than the
//! conversation it belongs to, the channel raises a short-lived
//! notification carrying the message text. Notifications dismiss
//! themselves after a fixed duration; activating one before then takes the
//! user to the conversation.
//!
//! Rendering is the host's business: the [`NotificationBoard`] only tracks
//! which notifications are live and tells a [`NotificationSink`] when to
//! show or dismiss them.
//!
//! # Example
//!
//! ```ignore
//! let mut board = NotificationBoard::new(sink, Duration::from_secs(3));
//! let id = board.show(&message);
//!
//! // later, in the event loop
//! if let Some(expired) = board.next_expired().await {
//!     board.expire(expired);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::time::{delay_queue, DelayQueue};

use crate::channel::frames::ChatMessage;
use crate::constants;
use crate::navigation::Route;

/// Identifies one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u64);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification-{}", self.0)
    }
}

/// A notification raised for an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Identifier used for dismissal and activation.
    pub id: NotificationId,
    /// Message text.
    pub text: String,
    /// Icon shown alongside the text.
    pub icon: &'static str,
    /// Sender's display name, if the frame carried one.
    pub sender_name: Option<String>,
    /// Room the message belongs to.
    pub room_id: Option<String>,
}

impl Notification {
    /// Where activating this notification leads.
    #[must_use]
    pub fn target(&self) -> Route {
        Route::for_room(self.room_id.as_deref())
    }
}

/// Renders notifications for the host application.
pub trait NotificationSink: Send + Sync {
    /// Display `notification`.
    fn show(&self, notification: &Notification);

    /// Remove notification `id` from display.
    fn dismiss(&self, id: NotificationId);
}

/// Live notifications and their expiry timers.
pub struct NotificationBoard {
    sink: Arc<dyn NotificationSink>,
    duration: Duration,
    expiries: DelayQueue<NotificationId>,
    active: HashMap<NotificationId, (Notification, delay_queue::Key)>,
    next_id: u64,
}

impl std::fmt::Debug for NotificationBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBoard")
            .field("duration", &self.duration)
            .field("active", &self.active.len())
            .finish_non_exhaustive()
    }
}

impl NotificationBoard {
    /// Creates an empty board whose notifications live for `duration`.
    pub fn new(sink: Arc<dyn NotificationSink>, duration: Duration) -> Self {
        Self {
            sink,
            duration,
            expiries: DelayQueue::new(),
            active: HashMap::new(),
            next_id: 0,
        }
    }

    /// Raise a notification for `message`.
    ///
    /// Must be called from within a tokio runtime (the expiry timer is
    /// registered with it).
    pub fn show(&mut self, message: &ChatMessage) -> NotificationId {
        self.next_id += 1;
        let id = NotificationId(self.next_id);
        let notification = Notification {
            id,
            text: message.text.clone(),
            icon: constants::NOTIFICATION_ICON,
            sender_name: message.sender_name.clone(),
            room_id: message.room_id.clone(),
        };

        self.sink.show(&notification);
        let key = self.expiries.insert(id, self.duration);
        self.active.insert(id, (notification, key));
        log::debug!("[Notifications] Showing {} for {:?}", id, self.duration);
        id
    }

    /// Activate notification `id`: dismiss it and return where to navigate.
    ///
    /// Returns `None` if it has already expired or been dismissed.
    pub fn activate(&mut self, id: NotificationId) -> Option<Route> {
        let (notification, _) = self.remove(id)?;
        Some(notification.target())
    }

    /// Dismiss notification `id` early. Returns `false` if it is not live.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        self.remove(id).is_some()
    }

    /// Dismiss everything.
    pub fn clear(&mut self) {
        let ids: Vec<NotificationId> = self.active.keys().copied().collect();
        for id in ids {
            self.remove(id);
        }
    }

    /// Wait for the next notification to time out.
    ///
    /// Resolves to `None` immediately when nothing is live, so callers in a
    /// `select!` loop should guard on [`Self::is_empty`].
    pub async fn next_expired(&mut self) -> Option<NotificationId> {
        self.expiries
            .next()
            .await
            .map(delay_queue::Expired::into_inner)
    }

    /// Handle a timed-out notification returned by [`Self::next_expired`].
    pub fn expire(&mut self, id: NotificationId) {
        if self.active.remove(&id).is_some() {
            log::debug!("[Notifications] {} expired", id);
            self.sink.dismiss(id);
        }
    }

    /// Live notification `id`, if any.
    #[must_use]
    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.active.get(&id).map(|(notification, _)| notification)
    }

    /// Number of live notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// No live notifications.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn remove(&mut self, id: NotificationId) -> Option<(Notification, delay_queue::Key)> {
        let entry = self.active.remove(&id)?;
        self.expiries.try_remove(&entry.1);
        self.sink.dismiss(id);
        Some(entry)
    }
}
