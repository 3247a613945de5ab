//! Classification and dispatch of inbound frames.
//!
//! The router never fails: malformed or unrecognized frames are logged and
//! dropped without touching connection state.

use std::sync::Arc;

use super::frames::{ChatMessage, InboundFrame};
use super::subscribers::SubscriberRegistry;
use crate::navigation::Navigator;
use crate::notifications::{NotificationBoard, NotificationId};

/// What routing a frame produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Server acknowledged the session.
    AuthSuccess,
    /// A chat message was delivered.
    Message {
        /// Subscribers invoked.
        subscribers: usize,
        /// Notification raised, if the user was elsewhere.
        notification: Option<NotificationId>,
    },
    /// Status frame (no-op).
    Status,
    /// Frame dropped (malformed or unrecognized).
    Dropped,
}

/// Routes parsed frames to subscribers and notifications.
pub struct MessageRouter {
    subscribers: SubscriberRegistry,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}

impl MessageRouter {
    /// Creates a router delivering to `subscribers`.
    pub fn new(subscribers: SubscriberRegistry, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            subscribers,
            navigator,
        }
    }

    /// Route one raw text frame.
    pub fn route(&self, raw: &str, notifications: &mut NotificationBoard) -> Routed {
        let frame = match InboundFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                let preview: String = raw.chars().take(100).collect();
                log::warn!("[Router] Dropping malformed frame ({}): {}", e, preview);
                return Routed::Dropped;
            }
        };

        match frame {
            InboundFrame::AuthSuccess => {
                log::info!("[Router] Session acknowledged by server");
                Routed::AuthSuccess
            }
            InboundFrame::Message(message) => self.deliver(&message, notifications),
            InboundFrame::Status(_) => Routed::Status,
            InboundFrame::Unknown(kind) => {
                log::info!(
                    "[Router] Unknown message type: {}",
                    kind.as_deref().unwrap_or("<none>")
                );
                Routed::Dropped
            }
        }
    }

    fn deliver(&self, message: &ChatMessage, notifications: &mut NotificationBoard) -> Routed {
        let subscribers = self.subscribers.dispatch(message);
        log::debug!(
            "[Router] Message for room {:?} delivered to {} subscriber(s)",
            message.room_id,
            subscribers
        );

        let notification = (!self.is_visible(message)).then(|| notifications.show(message));

        Routed::Message {
            subscribers,
            notification,
        }
    }

    /// The user is already looking at the conversation this message is in.
    fn is_visible(&self, message: &ChatMessage) -> bool {
        self.navigator
            .current_route()
            .shows_room(message.room_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{HeadlessNavigator, Route};
    use crate::notifications::{Notification, NotificationSink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingSink {
        shown: Mutex<Vec<String>>,
    }

    impl NotificationSink for RecordingSink {
        fn show(&self, notification: &Notification) {
            self.shown.lock().expect("lock").push(notification.text.clone());
        }

        fn dismiss(&self, _id: NotificationId) {}
    }

    struct Fixture {
        router: MessageRouter,
        registry: SubscriberRegistry,
        navigator: Arc<HeadlessNavigator>,
        sink: Arc<RecordingSink>,
        board: NotificationBoard,
    }

    fn fixture(route: Route) -> Fixture {
        let registry = SubscriberRegistry::new();
        let navigator = Arc::new(HeadlessNavigator::new(route));
        let sink = Arc::new(RecordingSink::default());
        let board = NotificationBoard::new(
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            Duration::from_secs(3),
        );
        let router = MessageRouter::new(
            registry.clone(),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );
        Fixture {
            router,
            registry,
            navigator,
            sink,
            board,
        }
    }

    const MESSAGE: &str = r#"{"type":"message","text":"Still available?","sender_id":"u2","room_id":"r1"}"#;

    #[tokio::test]
    async fn test_auth_success() {
        let mut f = fixture(Route::Inbox);
        assert_eq!(
            f.router.route(r#"{"type":"auth_success"}"#, &mut f.board),
            Routed::AuthSuccess
        );
    }

    #[tokio::test]
    async fn test_message_reaches_all_subscribers() {
        let mut f = fixture(Route::Inbox);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let count = Arc::clone(&count);
            f.registry.subscribe(move |message| {
                assert_eq!(message.text, "Still available?");
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        let routed = f.router.route(MESSAGE, &mut f.board);
        assert_eq!(
            routed,
            Routed::Message {
                subscribers: 2,
                notification: None
            }
        );
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_notifies_when_user_is_elsewhere() {
        let mut f = fixture(Route::Other("/search".to_string()));
        let Routed::Message { notification, .. } = f.router.route(MESSAGE, &mut f.board) else {
            panic!("expected message");
        };
        assert!(notification.is_some());
        assert_eq!(*f.sink.shown.lock().expect("lock"), vec!["Still available?"]);
    }

    #[tokio::test]
    async fn test_no_notification_in_same_conversation() {
        let mut f = fixture(Route::Conversation {
            room_id: "r1".to_string(),
        });
        f.router.route(MESSAGE, &mut f.board);
        assert!(f.sink.shown.lock().expect("lock").is_empty());

        // Other conversation: notify.
        f.navigator.navigate(Route::Conversation {
            room_id: "r2".to_string(),
        });
        f.router.route(MESSAGE, &mut f.board);
        assert_eq!(f.sink.shown.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn test_status_is_noop() {
        let mut f = fixture(Route::Other("/".to_string()));
        assert_eq!(
            f.router.route(r#"{"type":"status","user_id":"u2"}"#, &mut f.board),
            Routed::Status
        );
        assert!(f.board.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_then_valid_frame() {
        let mut f = fixture(Route::Inbox);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        f.registry.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(f.router.route("not json at all", &mut f.board), Routed::Dropped);
        assert_eq!(
            f.router.route(r#"{"type":"message"}"#, &mut f.board),
            Routed::Dropped
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert!(matches!(
            f.router.route(MESSAGE, &mut f.board),
            Routed::Message { subscribers: 1, .. }
        ));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_type_dropped() {
        let mut f = fixture(Route::Other("/".to_string()));
        assert_eq!(
            f.router.route(r#"{"type":"typing","room_id":"r1"}"#, &mut f.board),
            Routed::Dropped
        );
        assert!(f.board.is_empty());
    }

    #[tokio::test]
    async fn test_truncates_long_multibyte_payload_in_logs() {
        let mut f = fixture(Route::Inbox);
        let raw = "é".repeat(200);
        assert_eq!(f.router.route(&raw, &mut f.board), Routed::Dropped);
    }
}
