//! Registry of inbound-message subscribers.
//!
//! Consumers register a callback and get back a [`SubscriptionId`]; passing
//! the id to [`SubscriberRegistry::unsubscribe`] removes exactly that
//! callback. Dispatch runs over a snapshot taken under the lock and invokes
//! callbacks after releasing it, so a callback may subscribe or unsubscribe
//! (itself included) without deadlocking or disturbing the pass in progress.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::frames::ChatMessage;

/// Callback invoked for every inbound chat message.
pub type MessageCallback = Arc<dyn Fn(&ChatMessage) + Send + Sync>;

/// Token identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Inner {
    next_id: u64,
    callbacks: HashMap<SubscriptionId, MessageCallback>,
}

/// Shared set of message callbacks.
///
/// Cloning yields another handle onto the same set.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish_non_exhaustive()
    }
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every inbound message.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.callbacks.insert(id, Arc::new(callback));
        id
    }

    /// Remove the callback registered as `id`.
    ///
    /// Returns `false` if it was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().callbacks.remove(&id).is_some()
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().callbacks.len()
    }

    /// No callbacks registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback registered when the pass starts.
    ///
    /// A panicking callback is logged and skipped. Returns how many
    /// callbacks were invoked.
    pub fn dispatch(&self, message: &ChatMessage) -> usize {
        let snapshot: Vec<MessageCallback> = self.lock().callbacks.values().cloned().collect();

        for callback in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(message))).is_err() {
                log::error!("[ChatChannel] Subscriber panicked while handling a message");
            }
        }
        snapshot.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
