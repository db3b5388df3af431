//! Subscriber registry and cancellable subscriptions.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;

use associate_entity::{ChangeFilter, PresenceChange};

#[derive(Debug)]
struct Subscriber {
    filter: ChangeFilter,
    tx: mpsc::UnboundedSender<PresenceChange>,
}

/// Subscription id → subscriber.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: DashMap<u64, Subscriber>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for `filter`.
    pub fn register(self: &Arc<Self>, filter: ChangeFilter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::unbounded_channel();
        self.subscribers.insert(id, Subscriber { filter, tx });

        tracing::trace!(subscription = id, ?filter, "Subscriber registered");

        Subscription {
            filter,
            receiver,
            handle: SubscriptionHandle {
                id,
                cancelled: Arc::new(AtomicBool::new(false)),
                registry: Arc::downgrade(self),
            },
        }
    }

    /// Sends `change` to every matching subscriber, pruning closed ones.
    pub fn dispatch(&self, change: &PresenceChange) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            if !entry.filter.matches(change) {
                continue;
            }
            if entry.tx.send(change.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }

        for id in closed {
            self.subscribers.remove(&id);
        }

        delivered
    }

    /// Removes a subscriber.
    pub fn remove(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            tracing::trace!(subscription = id, "Subscriber removed");
        }
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// Cloneable token that cancels a [`Subscription`].
///
/// `cancel` is idempotent. Once it returns, the subscriber is gone from the
/// registry and the subscription yields nothing further, including events
/// that were already queued.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
    registry: Weak<SubscriberRegistry>,
}

impl SubscriptionHandle {
    /// Deregisters the subscription.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receiving end of a change subscription. Cancels itself on drop.
#[derive(Debug)]
pub struct Subscription {
    filter: ChangeFilter,
    receiver: mpsc::UnboundedReceiver<PresenceChange>,
    handle: SubscriptionHandle,
}

impl Subscription {
    /// Waits for the next event. `None` once cancelled or the feed is gone.
    pub async fn next(&mut self) -> Option<PresenceChange> {
        if self.handle.is_cancelled() {
            return None;
        }
        let change = self.receiver.recv().await?;
        (!self.handle.is_cancelled()).then_some(change)
    }

    /// Takes an already-queued event without waiting.
    pub fn try_next(&mut self) -> Option<PresenceChange> {
        if self.handle.is_cancelled() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// The filter this subscription was registered with.
    pub fn filter(&self) -> ChangeFilter {
        self.filter
    }

    /// A handle that can cancel this subscription from elsewhere.
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Deregisters the subscription. Idempotent.
    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}
