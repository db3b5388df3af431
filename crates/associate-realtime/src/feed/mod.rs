//! Change feed for presence rows.
//!
//! Every write to the presence store is announced as a [`PresenceChange`].
//! Observers subscribe with a [`ChangeFilter`] and receive matching events
//! until they cancel. Delivery is at-least-once from a consumer's point of
//! view: the PostgreSQL bridge can replay, and consumers recompute state
//! from each event rather than patching it.

pub mod listener;
pub mod memory;
pub mod subscription;

pub use listener::PgChangeListener;
pub use memory::MemoryChangeFeed;
pub use subscription::{Subscription, SubscriptionHandle};

use associate_entity::{ChangeFilter, PresenceChange};

/// Publish/subscribe surface shared by all feed implementations.
pub trait ChangeFeed: Send + Sync + std::fmt::Debug + 'static {
    /// Register a subscriber. Events published after this call returns
    /// and matching `filter` are delivered to the returned subscription.
    fn subscribe(&self, filter: ChangeFilter) -> Subscription;

    /// Deliver `change` to every matching subscriber. Returns how many
    /// subscribers received it.
    fn publish(&self, change: PresenceChange) -> usize;

    /// Number of live subscriptions.
    fn subscriber_count(&self) -> usize;
}
