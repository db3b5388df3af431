//! In-process change feed.

use std::sync::Arc;

use associate_entity::{ChangeFilter, PresenceChange};

use crate::metrics::PresenceMetrics;

use super::ChangeFeed;
use super::subscription::{SubscriberRegistry, Subscription};

/// In-memory pub/sub: the memory store publishes here directly, and
/// [`super::PgChangeListener`] relays database notifications into it.
#[derive(Debug)]
pub struct MemoryChangeFeed {
    registry: Arc<SubscriberRegistry>,
    metrics: Arc<PresenceMetrics>,
}

impl MemoryChangeFeed {
    /// Create a feed with its own counters.
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(PresenceMetrics::new()))
    }

    /// Create a feed reporting into shared counters.
    pub fn with_metrics(metrics: Arc<PresenceMetrics>) -> Self {
        Self {
            registry: Arc::new(SubscriberRegistry::new()),
            metrics,
        }
    }
}

impl Default for MemoryChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for MemoryChangeFeed {
    fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        self.registry.register(filter)
    }

    fn publish(&self, change: PresenceChange) -> usize {
        let delivered = self.registry.dispatch(&change);
        self.metrics.record_publish(delivered);
        tracing::trace!(
            subject_id = %change.subject_id(),
            operation = ?change.operation,
            delivered,
            "Presence change published"
        );
        delivered
    }

    fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}
