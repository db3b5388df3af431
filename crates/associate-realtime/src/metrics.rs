//! Presence counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide presence counters.
#[derive(Debug, Default)]
pub struct PresenceMetrics {
    /// Presence upserts that succeeded
    pub writes_succeeded: AtomicU64,
    /// Presence upserts that failed (logged and dropped)
    pub writes_failed: AtomicU64,
    /// Change events published into the feed
    pub changes_published: AtomicU64,
    /// Change events handed to subscribers
    pub changes_delivered: AtomicU64,
    /// Full cohort re-queries
    pub cohort_queries: AtomicU64,
}

impl PresenceMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one upsert
    pub fn record_write(&self, ok: bool) {
        let counter = if ok {
            &self.writes_succeeded
        } else {
            &self.writes_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a published event and how many subscribers received it
    pub fn record_publish(&self, delivered: usize) {
        self.changes_published.fetch_add(1, Ordering::Relaxed);
        self.changes_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
    }

    /// Record a cohort query
    pub fn record_cohort_query(&self) {
        self.cohort_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            writes_succeeded: self.writes_succeeded.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            changes_published: self.changes_published.load(Ordering::Relaxed),
            changes_delivered: self.changes_delivered.load(Ordering::Relaxed),
            cohort_queries: self.cohort_queries.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Presence upserts that succeeded
    pub writes_succeeded: u64,
    /// Presence upserts that failed
    pub writes_failed: u64,
    /// Change events published
    pub changes_published: u64,
    /// Change events delivered to subscribers
    pub changes_delivered: u64,
    /// Cohort queries run
    pub cohort_queries: u64,
}
