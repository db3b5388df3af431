//! # associate-realtime
//!
//! Live presence for Associate. Provides:
//!
//! - A pluggable presence store (PostgreSQL or in-memory)
//! - A filtered change feed with cancellable subscriptions, fed by
//!   PostgreSQL `LISTEN/NOTIFY` in production
//! - The presence publisher (heartbeat + foreground/background writes)
//! - Single-subject and advisor-cohort observers with freshness handling
//! - The indicator primitive rendered from observer output

pub mod engine;
pub mod feed;
pub mod metrics;
pub mod observer;
pub mod presence;
pub mod store;

pub use engine::PresenceEngine;
pub use feed::{ChangeFeed, MemoryChangeFeed, Subscription, SubscriptionHandle};
pub use metrics::PresenceMetrics;
pub use observer::cohort::{CohortObserver, CohortSnapshot, CohortWatch};
pub use observer::indicator::PresenceIndicator;
pub use observer::subject::{SubjectObserver, SubjectPresence, SubjectWatch};
pub use presence::lifecycle::AppLifecycle;
pub use presence::publisher::{PresenceIdentity, PresencePublisher, PublisherState};
pub use store::{MemoryPresenceStore, PgPresenceStore, PresenceStore};
