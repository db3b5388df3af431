//! Presence store providers.

pub mod memory;
pub mod postgres;

pub use memory::MemoryPresenceStore;
pub use postgres::PgPresenceStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use associate_core::result::AppResult;
use associate_core::types::SubjectId;
use associate_entity::{AdvisorPresence, PresenceRecord};

/// Backend holding one presence row per subject.
#[async_trait]
pub trait PresenceStore: Send + Sync + std::fmt::Debug + 'static {
    /// Read a subject's row.
    async fn find(&self, subject_id: SubjectId) -> AppResult<Option<PresenceRecord>>;

    /// Insert or replace the row keyed by `record.subject_id`.
    async fn upsert(&self, record: &PresenceRecord) -> AppResult<()>;

    /// Advisors in `category` flagged online with `last_active_at >= active_since`,
    /// joined to their profiles, in store order.
    async fn online_advisors(
        &self,
        category: &str,
        active_since: DateTime<Utc>,
    ) -> AppResult<Vec<AdvisorPresence>>;
}
