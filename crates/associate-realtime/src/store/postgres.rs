//! PostgreSQL-backed presence store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use associate_core::result::AppResult;
use associate_core::types::SubjectId;
use associate_database::PresenceRepository;
use associate_entity::{AdvisorPresence, PresenceRecord};

use super::PresenceStore;

/// Presence store over the `presence_status` table. Change events come
/// from the table trigger via [`crate::feed::PgChangeListener`].
#[derive(Debug, Clone)]
pub struct PgPresenceStore {
    repository: PresenceRepository,
}

impl PgPresenceStore {
    /// Wrap a repository.
    pub fn new(repository: PresenceRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl PresenceStore for PgPresenceStore {
    async fn find(&self, subject_id: SubjectId) -> AppResult<Option<PresenceRecord>> {
        self.repository.find_by_subject(subject_id).await
    }

    async fn upsert(&self, record: &PresenceRecord) -> AppResult<()> {
        self.repository.upsert(record).await
    }

    async fn online_advisors(
        &self,
        category: &str,
        active_since: DateTime<Utc>,
    ) -> AppResult<Vec<AdvisorPresence>> {
        self.repository
            .find_online_advisors(category, active_since)
            .await
    }
}
