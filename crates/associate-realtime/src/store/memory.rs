//! In-memory presence store for single-process use.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;

use associate_core::result::AppResult;
use associate_core::types::SubjectId;
use associate_entity::{
    AdvisorPresence, ChangeOperation, PresenceChange, PresenceRecord, ProfileSummary,
};

use crate::feed::ChangeFeed;

use super::PresenceStore;

/// Presence rows kept in insertion order, with every write announced on a
/// change feed the way the database trigger does.
#[derive(Debug)]
pub struct MemoryPresenceStore {
    /// Rows in first-insert order; upserts replace in place.
    records: RwLock<Vec<PresenceRecord>>,
    /// Subject → profile, joined by cohort queries.
    profiles: DashMap<SubjectId, ProfileSummary>,
    /// Where writes are announced.
    feed: Arc<dyn ChangeFeed>,
}

impl MemoryPresenceStore {
    /// Create an empty store publishing into `feed`.
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            profiles: DashMap::new(),
            feed,
        }
    }

    /// Register or replace a profile.
    pub fn put_profile(&self, profile: ProfileSummary) {
        self.profiles.insert(profile.subject_id, profile);
    }

    /// Delete a subject's row, as the profile cascade would.
    pub async fn remove(&self, subject_id: SubjectId) -> Option<PresenceRecord> {
        let mut records = self.records.write().await;
        let index = records.iter().position(|r| r.subject_id == subject_id)?;
        let removed = records.remove(index);
        self.feed
            .publish(PresenceChange::new(ChangeOperation::Delete, removed.clone()));
        Some(removed)
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no rows are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Copy of all rows in store order.
    pub async fn snapshot(&self) -> Vec<PresenceRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn find(&self, subject_id: SubjectId) -> AppResult<Option<PresenceRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.subject_id == subject_id).cloned())
    }

    async fn upsert(&self, record: &PresenceRecord) -> AppResult<()> {
        let mut records = self.records.write().await;
        let operation = match records.iter_mut().find(|r| r.subject_id == record.subject_id) {
            Some(existing) => {
                *existing = record.clone();
                ChangeOperation::Update
            }
            None => {
                records.push(record.clone());
                ChangeOperation::Insert
            }
        };
        // Published under the write lock so events follow write order.
        self.feed
            .publish(PresenceChange::new(operation, record.clone()));
        Ok(())
    }

    async fn online_advisors(
        &self,
        category: &str,
        active_since: DateTime<Utc>,
    ) -> AppResult<Vec<AdvisorPresence>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.in_cohort(category) && r.is_online && r.last_active_at >= active_since)
            .map(|r| AdvisorPresence {
                presence: r.clone(),
                profile: self.profiles.get(&r.subject_id).map(|p| p.value().clone()),
            })
            .collect())
    }
}
