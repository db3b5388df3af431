//! "Which advisors of category C are online?", answered live.
//!
//! Any advisor write may move someone in or out of the cohort, so every
//! change re-runs the full query instead of patching the list. Events that
//! pile up while a query is in flight collapse into the next one.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use associate_core::result::AppResult;
use associate_entity::{AdvisorPresence, ChangeFilter, Freshness, SubjectKind};

use crate::feed::{ChangeFeed, Subscription};
use crate::metrics::PresenceMetrics;
use crate::store::PresenceStore;

use super::{ObserverWatch, StateSlot, deadline_at, expiry};

/// Observed cohort for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSnapshot {
    pub category: String,
    /// `true` until the first query completes.
    pub loading: bool,
    /// Online advisors in store order.
    pub advisors: Vec<AdvisorPresence>,
}

/// Live cohort handle.
pub type CohortWatch = ObserverWatch<CohortSnapshot>;

/// Builds cohort watches over a store and change feed.
#[derive(Debug, Clone)]
pub struct CohortObserver {
    store: Arc<dyn PresenceStore>,
    feed: Arc<dyn ChangeFeed>,
    freshness: Freshness,
    metrics: Arc<PresenceMetrics>,
}

impl CohortObserver {
    pub fn new(
        store: Arc<dyn PresenceStore>,
        feed: Arc<dyn ChangeFeed>,
        freshness: Freshness,
    ) -> Self {
        Self {
            store,
            feed,
            freshness,
            metrics: Arc::new(PresenceMetrics::new()),
        }
    }

    /// Count queries into shared counters.
    pub fn with_metrics(mut self, metrics: Arc<PresenceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run the cohort query once. A blank category is an empty cohort.
    pub async fn fetch(&self, category: &str) -> AppResult<Vec<AdvisorPresence>> {
        if category.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.metrics.record_cohort_query();
        self.store
            .online_advisors(category, self.freshness.cutoff(Utc::now()))
            .await
    }

    /// Start observing `category`.
    pub fn observe(&self, category: impl Into<String>) -> CohortWatch {
        let category = category.into();

        if category.trim().is_empty() {
            let (slot, receiver) = StateSlot::new(CohortSnapshot {
                category,
                loading: false,
                advisors: Vec::new(),
            });
            return ObserverWatch::new(receiver, slot, CancellationToken::new(), None);
        }

        let (slot, receiver) = StateSlot::new(CohortSnapshot {
            category: category.clone(),
            loading: true,
            advisors: Vec::new(),
        });
        let subscription = self.feed.subscribe(ChangeFilter::Kind(SubjectKind::Advisor));
        let handle = subscription.handle();
        let cancel = CancellationToken::new();

        tokio::spawn(run_cohort(
            self.clone(),
            category,
            subscription,
            slot.clone(),
            cancel.clone(),
        ));

        ObserverWatch::new(receiver, slot, cancel, Some(handle))
    }

    /// Query, degrading failures to an empty cohort.
    async fn query(&self, category: &str) -> Vec<AdvisorPresence> {
        match self.fetch(category).await {
            Ok(advisors) => advisors,
            Err(e) => {
                tracing::error!(category = %category, error = %e, "Cohort query failed");
                Vec::new()
            }
        }
    }

    /// When the first listed advisor falls out of the window.
    fn next_expiry(&self, advisors: &[AdvisorPresence]) -> Option<tokio::time::Instant> {
        advisors
            .iter()
            .map(|a| a.presence.last_active_at)
            .min()
            // The query's cutoff is inclusive; wait until it no longer admits.
            .map(|at| deadline_at(at + self.freshness.window() + chrono::Duration::milliseconds(1)))
    }
}

async fn run_cohort(
    observer: CohortObserver,
    category: String,
    mut subscription: Subscription,
    slot: StateSlot<CohortSnapshot>,
    cancel: CancellationToken,
) {
    loop {
        let mut coalesced = 0usize;
        while subscription.try_next().is_some() {
            coalesced += 1;
        }

        let advisors = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            advisors = observer.query(&category) => advisors,
        };

        tracing::debug!(
            category = %category,
            online = advisors.len(),
            coalesced,
            "Cohort refreshed"
        );

        let deadline = observer.next_expiry(&advisors);
        let published = slot.publish(CohortSnapshot {
            category: category.clone(),
            loading: false,
            advisors,
        });
        if !published {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            change = subscription.next() => {
                if change.is_none() {
                    break;
                }
            }
            _ = expiry(deadline) => {}
        }
    }

    tracing::trace!(category = %category, "Cohort observer finished");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::DateTime;

    use associate_core::error::AppError;
    use associate_core::types::SubjectId;
    use associate_entity::PresenceRecord;

    use super::*;
    use crate::feed::MemoryChangeFeed;
    use crate::store::MemoryPresenceStore;

    fn setup(freshness: Freshness) -> (Arc<MemoryPresenceStore>, CohortObserver) {
        let feed = Arc::new(MemoryChangeFeed::new());
        let store = Arc::new(MemoryPresenceStore::new(feed.clone()));
        let observer = CohortObserver::new(store.clone(), feed, freshness);
        (store, observer)
    }

    fn advisor(subject: SubjectId, category: &str, online: bool, at: DateTime<Utc>) -> PresenceRecord {
        PresenceRecord::new(subject, SubjectKind::Advisor, online, at, Some(category.into()))
    }

    fn ids(snapshot: &CohortSnapshot) -> Vec<SubjectId> {
        snapshot.advisors.iter().map(|a| a.subject_id()).collect()
    }

    async fn settled(watch: &mut CohortWatch) -> CohortSnapshot {
        watch.wait_for(|s| !s.loading).await.expect("observer alive")
    }

    #[tokio::test]
    async fn test_blank_category_is_empty_and_settled() {
        let (_, observer) = setup(Freshness::default());
        let watch = observer.observe("  ");
        let snapshot = watch.current();
        assert!(!snapshot.loading);
        assert!(snapshot.advisors.is_empty());
        assert!(observer.fetch("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_by_category_and_online() {
        let (store, observer) = setup(Freshness::default());
        let (a, b, c) = (SubjectId::new(), SubjectId::new(), SubjectId::new());
        let now = Utc::now();
        store.upsert(&advisor(a, "finance", true, now)).await.unwrap();
        store.upsert(&advisor(b, "finance", false, now)).await.unwrap();
        store.upsert(&advisor(c, "tax", true, now)).await.unwrap();

        let mut watch = observer.observe("finance");
        assert_eq!(ids(&settled(&mut watch).await), vec![a]);
    }

    #[tokio::test]
    async fn test_stale_advisors_are_excluded() {
        let (store, observer) = setup(Freshness::default());
        let fresh = SubjectId::new();
        let stale = SubjectId::new();
        store
            .upsert(&advisor(stale, "legal", true, Utc::now() - chrono::Duration::minutes(3)))
            .await
            .unwrap();
        store.upsert(&advisor(fresh, "legal", true, Utc::now())).await.unwrap();

        let found: Vec<_> = observer
            .fetch("legal")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.subject_id())
            .collect();
        assert_eq!(found, vec![fresh]);
    }

    #[tokio::test]
    async fn test_window_edges() {
        let (store, observer) = setup(Freshness::default());
        let inside = SubjectId::new();
        let outside = SubjectId::new();
        let now = Utc::now();
        store
            .upsert(&advisor(inside, "audit", true, now - chrono::Duration::seconds(119)))
            .await
            .unwrap();
        store
            .upsert(&advisor(outside, "audit", true, now - chrono::Duration::seconds(121)))
            .await
            .unwrap();

        let fetched: Vec<_> = observer
            .fetch("audit")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.subject_id())
            .collect();
        assert_eq!(fetched, vec![inside]);

        let mut watch = observer.observe("audit");
        assert_eq!(ids(&settled(&mut watch).await), vec![inside]);
    }

    #[tokio::test]
    async fn test_requeries_on_advisor_changes() {
        let (store, observer) = setup(Freshness::default());
        let a = SubjectId::new();
        let mut watch = observer.observe("finance");
        assert!(settled(&mut watch).await.advisors.is_empty());

        store.upsert(&advisor(a, "finance", true, Utc::now())).await.unwrap();
        let joined = watch.wait_for(|s| s.advisors.len() == 1).await.unwrap();
        assert_eq!(ids(&joined), vec![a]);

        store.upsert(&advisor(a, "finance", false, Utc::now())).await.unwrap();
        assert!(watch.wait_for(|s| s.advisors.is_empty()).await.is_some());
    }

    #[tokio::test]
    async fn test_regular_user_writes_do_not_trigger_queries() {
        let feed = Arc::new(MemoryChangeFeed::new());
        let store = Arc::new(MemoryPresenceStore::new(feed.clone()));
        let metrics = Arc::new(PresenceMetrics::new());
        let observer = CohortObserver::new(store.clone(), feed, Freshness::default())
            .with_metrics(metrics.clone());

        let mut watch = observer.observe("finance");
        settled(&mut watch).await;
        let before = metrics.snapshot().cohort_queries;

        store
            .upsert(&PresenceRecord::new(
                SubjectId::new(),
                SubjectKind::Regular,
                true,
                Utc::now(),
                None,
            ))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(metrics.snapshot().cohort_queries, before);
    }

    #[tokio::test]
    async fn test_members_age_out() {
        let (store, observer) = setup(Freshness::new(chrono::Duration::milliseconds(200)));
        let a = SubjectId::new();
        store.upsert(&advisor(a, "tax", true, Utc::now())).await.unwrap();

        let mut watch = observer.observe("tax");
        assert_eq!(ids(&settled(&mut watch).await), vec![a]);

        let emptied = tokio::time::timeout(
            Duration::from_secs(2),
            watch.wait_for(|s| s.advisors.is_empty()),
        )
        .await
        .expect("aged out in time");
        assert!(emptied.is_some());
    }

    #[tokio::test]
    async fn test_cancel_freezes_snapshot() {
        let (store, observer) = setup(Freshness::default());
        let mut watch = observer.observe("finance");
        settled(&mut watch).await;

        watch.cancel();
        store
            .upsert(&advisor(SubjectId::new(), "finance", true, Utc::now()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(watch.current().advisors.is_empty());
        assert!(watch.changed().await.is_none());
    }

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl PresenceStore for BrokenStore {
        async fn find(&self, _subject_id: SubjectId) -> AppResult<Option<PresenceRecord>> {
            Err(AppError::database("connection refused"))
        }

        async fn upsert(&self, _record: &PresenceRecord) -> AppResult<()> {
            Err(AppError::database("connection refused"))
        }

        async fn online_advisors(
            &self,
            _category: &str,
            _active_since: DateTime<Utc>,
        ) -> AppResult<Vec<AdvisorPresence>> {
            Err(AppError::database("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_query_failure_degrades_to_empty() {
        let observer = CohortObserver::new(
            Arc::new(BrokenStore),
            Arc::new(MemoryChangeFeed::new()),
            Freshness::default(),
        );
        let mut watch = observer.observe("finance");
        let snapshot = settled(&mut watch).await;
        assert!(snapshot.advisors.is_empty());
        assert!(observer.fetch("finance").await.is_err());
    }
}
