//! "Is subject X online?", answered live.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use associate_core::result::AppResult;
use associate_core::types::SubjectId;
use associate_entity::{ChangeFilter, ChangeOperation, Freshness, PresenceRecord};

use crate::feed::{ChangeFeed, Subscription};
use crate::store::PresenceStore;

use super::{ObserverWatch, StateSlot, deadline_at, expiry};

/// Observed verdict for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPresence {
    /// The observed subject; `None` when nothing is being observed.
    pub subject_id: Option<SubjectId>,
    /// `true` until the first read completes.
    pub loading: bool,
    /// Fresh-online verdict.
    pub online: bool,
}

impl SubjectPresence {
    fn idle() -> Self {
        Self {
            subject_id: None,
            loading: false,
            online: false,
        }
    }
}

/// Live verdict handle for one subject.
pub type SubjectWatch = ObserverWatch<SubjectPresence>;

/// Builds single-subject watches over a store and change feed.
#[derive(Debug, Clone)]
pub struct SubjectObserver {
    store: Arc<dyn PresenceStore>,
    feed: Arc<dyn ChangeFeed>,
    freshness: Freshness,
}

impl SubjectObserver {
    pub fn new(
        store: Arc<dyn PresenceStore>,
        feed: Arc<dyn ChangeFeed>,
        freshness: Freshness,
    ) -> Self {
        Self {
            store,
            feed,
            freshness,
        }
    }

    /// One read, no subscription. A missing row is offline.
    pub async fn check(&self, subject_id: SubjectId) -> AppResult<bool> {
        let record = self.store.find(subject_id).await?;
        Ok(record.is_some_and(|r| r.is_online_at(Utc::now(), &self.freshness)))
    }

    /// Start observing `subject_id`.
    ///
    /// The subscription is registered before this returns, so no write made
    /// after the call is missed. `None` yields a settled offline value with
    /// no reads and no subscription.
    pub fn observe(&self, subject_id: Option<SubjectId>) -> SubjectWatch {
        let Some(subject_id) = subject_id else {
            let (slot, receiver) = StateSlot::new(SubjectPresence::idle());
            return ObserverWatch::new(receiver, slot, CancellationToken::new(), None);
        };

        let (slot, receiver) = StateSlot::new(SubjectPresence {
            subject_id: Some(subject_id),
            loading: true,
            online: false,
        });
        let subscription = self.feed.subscribe(ChangeFilter::Subject(subject_id));
        let handle = subscription.handle();
        let cancel = CancellationToken::new();

        tokio::spawn(run_subject(
            Arc::clone(&self.store),
            subscription,
            slot.clone(),
            self.freshness,
            subject_id,
            cancel.clone(),
        ));

        ObserverWatch::new(receiver, slot, cancel, Some(handle))
    }
}

/// Last known row plus whether its freshness deadline already passed.
#[derive(Debug, Default)]
struct Latest {
    record: Option<PresenceRecord>,
    expired: bool,
}

impl Latest {
    fn online(&self, freshness: &Freshness) -> bool {
        !self.expired
            && self
                .record
                .as_ref()
                .is_some_and(|r| r.is_online_at(Utc::now(), freshness))
    }

    fn apply(&mut self, operation: ChangeOperation, record: PresenceRecord) {
        if operation == ChangeOperation::Delete {
            self.record = None;
            self.expired = false;
            return;
        }
        // Last write wins, whatever its stamp.
        self.record = Some(record);
        self.expired = false;
    }
}

async fn run_subject(
    store: Arc<dyn PresenceStore>,
    mut subscription: Subscription,
    slot: StateSlot<SubjectPresence>,
    freshness: Freshness,
    subject_id: SubjectId,
    cancel: CancellationToken,
) {
    let mut latest = Latest::default();

    let read = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        read = store.find(subject_id) => read,
    };
    match read {
        Ok(record) => latest.record = record,
        Err(e) => {
            tracing::error!(subject_id = %subject_id, error = %e, "Presence read failed");
        }
    }

    loop {
        let online = latest.online(&freshness);
        let published = slot.publish(SubjectPresence {
            subject_id: Some(subject_id),
            loading: false,
            online,
        });
        if !published {
            break;
        }

        let deadline = latest
            .record
            .as_ref()
            .filter(|_| online)
            .map(|r| deadline_at(r.last_active_at + freshness.window()));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            change = subscription.next() => match change {
                Some(change) => latest.apply(change.operation, change.record),
                None => break,
            },
            _ = expiry(deadline) => {
                tracing::debug!(subject_id = %subject_id, "Presence aged out");
                latest.expired = true;
            }
        }
    }

    tracing::trace!(subject_id = %subject_id, "Subject observer finished");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::DateTime;
    use tokio::time;

    use associate_entity::SubjectKind;

    use super::*;
    use crate::feed::MemoryChangeFeed;
    use crate::store::MemoryPresenceStore;

    fn setup() -> (Arc<MemoryPresenceStore>, SubjectObserver) {
        let feed = Arc::new(MemoryChangeFeed::new());
        let store = Arc::new(MemoryPresenceStore::new(feed.clone()));
        let observer = SubjectObserver::new(store.clone(), feed, Freshness::default());
        (store, observer)
    }

    fn row(subject: SubjectId, online: bool, at: DateTime<Utc>) -> PresenceRecord {
        PresenceRecord::new(subject, SubjectKind::Regular, online, at, None)
    }

    fn aged(secs: i64) -> DateTime<Utc> {
        Utc::now() - chrono::Duration::seconds(secs)
    }

    async fn settled(watch: &mut SubjectWatch) -> SubjectPresence {
        watch.wait_for(|p| !p.loading).await.expect("observer alive")
    }

    #[tokio::test]
    async fn test_no_subject_is_settled_offline() {
        let (_, observer) = setup();
        let watch = observer.observe(None);
        assert_eq!(watch.current(), SubjectPresence::idle());
    }

    #[tokio::test]
    async fn test_missing_row_is_offline() {
        let (_, observer) = setup();
        let mut watch = observer.observe(Some(SubjectId::new()));
        assert!(!settled(&mut watch).await.online);
        assert!(!observer.check(SubjectId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_freshness_boundaries() {
        let (store, observer) = setup();
        let cases = [(119, true), (121, false), (180, false)];
        for (age, expected) in cases {
            let subject = SubjectId::new();
            store.upsert(&row(subject, true, aged(age))).await.unwrap();

            let mut watch = observer.observe(Some(subject));
            assert_eq!(settled(&mut watch).await.online, expected, "age {age}s");
            assert_eq!(observer.check(subject).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_follows_writes_and_deletes() {
        let (store, observer) = setup();
        let subject = SubjectId::new();
        let mut watch = observer.observe(Some(subject));
        settled(&mut watch).await;

        store.upsert(&row(subject, true, Utc::now())).await.unwrap();
        assert!(watch.wait_for(|p| p.online).await.is_some());

        store.upsert(&row(subject, false, Utc::now())).await.unwrap();
        assert!(watch.wait_for(|p| !p.online).await.is_some());

        store.upsert(&row(subject, true, Utc::now())).await.unwrap();
        assert!(watch.wait_for(|p| p.online).await.is_some());

        store.remove(subject).await;
        assert!(watch.wait_for(|p| !p.online).await.is_some());
    }

    #[tokio::test]
    async fn test_later_write_with_older_stamp_applies() {
        let (store, observer) = setup();
        let subject = SubjectId::new();
        let mut watch = observer.observe(Some(subject));
        settled(&mut watch).await;

        let now = Utc::now();
        store.upsert(&row(subject, true, now)).await.unwrap();
        assert!(watch.wait_for(|p| p.online).await.is_some());

        // A second session with a slower clock signs off.
        store
            .upsert(&row(subject, false, now - chrono::Duration::seconds(1)))
            .await
            .unwrap();
        assert!(watch.wait_for(|p| !p.online).await.is_some());
        assert!(!observer.check(subject).await.unwrap());
        assert!(!store.find(subject).await.unwrap().unwrap().is_online);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ages_out_without_further_writes() {
        let (store, observer) = setup();
        let subject = SubjectId::new();
        store.upsert(&row(subject, true, aged(110))).await.unwrap();

        let mut watch = observer.observe(Some(subject));
        assert!(settled(&mut watch).await.online);

        time::sleep(Duration::from_secs(11)).await;
        assert!(!watch.current().online);
    }

    #[tokio::test]
    async fn test_cancel_freezes_state() {
        let (store, observer) = setup();
        let subject = SubjectId::new();
        let mut watch = observer.observe(Some(subject));
        settled(&mut watch).await;

        watch.cancel();
        watch.cancel();
        assert!(watch.is_cancelled());

        store.upsert(&row(subject, true, Utc::now())).await.unwrap();
        tokio::task::yield_now().await;
        assert!(!watch.current().online);
        assert!(watch.changed().await.is_none());
    }
}
