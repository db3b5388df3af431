//! Top-level presence engine that wires the store, change feed and
//! observers together from configuration.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use associate_core::config::{AppConfig, PresenceConfig, StoreProvider};
use associate_core::result::AppResult;
use associate_database::migration::{NotifyTrigger, notify_trigger};
use associate_database::{DatabasePool, PresenceRepository, ProfileRepository};
use associate_entity::Freshness;

use crate::feed::{ChangeFeed, MemoryChangeFeed, PgChangeListener};
use crate::metrics::PresenceMetrics;
use crate::observer::cohort::CohortObserver;
use crate::observer::subject::SubjectObserver;
use crate::presence::lifecycle::AppLifecycle;
use crate::presence::publisher::PresencePublisher;
use crate::store::{MemoryPresenceStore, PgPresenceStore, PresenceStore};

/// Owns the presence store and change feed for one process.
pub struct PresenceEngine {
    config: PresenceConfig,
    store: Arc<dyn PresenceStore>,
    feed: Arc<dyn ChangeFeed>,
    metrics: Arc<PresenceMetrics>,
    /// Set for the in-memory provider.
    memory: Option<Arc<MemoryPresenceStore>>,
    /// Set for the PostgreSQL provider.
    database: Option<DatabasePool>,
    shutdown_tx: watch::Sender<bool>,
    listener: Mutex<Option<JoinHandle<AppResult<()>>>>,
}

impl std::fmt::Debug for PresenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceEngine")
            .field("provider", &self.provider())
            .field("subscribers", &self.feed.subscriber_count())
            .finish()
    }
}

impl PresenceEngine {
    /// Build the engine for the configured store provider.
    ///
    /// The PostgreSQL provider connects, then starts relaying trigger
    /// notifications into the in-process feed.
    pub async fn start(config: &AppConfig) -> AppResult<Self> {
        match config.store.provider {
            StoreProvider::Memory => Ok(Self::in_memory(config.presence.clone())),
            StoreProvider::Postgres => {
                let database = DatabasePool::connect(&config.database).await?;
                warn_on_trigger_mismatch(&database, &config.presence.notify_channel).await;
                Ok(Self::with_database(database, config.presence.clone()))
            }
        }
    }

    /// Single-process engine over [`MemoryPresenceStore`].
    pub fn in_memory(config: PresenceConfig) -> Self {
        let metrics = Arc::new(PresenceMetrics::new());
        let feed: Arc<dyn ChangeFeed> =
            Arc::new(MemoryChangeFeed::with_metrics(Arc::clone(&metrics)));
        let memory = Arc::new(MemoryPresenceStore::new(Arc::clone(&feed)));
        let (shutdown_tx, _) = watch::channel(false);

        info!("Presence engine initialized with in-memory store");

        Self {
            config,
            store: memory.clone(),
            feed,
            metrics,
            memory: Some(memory),
            database: None,
            shutdown_tx,
            listener: Mutex::new(None),
        }
    }

    /// Engine over an existing PostgreSQL pool.
    pub fn with_database(database: DatabasePool, config: PresenceConfig) -> Self {
        let metrics = Arc::new(PresenceMetrics::new());
        let feed: Arc<dyn ChangeFeed> =
            Arc::new(MemoryChangeFeed::with_metrics(Arc::clone(&metrics)));
        let store = Arc::new(PgPresenceStore::new(PresenceRepository::new(
            database.pool().clone(),
        )));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = PgChangeListener::new(
            database.pool().clone(),
            config.notify_channel.clone(),
            Arc::clone(&feed),
        );
        let handle = tokio::spawn(async move {
            let result = listener.run(shutdown_rx).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Presence change listener failed");
            }
            result
        });

        info!(channel = %config.notify_channel, "Presence engine initialized with PostgreSQL store");

        Self {
            config,
            store,
            feed,
            metrics,
            memory: None,
            database: Some(database),
            shutdown_tx,
            listener: Mutex::new(Some(handle)),
        }
    }

    /// Which provider backs the store.
    pub fn provider(&self) -> StoreProvider {
        if self.database.is_some() {
            StoreProvider::Postgres
        } else {
            StoreProvider::Memory
        }
    }

    pub fn store(&self) -> Arc<dyn PresenceStore> {
        Arc::clone(&self.store)
    }

    pub fn feed(&self) -> Arc<dyn ChangeFeed> {
        Arc::clone(&self.feed)
    }

    pub fn metrics(&self) -> Arc<PresenceMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The in-memory store, when that provider is active.
    pub fn memory_store(&self) -> Option<Arc<MemoryPresenceStore>> {
        self.memory.clone()
    }

    /// The database pool, when the PostgreSQL provider is active.
    pub fn database(&self) -> Option<&DatabasePool> {
        self.database.as_ref()
    }

    /// Profile lookups, when the PostgreSQL provider is active.
    pub fn profiles(&self) -> Option<ProfileRepository> {
        self.database
            .as_ref()
            .map(|db| ProfileRepository::new(db.pool().clone()))
    }

    /// The configured freshness rule.
    pub fn freshness(&self) -> Freshness {
        Freshness::from_std(self.config.freshness_window())
    }

    /// A publisher driven by `lifecycle`, using the configured interval.
    pub fn publisher(&self, lifecycle: watch::Receiver<AppLifecycle>) -> PresencePublisher {
        PresencePublisher::new(self.store(), lifecycle, self.config.heartbeat_interval())
            .with_metrics(self.metrics())
    }

    pub fn subject_observer(&self) -> SubjectObserver {
        SubjectObserver::new(self.store(), self.feed(), self.freshness())
    }

    pub fn cohort_observer(&self) -> CohortObserver {
        CohortObserver::new(self.store(), self.feed(), self.freshness())
            .with_metrics(self.metrics())
    }

    /// Stop the notification listener and close the pool.
    pub async fn shutdown(&self) -> AppResult<()> {
        info!("Shutting down presence engine");

        let _ = self.shutdown_tx.send(true);

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = listener {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "Listener had already failed"),
                Err(e) => tracing::warn!(error = %e, "Listener task did not finish cleanly"),
            }
        }

        if let Some(database) = &self.database {
            database.close().await;
        }

        info!("Presence engine shut down");
        Ok(())
    }
}

/// Live updates only flow when the trigger and the listener agree on the channel.
async fn warn_on_trigger_mismatch(database: &DatabasePool, channel: &str) {
    match notify_trigger(database.pool(), channel).await {
        Ok(NotifyTrigger::Matches) => {}
        Ok(NotifyTrigger::Missing) => {
            tracing::warn!(channel, "Presence notify trigger not installed; run `associate migrate`");
        }
        Ok(NotifyTrigger::OtherChannel) => {
            tracing::warn!(
                channel,
                "Presence notify trigger publishes on a different channel; observers will only see expiry updates"
            );
        }
        Err(e) => tracing::warn!(error = %e, "Could not verify presence notify trigger"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use associate_core::types::SubjectId;
    use associate_entity::{PresenceRecord, SubjectKind};

    use super::*;

    #[tokio::test]
    async fn test_memory_provider_from_config() {
        let config = AppConfig::from_toml("[store]\nprovider = \"memory\"\n").unwrap();
        let engine = PresenceEngine::start(&config).await.unwrap();

        assert_eq!(engine.provider(), StoreProvider::Memory);
        assert!(engine.memory_store().is_some());
        assert!(engine.database().is_none());
        assert!(engine.profiles().is_none());
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_observers_share_the_engine_feed() {
        let engine = PresenceEngine::in_memory(PresenceConfig::default());
        let subject = SubjectId::new();
        let mut watch = engine.subject_observer().observe(Some(subject));
        watch.wait_for(|p| !p.loading).await.unwrap();

        engine
            .store()
            .upsert(&PresenceRecord::new(subject, SubjectKind::Regular, true, Utc::now(), None))
            .await
            .unwrap();

        assert!(watch.wait_for(|p| p.online).await.is_some());
        assert_eq!(engine.metrics().snapshot().writes_succeeded, 0);
        assert!(engine.metrics().snapshot().changes_published >= 1);
    }
}
