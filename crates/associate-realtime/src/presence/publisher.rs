//! Presence publisher: keeps one subject's row approximately truthful.
//!
//! States: `Unregistered` → `Active` ⇄ `Backgrounded`.
//!
//! - Registering a subject while foregrounded writes online immediately.
//! - Every heartbeat interval the online assertion is repeated, but only
//!   while foregrounded; a tick in the background does nothing.
//! - Background and foreground transitions write offline / online at once.
//! - Stopping or switching subject cancels the timer, detaches from the
//!   lifecycle signal, then writes a final offline.
//!
//! Write failures are logged and counted, never returned and never retried;
//! the heartbeat keeps going.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use associate_core::types::SubjectId;
use associate_entity::{PresenceRecord, SubjectKind};

use crate::metrics::PresenceMetrics;
use crate::store::PresenceStore;

use super::lifecycle::AppLifecycle;

/// Who the publisher speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceIdentity {
    /// The signed-in subject.
    pub subject_id: SubjectId,
    /// Regular user or advisor.
    pub kind: SubjectKind,
    /// Advisor category; ignored for regular users.
    pub category: Option<String>,
}

impl PresenceIdentity {
    /// A regular user.
    pub fn user(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            kind: SubjectKind::Regular,
            category: None,
        }
    }

    /// An advisor listed under `category`.
    pub fn advisor(subject_id: SubjectId, category: impl Into<String>) -> Self {
        Self {
            subject_id,
            kind: SubjectKind::Advisor,
            category: Some(category.into()),
        }
    }

    fn record(&self, is_online: bool, at: DateTime<Utc>) -> PresenceRecord {
        PresenceRecord::new(self.subject_id, self.kind, is_online, at, self.category.clone())
    }
}

/// Publisher state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherState {
    /// No subject; nothing is written.
    Unregistered,
    /// Foregrounded; heartbeat writes online.
    Active,
    /// Backgrounded; marked offline, heartbeat idle.
    Backgrounded,
}

/// Strictly increasing timestamps for one publisher.
#[derive(Debug, Default)]
struct StampSource {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl StampSource {
    fn next(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        // Postgres keeps microseconds, so bump by one when the clock stalls.
        let stamp = match *last {
            Some(prev) if now <= prev => prev + chrono::Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

/// Issues upserts for one identity.
#[derive(Debug)]
struct PresenceWriter {
    store: Arc<dyn PresenceStore>,
    identity: PresenceIdentity,
    stamps: StampSource,
    metrics: Arc<PresenceMetrics>,
}

impl PresenceWriter {
    async fn assert(&self, is_online: bool) {
        let record = self.identity.record(is_online, self.stamps.next());
        match self.store.upsert(&record).await {
            Ok(()) => {
                self.metrics.record_write(true);
                tracing::debug!(
                    subject_id = %record.subject_id,
                    is_online,
                    last_active_at = %record.last_active_at,
                    "Presence asserted"
                );
            }
            Err(e) => {
                self.metrics.record_write(false);
                tracing::warn!(
                    subject_id = %record.subject_id,
                    is_online,
                    error = %e,
                    "Presence write failed"
                );
            }
        }
    }
}

/// A registered subject's running heartbeat.
#[derive(Debug)]
struct PublisherSession {
    writer: Arc<PresenceWriter>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Publishes one subject's presence from a client process.
#[derive(Debug)]
pub struct PresencePublisher {
    store: Arc<dyn PresenceStore>,
    lifecycle: watch::Receiver<AppLifecycle>,
    interval: Duration,
    metrics: Arc<PresenceMetrics>,
    state: Arc<watch::Sender<PublisherState>>,
    session: Option<PublisherSession>,
}

impl PresencePublisher {
    /// Create an unregistered publisher.
    pub fn new(
        store: Arc<dyn PresenceStore>,
        lifecycle: watch::Receiver<AppLifecycle>,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(PublisherState::Unregistered);
        Self {
            store,
            lifecycle,
            interval,
            metrics: Arc::new(PresenceMetrics::new()),
            state: Arc::new(state),
            session: None,
        }
    }

    /// Report writes into shared counters.
    pub fn with_metrics(mut self, metrics: Arc<PresenceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Current state.
    pub fn state(&self) -> PublisherState {
        *self.state.borrow()
    }

    /// Follow state changes.
    pub fn watch_state(&self) -> watch::Receiver<PublisherState> {
        self.state.subscribe()
    }

    /// The registered identity, if any.
    pub fn identity(&self) -> Option<&PresenceIdentity> {
        self.session.as_ref().map(|s| &s.writer.identity)
    }

    /// Register `identity`, replacing any current subject.
    ///
    /// Passing the current identity again is a no-op. Passing `None` tears
    /// down like [`Self::stop`]. When the process is foregrounded the initial
    /// online write has completed by the time this returns.
    pub async fn set_subject(&mut self, identity: Option<PresenceIdentity>) {
        if self.identity() == identity.as_ref() {
            return;
        }
        self.stop().await;

        let Some(identity) = identity else {
            return;
        };

        let writer = Arc::new(PresenceWriter {
            store: Arc::clone(&self.store),
            identity,
            stamps: StampSource::default(),
            metrics: Arc::clone(&self.metrics),
        });

        let mut lifecycle = self.lifecycle.clone();
        let foreground = lifecycle.borrow_and_update().is_foreground();
        if foreground {
            writer.assert(true).await;
            self.state.send_replace(PublisherState::Active);
        } else {
            self.state.send_replace(PublisherState::Backgrounded);
        }

        tracing::info!(
            subject_id = %writer.identity.subject_id,
            kind = %writer.identity.kind,
            interval_secs = self.interval.as_secs_f64(),
            foreground,
            "Presence publisher started"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(
            Arc::clone(&writer),
            lifecycle,
            self.interval,
            Arc::clone(&self.state),
            cancel.clone(),
            foreground,
        ));

        self.session = Some(PublisherSession {
            writer,
            cancel,
            task,
        });
    }

    /// Cancel the heartbeat and lifecycle listener, then write offline.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.cancel.cancel();
        if let Err(e) = session.task.await {
            if e.is_panic() {
                tracing::error!(
                    subject_id = %session.writer.identity.subject_id,
                    "Presence heartbeat task panicked"
                );
            }
        }

        session.writer.assert(false).await;
        self.state.send_replace(PublisherState::Unregistered);

        tracing::info!(
            subject_id = %session.writer.identity.subject_id,
            "Presence publisher stopped"
        );
    }
}

impl Drop for PresencePublisher {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.cancel.cancel();

        // Best effort: without a runtime there is nobody to write offline,
        // and the freshness window takes over.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = session.task.await;
                session.writer.assert(false).await;
            });
        }
    }
}

/// Heartbeat and lifecycle loop for one session.
async fn run_heartbeat(
    writer: Arc<PresenceWriter>,
    mut lifecycle: watch::Receiver<AppLifecycle>,
    period: Duration,
    state: Arc<watch::Sender<PublisherState>>,
    cancel: CancellationToken,
    mut foreground: bool,
) {
    let mut heartbeat = time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lifecycle_open = true;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            changed = lifecycle.changed(), if lifecycle_open => {
                if changed.is_err() {
                    tracing::debug!(
                        subject_id = %writer.identity.subject_id,
                        "Lifecycle signal closed, heartbeat continues"
                    );
                    lifecycle_open = false;
                    continue;
                }

                let next = lifecycle.borrow_and_update().is_foreground();
                if next == foreground {
                    continue;
                }
                foreground = next;

                writer.assert(foreground).await;
                state.send_replace(if foreground {
                    PublisherState::Active
                } else {
                    PublisherState::Backgrounded
                });
            }

            _ = heartbeat.tick() => {
                if foreground {
                    writer.assert(true).await;
                } else {
                    tracing::trace!(
                        subject_id = %writer.identity.subject_id,
                        "Heartbeat skipped while backgrounded"
                    );
                }
            }
        }
    }
}
