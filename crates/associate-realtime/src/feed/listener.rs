//! PostgreSQL `LISTEN/NOTIFY` bridge into the in-process feed.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::watch;

use associate_core::error::{AppError, ErrorKind};
use associate_core::result::AppResult;
use associate_entity::PresenceChange;

use super::ChangeFeed;

/// Pause after a failed `recv` before polling again.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Relays `presence_status` trigger notifications into a [`ChangeFeed`].
#[derive(Debug)]
pub struct PgChangeListener {
    pool: PgPool,
    channel: String,
    feed: Arc<dyn ChangeFeed>,
}

impl PgChangeListener {
    /// Create a listener for `channel`.
    pub fn new(pool: PgPool, channel: impl Into<String>, feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            pool,
            channel: channel.into(),
            feed,
        }
    }

    /// Listen until `shutdown` flips to `true`.
    ///
    /// Notifications lost while the connection is re-established are not
    /// recovered; observers self-correct on the next change or freshness expiry.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> AppResult<()> {
        let mut listener = PgListener::connect_with(&self.pool).await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to open notification listener", e)
        })?;

        listener.listen(&self.channel).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to LISTEN on '{}'", self.channel),
                e,
            )
        })?;

        tracing::info!(channel = %self.channel, "Listening for presence changes");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = listener.recv() => match received {
                    Ok(notification) => self.relay(notification.payload()),
                    Err(e) => {
                        tracing::warn!(channel = %self.channel, error = %e, "Notification listener error, reconnecting");
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                    }
                },
            }
        }

        tracing::info!(channel = %self.channel, "Presence change listener stopped");
        Ok(())
    }

    fn relay(&self, payload: &str) {
        match parse_payload(payload) {
            Ok(change) => {
                self.feed.publish(change);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed presence notification");
            }
        }
    }
}

/// Validate a trigger payload into a typed change event.
pub fn parse_payload(payload: &str) -> AppResult<PresenceChange> {
    serde_json::from_str(payload).map_err(AppError::from)
}
