//! Database migration runner.

use sqlx::PgPool;
use tracing::info;

use associate_core::error::{AppError, ErrorKind};

/// Run all pending database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Running database migrations...");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// Trigger function that publishes `presence_status` changes.
pub const NOTIFY_FUNCTION: &str = "notify_presence_status_change";

/// Whether the installed trigger publishes where the listener listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyTrigger {
    /// Migrations have not installed the trigger function.
    Missing,
    /// The trigger publishes on the expected channel.
    Matches,
    /// The trigger publishes elsewhere; live updates will not arrive.
    OtherChannel,
}

/// Inspect the installed trigger function for `channel`.
pub async fn notify_trigger(pool: &PgPool, channel: &str) -> Result<NotifyTrigger, AppError> {
    let source: Option<String> =
        sqlx::query_scalar("SELECT prosrc FROM pg_proc WHERE proname = $1 LIMIT 1")
            .bind(NOTIFY_FUNCTION)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to inspect notify trigger", e)
            })?;

    Ok(match source {
        None => NotifyTrigger::Missing,
        Some(body) if publishes_on(&body, channel) => NotifyTrigger::Matches,
        Some(_) => NotifyTrigger::OtherChannel,
    })
}

fn publishes_on(function_body: &str, channel: &str) -> bool {
    function_body.contains(&format!("'{channel}'"))
}

#[cfg(test)]
mod tests {
    use associate_core::config::PresenceConfig;

    use super::*;

    const BODY: &str = include_str!("../../../migrations/20260101000002_presence_status.sql");

    #[test]
    fn test_shipped_trigger_uses_default_channel() {
        assert!(publishes_on(BODY, &PresenceConfig::default().notify_channel));
        assert!(!publishes_on(BODY, "presence"));
        assert!(!publishes_on(BODY, "advisor_changes"));
    }
}
