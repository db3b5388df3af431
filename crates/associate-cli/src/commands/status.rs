//! One-shot presence verdict for a subject.

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use associate_core::config::AppConfig;
use associate_core::error::AppError;
use associate_core::types::SubjectId;
use associate_entity::{Freshness, PresenceRecord};
use associate_realtime::{PresenceIndicator, SubjectPresence};

use crate::output::{self, OutputFormat};

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Subject ID (UUID)
    pub subject: SubjectId,
}

/// Presence display row
#[derive(Debug, Serialize, Tabled)]
pub struct PresenceRow {
    /// Subject ID
    pub subject: String,
    /// Fresh-online verdict
    pub online: bool,
    /// Indicator label
    pub indicator: String,
    /// Stored flag, before freshness
    pub stored_flag: String,
    /// Last assertion time
    pub last_active: String,
}

impl PresenceRow {
    /// Judge the stored record at `now`, so the verdict and the stored
    /// columns come from the same read.
    pub fn evaluate(
        subject: SubjectId,
        record: Option<&PresenceRecord>,
        freshness: &Freshness,
        now: DateTime<Utc>,
    ) -> Self {
        let online = record.is_some_and(|r| r.is_online_at(now, freshness));
        Self::new(subject, online, record)
    }

    /// Build a row from a verdict and the stored record, if any.
    pub fn new(subject: SubjectId, online: bool, record: Option<&PresenceRecord>) -> Self {
        let indicator = PresenceIndicator::from_subject(&SubjectPresence {
            subject_id: Some(subject),
            loading: false,
            online,
        });
        Self {
            subject: subject.to_string(),
            online,
            indicator: indicator.to_string(),
            stored_flag: record
                .map(|r| if r.is_online { "online" } else { "offline" })
                .unwrap_or("-")
                .to_string(),
            last_active: record
                .map(|r| super::format_time(r.last_active_at))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Execute the status command
pub async fn execute(
    args: &StatusArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let engine = super::start_engine(config).await?;

    let result = async {
        let record = engine.store().find(args.subject).await?;
        Ok::<_, AppError>(PresenceRow::evaluate(
            args.subject,
            record.as_ref(),
            &engine.freshness(),
            Utc::now(),
        ))
    }
    .await;

    engine.shutdown().await?;
    output::print_list(&[result?], format);
    Ok(())
}
