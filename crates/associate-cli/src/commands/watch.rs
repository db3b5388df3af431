//! Live presence for one subject.

use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use associate_core::config::AppConfig;
use associate_core::error::AppError;
use associate_core::types::SubjectId;
use associate_realtime::{PresenceIndicator, SubjectPresence};

use crate::output::{self, OutputFormat};

/// Arguments for the watch command
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Subject ID (UUID)
    pub subject: SubjectId,
}

/// One observed verdict
#[derive(Debug, Serialize, Tabled)]
struct WatchRow {
    /// When the verdict was observed
    at: String,
    /// Subject ID
    subject: String,
    /// Indicator label
    indicator: String,
}

impl WatchRow {
    fn new(subject: SubjectId, presence: &SubjectPresence) -> Self {
        let indicator = PresenceIndicator::from_subject(presence);
        Self {
            at: super::format_time(Utc::now()),
            subject: subject.to_string(),
            indicator: if indicator.is_visible() {
                indicator.to_string()
            } else {
                "Loading".to_string()
            },
        }
    }
}

/// Execute the watch command
pub async fn execute(
    args: &WatchArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let engine = super::start_engine(config).await?;
    let mut watch = engine.subject_observer().observe(Some(args.subject));

    output::print_event(&[WatchRow::new(args.subject, &watch.current())], format);

    loop {
        tokio::select! {
            signal = super::ctrl_c() => {
                signal?;
                break;
            }
            presence = watch.changed() => match presence {
                Some(presence) => {
                    output::print_event(&[WatchRow::new(args.subject, &presence)], format);
                }
                None => break,
            },
        }
    }

    watch.cancel();
    engine.shutdown().await
}
