//! Online advisors for a category.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use associate_core::config::AppConfig;
use associate_core::error::AppError;
use associate_entity::AdvisorPresence;

use crate::output::{self, OutputFormat};

/// Arguments for the cohort command
#[derive(Debug, Args)]
pub struct CohortArgs {
    /// Advisor category
    pub category: String,

    /// Keep the list updated until Ctrl-C
    #[arg(short, long)]
    pub watch: bool,
}

/// Advisor display row
#[derive(Debug, Serialize, Tabled)]
struct AdvisorRow {
    /// Subject ID
    subject: String,
    /// Display name
    name: String,
    /// Experience blurb
    experience: String,
    /// Avatar source
    avatar: String,
    /// Last assertion time
    last_active: String,
}

impl From<&AdvisorPresence> for AdvisorRow {
    fn from(advisor: &AdvisorPresence) -> Self {
        Self {
            subject: advisor.subject_id().to_string(),
            name: advisor.display_name(),
            experience: advisor
                .profile
                .as_ref()
                .and_then(|p| p.experience.clone())
                .unwrap_or_else(|| "-".to_string()),
            avatar: advisor.avatar().source().to_string(),
            last_active: super::format_time(advisor.presence.last_active_at),
        }
    }
}

fn rows(advisors: &[AdvisorPresence]) -> Vec<AdvisorRow> {
    advisors.iter().map(AdvisorRow::from).collect()
}

/// Execute the cohort command
pub async fn execute(
    args: &CohortArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let engine = super::start_engine(config).await?;
    let observer = engine.cohort_observer();

    if !args.watch {
        let advisors = observer.fetch(&args.category).await;
        engine.shutdown().await?;
        output::print_list(&rows(&advisors?), format);
        return Ok(());
    }

    let mut watch = observer.observe(args.category.clone());
    let initial = watch.current();
    if !initial.loading {
        output::print_event(&rows(&initial.advisors), format);
    }

    loop {
        tokio::select! {
            signal = super::ctrl_c() => {
                signal?;
                break;
            }
            snapshot = watch.changed() => match snapshot {
                Some(snapshot) if !snapshot.loading => {
                    if format == OutputFormat::Table {
                        output::print_kv("category", &snapshot.category);
                        output::print_kv("online", &snapshot.advisors.len().to_string());
                    }
                    output::print_event(&rows(&snapshot.advisors), format);
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    watch.cancel();
    engine.shutdown().await
}
