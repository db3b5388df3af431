//! CLI command definitions and dispatch.

pub mod cohort;
pub mod heartbeat;
pub mod migrate;
pub mod status;
pub mod watch;

use clap::{Parser, Subcommand};

use associate_core::config::AppConfig;
use associate_core::error::AppError;
use associate_realtime::PresenceEngine;

use crate::output::OutputFormat;

/// Associate — live presence for users and advisors
#[derive(Debug, Parser)]
#[command(name = "associate", version, about, long_about = None)]
pub struct Cli {
    /// Configuration overlay to load on top of config/default (config/{env})
    #[arg(short, long, env = "ASSOCIATE_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply database migrations
    Migrate(migrate::MigrateArgs),
    /// Show whether a subject is online right now
    Status(status::StatusArgs),
    /// Follow a subject's presence until Ctrl-C
    Watch(watch::WatchArgs),
    /// List online advisors of a category
    Cohort(cohort::CohortArgs),
    /// Publish presence for a subject until Ctrl-C
    Heartbeat(heartbeat::HeartbeatArgs),
}

impl Cli {
    /// Load the configuration selected by `--env`.
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load(&self.env)
    }

    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, config).await,
            Commands::Status(args) => status::execute(args, config, self.format).await,
            Commands::Watch(args) => watch::execute(args, config, self.format).await,
            Commands::Cohort(args) => cohort::execute(args, config, self.format).await,
            Commands::Heartbeat(args) => heartbeat::execute(args, config).await,
        }
    }
}

/// Helper: start the presence engine for the configured provider
pub async fn start_engine(config: &AppConfig) -> Result<PresenceEngine, AppError> {
    let engine = PresenceEngine::start(config).await?;
    tracing::debug!(provider = %engine.provider(), "Presence engine ready");
    Ok(engine)
}

/// Helper: resolve when the user presses Ctrl-C
pub async fn ctrl_c() -> Result<(), AppError> {
    tokio::signal::ctrl_c().await.map_err(AppError::from)
}

/// Helper: short display form for timestamps
pub fn format_time(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_cohort_with_watch() {
        let cli = Cli::try_parse_from([
            "associate",
            "--format",
            "json",
            "cohort",
            "finance",
            "--watch",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Cohort(args) => {
                assert_eq!(args.category, "finance");
                assert!(args.watch);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_heartbeat_rejects_bad_subject() {
        let parsed = Cli::try_parse_from([
            "associate",
            "heartbeat",
            "--subject",
            "not-a-uuid",
            "--kind",
            "user",
        ]);
        assert!(parsed.is_err());
    }
}
