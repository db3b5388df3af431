//! Database migration command.

use clap::Args;

use associate_core::config::AppConfig;
use associate_core::error::AppError;
use associate_database::DatabasePool;
use associate_database::migration::{NotifyTrigger, notify_trigger, run_migrations};

use crate::output;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Only check connectivity and the notify trigger, do not apply anything
    #[arg(long)]
    pub check: bool,
}

/// Apply pending migrations to the configured database
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    let database = DatabasePool::connect(&config.database).await?;

    if args.check {
        let checked = check(&database, &config.presence.notify_channel).await;
        database.close().await;
        return checked;
    }

    println!("Running database migrations...");
    let result = run_migrations(database.pool()).await;
    database.close().await;
    result?;

    output::print_success("All migrations applied successfully.");
    Ok(())
}

async fn check(database: &DatabasePool, channel: &str) -> Result<(), AppError> {
    let latency = database.ping().await?;
    output::print_kv("Latency", &format!("{} ms", latency.as_millis()));
    output::print_kv("Channel", channel);

    match notify_trigger(database.pool(), channel).await? {
        NotifyTrigger::Matches => output::print_success("Database reachable, notify trigger matches."),
        NotifyTrigger::Missing => {
            output::print_warning("Notify trigger not installed; run `associate migrate`.")
        }
        NotifyTrigger::OtherChannel => output::print_warning(
            "Notify trigger publishes on a different channel than presence.notify_channel.",
        ),
    }
    Ok(())
}
