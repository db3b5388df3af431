//! Run a presence publisher from the terminal.
//!
//! Lines on stdin drive the lifecycle (`background` / `foreground`);
//! Ctrl-C stops the publisher with a final offline write.

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use associate_core::config::AppConfig;
use associate_core::error::AppError;
use associate_core::types::SubjectId;
use associate_entity::SubjectKind;
use associate_realtime::{AppLifecycle, PresenceIdentity};

use crate::output;

/// Arguments for the heartbeat command
#[derive(Debug, Args)]
pub struct HeartbeatArgs {
    /// Subject ID (UUID)
    #[arg(short, long)]
    pub subject: SubjectId,

    /// Subject kind: `user` or `advisor`
    #[arg(short, long, default_value = "user")]
    pub kind: SubjectKind,

    /// Advisor category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Start backgrounded
    #[arg(long)]
    pub background: bool,
}

impl HeartbeatArgs {
    /// Validate the flags into a publisher identity.
    pub fn identity(&self) -> Result<PresenceIdentity, AppError> {
        match self.kind {
            SubjectKind::Advisor => {
                let category = self
                    .category
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| AppError::validation("Advisors need a --category"))?;
                Ok(PresenceIdentity::advisor(self.subject, category))
            }
            SubjectKind::Regular => {
                if self.category.is_some() {
                    output::print_warning("--category is ignored for regular users");
                }
                Ok(PresenceIdentity::user(self.subject))
            }
        }
    }
}

/// Execute the heartbeat command
pub async fn execute(args: &HeartbeatArgs, config: &AppConfig) -> Result<(), AppError> {
    let identity = args.identity()?;
    let engine = super::start_engine(config).await?;

    let initial = if args.background {
        AppLifecycle::Background
    } else {
        AppLifecycle::Foreground
    };
    let (lifecycle, lifecycle_rx) = AppLifecycle::channel(initial);
    let mut publisher = engine.publisher(lifecycle_rx);
    let mut state = publisher.watch_state();

    publisher.set_subject(Some(identity)).await;
    output::print_kv("subject", &args.subject.to_string());
    output::print_kv("state", &format!("{:?}", publisher.state()));
    println!("Type 'background' or 'foreground'; Ctrl-C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let outcome = loop {
        tokio::select! {
            signal = super::ctrl_c() => break signal,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<AppLifecycle>() {
                    Ok(next) => {
                        lifecycle.send_replace(next);
                    }
                    Err(e) => output::print_warning(&e.to_string()),
                },
                Ok(None) => {
                    tracing::debug!("stdin closed, waiting for Ctrl-C");
                    stdin_open = false;
                }
                Err(e) => break Err(AppError::from(e)),
            },
            changed = state.changed() => {
                if changed.is_ok() {
                    output::print_kv("state", &format!("{:?}", *state.borrow_and_update()));
                }
            }
        }
    };

    publisher.stop().await;
    output::print_success("Presence publisher stopped (offline written).");
    engine.shutdown().await?;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(kind: SubjectKind, category: Option<&str>) -> HeartbeatArgs {
        HeartbeatArgs {
            subject: SubjectId::new(),
            kind,
            category: category.map(String::from),
            background: false,
        }
    }

    #[test]
    fn test_advisor_requires_category() {
        let err = args(SubjectKind::Advisor, None).identity().unwrap_err();
        assert_eq!(err.kind, associate_core::error::ErrorKind::Validation);
        assert!(args(SubjectKind::Advisor, Some("  ")).identity().is_err());
    }

    #[test]
    fn test_user_category_is_dropped() {
        let identity = args(SubjectKind::Regular, Some("finance")).identity().unwrap();
        assert_eq!(identity.kind, SubjectKind::Regular);
        assert!(identity.category.is_none());
    }
}
