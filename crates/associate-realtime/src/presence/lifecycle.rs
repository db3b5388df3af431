//! Foreground/background state of the client process.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use associate_core::AppError;

/// Whether the client is in front of the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycle {
    /// Visible and interactive.
    #[default]
    Foreground,
    /// Backgrounded or inactive.
    Background,
}

impl AppLifecycle {
    /// Whether heartbeats should be sent.
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Foreground)
    }

    /// Create a lifecycle signal starting in `initial`.
    ///
    /// The sender belongs to whatever observes the platform's app state;
    /// receivers are handed to publishers.
    pub fn channel(initial: Self) -> (watch::Sender<Self>, watch::Receiver<Self>) {
        watch::channel(initial)
    }
}

impl std::str::FromStr for AppLifecycle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "foreground" | "active" | "fg" => Ok(Self::Foreground),
            "background" | "inactive" | "bg" => Ok(Self::Background),
            other => Err(AppError::validation(format!(
                "Unknown lifecycle state: '{other}'"
            ))),
        }
    }
}
