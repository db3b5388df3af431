//! Presence heartbeat and freshness configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Presence publisher / observer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Seconds between online re-assertions while foregrounded.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Age in seconds after which an online flag is read as offline.
    #[serde(default = "default_freshness_window")]
    pub freshness_window_seconds: u64,
    /// PostgreSQL notification channel carrying presence row changes.
    #[serde(default = "default_notify_channel")]
    pub notify_channel: String,
}

impl PresenceConfig {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    /// Freshness window as a [`Duration`].
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_seconds)
    }

    /// Reject settings the heartbeat timer and listener cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.heartbeat_interval_seconds == 0 {
            return Err(AppError::configuration(
                "presence.heartbeat_interval_seconds must be at least 1",
            ));
        }
        if self.freshness_window_seconds == 0 {
            return Err(AppError::configuration(
                "presence.freshness_window_seconds must be at least 1",
            ));
        }
        if self.notify_channel.trim().is_empty() {
            return Err(AppError::configuration(
                "presence.notify_channel must not be empty",
            ));
        }
        Ok(())
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            freshness_window_seconds: default_freshness_window(),
            notify_channel: default_notify_channel(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_freshness_window() -> u64 {
    120
}

fn default_notify_channel() -> String {
    "presence_status_changes".to_string()
}
