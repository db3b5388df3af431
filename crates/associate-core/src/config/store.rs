//! Presence store provider configuration.

use serde::{Deserialize, Serialize};

/// Which backend holds presence rows and delivers change notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// PostgreSQL tables plus `LISTEN/NOTIFY` for changes.
    #[default]
    Postgres,
    /// Process-local store; rows vanish on exit.
    Memory,
}

impl std::fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Store selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Provider type: `"postgres"` or `"memory"`.
    #[serde(default)]
    pub provider: StoreProvider,
}
