//! Read-time staleness rule for online flags.

use chrono::{DateTime, Duration, Utc};

/// Default freshness window: two minutes.
pub const DEFAULT_FRESHNESS_SECONDS: i64 = 120;

/// The window within which a stored online flag is believed.
///
/// The store never expires rows; a client that dies without writing
/// offline stays "online" on disk until readers apply this rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    window: Duration,
}

impl Freshness {
    /// Create a rule with the given window.
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Create a rule from a std duration; out-of-range values clamp to a century.
    pub fn from_std(window: std::time::Duration) -> Self {
        Self::new(Duration::from_std(window).unwrap_or_else(|_| Duration::days(36_500)))
    }

    /// The window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Oldest `last_active_at` still admitted by cohort queries at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    /// Whether an assertion made at `last_active` is still fresh at `now`.
    ///
    /// Strict: an assertion exactly one window old is stale.
    pub fn admits(&self, last_active: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        last_active > self.cutoff(now)
    }
}

impl Default for Freshness {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_FRESHNESS_SECONDS))
    }
}
