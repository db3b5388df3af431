//! Presence row model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use associate_core::types::SubjectId;

use super::SubjectKind;
use super::freshness::Freshness;

/// One row of the `presence_status` table.
///
/// There is exactly one record per subject; writes replace it wholesale.
/// `is_online` is only trustworthy together with `last_active_at`, see
/// [`PresenceRecord::is_online_at`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordFields")]
pub struct PresenceRecord {
    /// The profile this row belongs to.
    pub subject_id: SubjectId,
    /// Regular user or advisor.
    pub subject_kind: SubjectKind,
    /// Stored online flag.
    pub is_online: bool,
    /// Time of the last assertion.
    pub last_active_at: DateTime<Utc>,
    /// Advisor area of expertise (`finance`, `tax`, ...).
    pub category: Option<String>,
}

/// Wire shape of a record; deserialization goes through [`PresenceRecord::new`].
#[derive(Deserialize)]
struct RecordFields {
    subject_id: SubjectId,
    subject_kind: SubjectKind,
    is_online: bool,
    last_active_at: DateTime<Utc>,
    #[serde(default)]
    category: Option<String>,
}

impl From<RecordFields> for PresenceRecord {
    fn from(fields: RecordFields) -> Self {
        Self::new(
            fields.subject_id,
            fields.subject_kind,
            fields.is_online,
            fields.last_active_at,
            fields.category,
        )
    }
}

impl PresenceRecord {
    /// Build a record, dropping the category for non-advisors.
    pub fn new(
        subject_id: SubjectId,
        subject_kind: SubjectKind,
        is_online: bool,
        last_active_at: DateTime<Utc>,
        category: Option<String>,
    ) -> Self {
        let category = match subject_kind {
            SubjectKind::Advisor => category.filter(|c| !c.trim().is_empty()),
            SubjectKind::Regular => None,
        };
        Self {
            subject_id,
            subject_kind,
            is_online,
            last_active_at,
            category,
        }
    }

    /// Whether the subject counts as online at `now`.
    pub fn is_online_at(&self, now: DateTime<Utc>, freshness: &Freshness) -> bool {
        self.is_online && freshness.admits(self.last_active_at, now)
    }

    /// Whether this row belongs to the advisor cohort for `category`.
    pub fn in_cohort(&self, category: &str) -> bool {
        self.subject_kind == SubjectKind::Advisor && self.category.as_deref() == Some(category)
    }
}
