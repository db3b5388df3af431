//! Change notifications for presence rows.

use serde::{Deserialize, Serialize};

use associate_core::types::SubjectId;

use super::SubjectKind;
use super::model::PresenceRecord;

/// Row operation that produced a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    /// A row was created.
    Insert,
    /// A row was overwritten.
    Update,
    /// A row was removed (profile deleted).
    Delete,
}

/// A change event: the operation plus the row image.
///
/// For deletes the image is the last state of the removed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceChange {
    /// What happened.
    pub operation: ChangeOperation,
    /// The affected row.
    pub record: PresenceRecord,
}

impl PresenceChange {
    /// Create an event.
    pub fn new(operation: ChangeOperation, record: PresenceRecord) -> Self {
        Self { operation, record }
    }

    /// The subject this event concerns.
    pub fn subject_id(&self) -> SubjectId {
        self.record.subject_id
    }
}

/// Selects which change events a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    /// Every presence row.
    All,
    /// One subject's row.
    Subject(SubjectId),
    /// Any row of the given kind.
    Kind(SubjectKind),
}

impl ChangeFilter {
    /// Whether `change` passes this filter.
    pub fn matches(&self, change: &PresenceChange) -> bool {
        match self {
            Self::All => true,
            Self::Subject(id) => change.record.subject_id == *id,
            Self::Kind(kind) => change.record.subject_kind == *kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn change(kind: SubjectKind) -> PresenceChange {
        PresenceChange::new(
            ChangeOperation::Update,
            PresenceRecord::new(SubjectId::new(), kind, true, Utc::now(), Some("tax".into())),
        )
    }

    #[test]
    fn test_filters() {
        let advisor = change(SubjectKind::Advisor);
        let user = change(SubjectKind::Regular);

        assert!(ChangeFilter::All.matches(&user));
        assert!(ChangeFilter::Kind(SubjectKind::Advisor).matches(&advisor));
        assert!(!ChangeFilter::Kind(SubjectKind::Advisor).matches(&user));
        assert!(ChangeFilter::Subject(user.subject_id()).matches(&user));
        assert!(!ChangeFilter::Subject(user.subject_id()).matches(&advisor));
    }

    #[test]
    fn test_notification_payload_shape() {
        let payload = r#"{
            "operation": "DELETE",
            "record": {
                "subject_id": "0b8e3f4e-5d7c-4a3e-8f51-9d3c1b0e2a11",
                "subject_kind": "user",
                "is_online": false,
                "last_active_at": "2026-10-18T10:00:00+00:00",
                "category": null
            }
        }"#;
        let change: PresenceChange = serde_json::from_str(payload).expect("payload");
        assert_eq!(change.operation, ChangeOperation::Delete);
        assert_eq!(change.record.subject_kind, SubjectKind::Regular);
    }
}
