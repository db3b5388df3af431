//! Presence repository implementation.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use associate_core::error::{AppError, ErrorKind};
use associate_core::result::AppResult;
use associate_core::types::SubjectId;
use associate_entity::{AdvisorPresence, Gender, PresenceRecord, ProfileSummary, SubjectKind};

/// Raw `presence_status` row before validation.
#[derive(Debug, Clone, FromRow)]
struct PresenceRow {
    subject_id: SubjectId,
    subject_kind: String,
    is_online: bool,
    last_active_at: DateTime<Utc>,
    category: Option<String>,
}

impl TryFrom<PresenceRow> for PresenceRecord {
    type Error = AppError;

    fn try_from(row: PresenceRow) -> Result<Self, Self::Error> {
        let kind: SubjectKind = row.subject_kind.parse()?;
        Ok(PresenceRecord::new(
            row.subject_id,
            kind,
            row.is_online,
            row.last_active_at,
            row.category,
        ))
    }
}

/// Presence row joined with the advisor's profile columns.
#[derive(Debug, Clone, FromRow)]
struct AdvisorRow {
    #[sqlx(flatten)]
    presence: PresenceRow,
    display_name: Option<String>,
    image_url: Option<String>,
    experience: Option<String>,
    gender: Option<String>,
}

impl TryFrom<AdvisorRow> for AdvisorPresence {
    type Error = AppError;

    fn try_from(row: AdvisorRow) -> Result<Self, Self::Error> {
        let presence = PresenceRecord::try_from(row.presence)?;
        let profile = row.display_name.map(|display_name| ProfileSummary {
            subject_id: presence.subject_id,
            display_name,
            image_url: row.image_url,
            experience: row.experience,
            gender: row.gender.as_deref().map(Gender::from_column),
        });
        Ok(AdvisorPresence { presence, profile })
    }
}

/// Repository for `presence_status` reads and upserts.
#[derive(Debug, Clone)]
pub struct PresenceRepository {
    pool: PgPool,
}

impl PresenceRepository {
    /// Create a new presence repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the presence row for a subject.
    pub async fn find_by_subject(&self, subject_id: SubjectId) -> AppResult<Option<PresenceRecord>> {
        let row = sqlx::query_as::<_, PresenceRow>(
            "SELECT subject_id, subject_kind, is_online, last_active_at, category \
             FROM presence_status WHERE subject_id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find presence", e))?;

        row.map(PresenceRecord::try_from).transpose()
    }

    /// Insert or replace the presence row for `record.subject_id`.
    pub async fn upsert(&self, record: &PresenceRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO presence_status \
                (subject_id, subject_kind, is_online, last_active_at, category) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (subject_id) DO UPDATE SET \
                subject_kind = EXCLUDED.subject_kind, \
                is_online = EXCLUDED.is_online, \
                last_active_at = EXCLUDED.last_active_at, \
                category = EXCLUDED.category",
        )
        .bind(record.subject_id)
        .bind(record.subject_kind.as_str())
        .bind(record.is_online)
        .bind(record.last_active_at)
        .bind(record.category.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert presence", e))?;

        Ok(())
    }

    /// Online advisors in `category` whose last assertion is at or after
    /// `active_since`, joined to their profiles. Rows come back in the
    /// table's natural order.
    pub async fn find_online_advisors(
        &self,
        category: &str,
        active_since: DateTime<Utc>,
    ) -> AppResult<Vec<AdvisorPresence>> {
        let rows = sqlx::query_as::<_, AdvisorRow>(
            "SELECT ps.subject_id, ps.subject_kind, ps.is_online, ps.last_active_at, ps.category, \
                    p.display_name, p.image_url, p.experience, p.gender \
             FROM presence_status ps \
             LEFT JOIN profiles p ON p.subject_id = ps.subject_id \
             WHERE ps.subject_kind = 'advisor' \
               AND ps.category = $1 \
               AND ps.is_online = TRUE \
               AND ps.last_active_at >= $2",
        )
        .bind(category)
        .bind(active_since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list online advisors", e)
        })?;

        rows.into_iter().map(AdvisorPresence::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: &str, category: Option<&str>) -> PresenceRow {
        PresenceRow {
            subject_id: SubjectId::new(),
            subject_kind: kind.to_string(),
            is_online: true,
            last_active_at: Utc::now(),
            category: category.map(str::to_string),
        }
    }

    #[test]
    fn test_row_with_unknown_kind_is_rejected() {
        let err = PresenceRecord::try_from(row("moderator", None)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_advisor_row_without_profile() {
        let advisor = AdvisorPresence::try_from(AdvisorRow {
            presence: row("advisor", Some("finance")),
            display_name: None,
            image_url: Some("ignored.png".into()),
            experience: None,
            gender: None,
        })
        .expect("valid row");
        assert!(advisor.profile.is_none());
        assert_eq!(advisor.presence.category.as_deref(), Some("finance"));
    }

    #[test]
    fn test_advisor_row_with_profile() {
        let advisor = AdvisorPresence::try_from(AdvisorRow {
            presence: row("advisor", Some("tax")),
            display_name: Some("Priya Natarajan".into()),
            image_url: None,
            experience: Some("CPA, 9 years".into()),
            gender: Some("female".into()),
        })
        .expect("valid row");
        let profile = advisor.profile.expect("profile joined");
        assert_eq!(profile.gender, Some(Gender::Female));
        assert_eq!(profile.subject_id, advisor.presence.subject_id);
    }
}
