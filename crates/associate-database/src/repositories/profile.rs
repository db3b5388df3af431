//! Profile repository implementation.

use sqlx::{FromRow, PgPool};

use associate_core::error::{AppError, ErrorKind};
use associate_core::result::AppResult;
use associate_core::types::SubjectId;
use associate_entity::{Gender, ProfileSummary};

#[derive(Debug, Clone, FromRow)]
struct ProfileRow {
    subject_id: SubjectId,
    display_name: String,
    image_url: Option<String>,
    experience: Option<String>,
    gender: Option<String>,
}

impl From<ProfileRow> for ProfileSummary {
    fn from(row: ProfileRow) -> Self {
        Self {
            subject_id: row.subject_id,
            display_name: row.display_name,
            image_url: row.image_url,
            experience: row.experience,
            gender: row.gender.as_deref().map(Gender::from_column),
        }
    }
}

/// Read access to `profiles`.
#[derive(Debug, Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new profile repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a profile summary by subject.
    pub async fn find_by_subject(&self, subject_id: SubjectId) -> AppResult<Option<ProfileSummary>> {
        sqlx::query_as::<_, ProfileRow>(
            "SELECT subject_id, display_name, image_url, experience, gender \
             FROM profiles WHERE subject_id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(ProfileSummary::from))
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find profile", e))
    }
}
