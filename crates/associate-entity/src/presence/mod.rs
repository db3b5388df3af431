//! Presence domain entities.

pub mod change;
pub mod freshness;
pub mod model;

pub use change::{ChangeFilter, ChangeOperation, PresenceChange};
pub use freshness::Freshness;
pub use model::PresenceRecord;

use serde::{Deserialize, Serialize};

/// Discriminates regular users from advisors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    /// An end user browsing advisors.
    #[serde(rename = "user")]
    Regular,
    /// A finance, tax, or legal advisor.
    Advisor,
}

impl SubjectKind {
    /// Return the stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "user",
            Self::Advisor => "advisor",
        }
    }
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubjectKind {
    type Err = associate_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::Regular),
            "advisor" => Ok(Self::Advisor),
            _ => Err(associate_core::AppError::validation(format!(
                "Invalid subject kind: '{s}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_kind_column_values() {
        assert_eq!("user".parse::<SubjectKind>().unwrap(), SubjectKind::Regular);
        assert_eq!("Advisor".parse::<SubjectKind>().unwrap(), SubjectKind::Advisor);
        assert!("admin".parse::<SubjectKind>().is_err());
        assert_eq!(SubjectKind::Regular.as_str(), "user");
    }

    #[test]
    fn test_subject_kind_serde_matches_column() {
        let json = serde_json::to_string(&SubjectKind::Regular).unwrap();
        assert_eq!(json, "\"user\"");
        let kind: SubjectKind = serde_json::from_str("\"advisor\"").unwrap();
        assert_eq!(kind, SubjectKind::Advisor);
    }
}
