//! Profile attributes shown next to presence.

use serde::{Deserialize, Serialize};

use associate_core::types::SubjectId;

use crate::presence::PresenceRecord;

/// Gender as recorded on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Any other or undisclosed value.
    Other,
}

impl Gender {
    /// Parse a stored column value. Unknown values map to [`Gender::Other`].
    pub fn from_column(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "male" | "m" => Self::Male,
            "female" | "f" => Self::Female,
            _ => Self::Other,
        }
    }
}

/// What picture to show for a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "url", rename_all = "snake_case")]
pub enum Avatar {
    /// The profile's uploaded image.
    Image(String),
    /// Built-in male placeholder.
    DefaultMale,
    /// Built-in female placeholder.
    DefaultFemale,
    /// Built-in neutral placeholder.
    DefaultNeutral,
}

impl Avatar {
    /// Asset name or URL to render.
    pub fn source(&self) -> &str {
        match self {
            Self::Image(url) => url,
            Self::DefaultMale => "avatar-default-male.png",
            Self::DefaultFemale => "avatar-default-female.png",
            Self::DefaultNeutral => "avatar-default.png",
        }
    }
}

/// The subset of a profile needed to list an advisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// Profile primary key.
    pub subject_id: SubjectId,
    /// Name shown in lists.
    pub display_name: String,
    /// Uploaded profile image, if any.
    pub image_url: Option<String>,
    /// Free-form experience summary ("8 years", "CPA since 2012").
    pub experience: Option<String>,
    /// Recorded gender, if any.
    pub gender: Option<Gender>,
}

impl ProfileSummary {
    /// Resolve the picture: an uploaded image wins, otherwise a gender default.
    pub fn avatar(&self) -> Avatar {
        match self.image_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Avatar::Image(url.to_string()),
            _ => match self.gender {
                Some(Gender::Male) => Avatar::DefaultMale,
                Some(Gender::Female) => Avatar::DefaultFemale,
                Some(Gender::Other) | None => Avatar::DefaultNeutral,
            },
        }
    }
}

/// An online advisor with their profile attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorPresence {
    /// The presence row.
    pub presence: PresenceRecord,
    /// The joined profile; absent if the profile row is missing.
    pub profile: Option<ProfileSummary>,
}

impl AdvisorPresence {
    /// Subject of the row.
    pub fn subject_id(&self) -> SubjectId {
        self.presence.subject_id
    }

    /// Display name, falling back to the subject id.
    pub fn display_name(&self) -> String {
        self.profile
            .as_ref()
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| self.presence.subject_id.to_string())
    }

    /// Picture to show.
    pub fn avatar(&self) -> Avatar {
        self.profile
            .as_ref()
            .map(ProfileSummary::avatar)
            .unwrap_or(Avatar::DefaultNeutral)
    }
}
