//! Presence indicator derived from observer output.

use serde::{Deserialize, Serialize};

use super::subject::SubjectPresence;

/// What a presence dot should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceIndicator {
    /// Nothing to show: no subject, or the first read is pending.
    Hidden,
    Online,
    Offline,
}

impl PresenceIndicator {
    /// Map a single-subject verdict.
    pub fn from_subject(presence: &SubjectPresence) -> Self {
        if presence.subject_id.is_none() || presence.loading {
            Self::Hidden
        } else {
            Self::from_online(presence.online)
        }
    }

    /// Map a bare verdict, e.g. for a cohort member (always online).
    pub fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }

    /// Dot colour as a hex string.
    pub fn color(&self) -> Option<&'static str> {
        match self {
            Self::Hidden => None,
            Self::Online => Some("#22C55E"),
            Self::Offline => Some("#9CA3AF"),
        }
    }

    /// Text shown next to the dot.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::Hidden => None,
            Self::Online => Some("Online"),
            Self::Offline => Some("Offline"),
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Hidden)
    }
}

impl std::fmt::Display for PresenceIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label().unwrap_or("-"))
    }
}

#[cfg(test)]
mod tests {
    use associate_core::types::SubjectId;

    use super::*;

    fn presence(subject: bool, loading: bool, online: bool) -> SubjectPresence {
        SubjectPresence {
            subject_id: subject.then(SubjectId::new),
            loading,
            online,
        }
    }

    #[test]
    fn test_hidden_without_subject_or_while_loading() {
        assert_eq!(
            PresenceIndicator::from_subject(&presence(false, false, false)),
            PresenceIndicator::Hidden
        );
        assert_eq!(
            PresenceIndicator::from_subject(&presence(true, true, true)),
            PresenceIndicator::Hidden
        );
        assert!(PresenceIndicator::Hidden.color().is_none());
    }

    #[test]
    fn test_online_and_offline() {
        let online = PresenceIndicator::from_subject(&presence(true, false, true));
        let offline = PresenceIndicator::from_subject(&presence(true, false, false));
        assert_eq!(online, PresenceIndicator::Online);
        assert_eq!(offline, PresenceIndicator::Offline);
        assert_ne!(online.color(), offline.color());
        assert_eq!(offline.to_string(), "Offline");
    }
}
