use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::FieldChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProfileUpdate,
    EngagementUpdate,
    BoosterNumberChange,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ProfileUpdate => "profile_update",
            EventKind::EngagementUpdate => "engagement_update",
            EventKind::BoosterNumberChange => "booster_number_change",
        }
    }

    /// Inverse of [`EventKind::as_str`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "profile_update" => Some(EventKind::ProfileUpdate),
            "engagement_update" => Some(EventKind::EngagementUpdate),
            "booster_number_change" => Some(EventKind::BoosterNumberChange),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable ledger entry: what changed between two consecutive
/// observations of an entity.
///
/// `before`/`after` hold the full payload for profiles and only the
/// engagement metrics for posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity_id: String,
    pub handle: String,
    pub recorded_at: DateTime<Utc>,
    pub kind: EventKind,
    pub changes: Vec<FieldChange>,
    pub before: Value,
    pub after: Value,
}
