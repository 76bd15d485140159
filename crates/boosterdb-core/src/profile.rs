use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::decode::null_as_default;
use crate::diff::{FieldChange, WatchedField};
use crate::event::EventKind;
use crate::store::Tracked;

/// A profile record as returned by the upstream.
///
/// The named fields are the ones the collector reasons about; everything else
/// the upstream sends is kept in `extra` so the stored payload stays complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileObservation {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub followers: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub following: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub statuses_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_blue_verified: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Latest stored observation of one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub profile_id: String,
    pub username: String,
    pub observed_at: DateTime<Utc>,
    /// Position in the booster list. `None` until one is assigned; a refresh
    /// that carries `None` keeps whatever number is already stored.
    pub booster_number: Option<i64>,
    pub profile: ProfileObservation,
}

impl ProfileSnapshot {
    #[must_use]
    pub fn new(
        profile: ProfileObservation,
        observed_at: DateTime<Utc>,
        booster_number: Option<i64>,
    ) -> Self {
        Self {
            profile_id: profile.id.clone(),
            username: profile.user_name.clone(),
            observed_at,
            booster_number,
            profile,
        }
    }
}

static PROFILE_FIELDS: &[WatchedField<ProfileSnapshot>] = &[
    WatchedField::new("name", |s| json!(s.profile.name)),
    WatchedField::new("userName", |s| json!(s.profile.user_name)),
    WatchedField::new("description", |s| json!(s.profile.description)),
    WatchedField::new("followers", |s| json!(s.profile.followers)),
    WatchedField::new("following", |s| json!(s.profile.following)),
    WatchedField::new("statusesCount", |s| json!(s.profile.statuses_count)),
    WatchedField::new("isBlueVerified", |s| json!(s.profile.is_blue_verified)),
    WatchedField::new("location", |s| json!(s.profile.location)),
    WatchedField::new("boosterNumber", |s| json!(s.booster_number)),
];

impl Tracked for ProfileSnapshot {
    fn entity_id(&self) -> &str {
        &self.profile_id
    }

    fn handle(&self) -> &str {
        &self.username
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    fn watched_fields() -> &'static [WatchedField<Self>] {
        PROFILE_FIELDS
    }

    fn event_kind(changes: &[FieldChange]) -> EventKind {
        if !changes.is_empty() && changes.iter().all(|c| c.field == "boosterNumber") {
            EventKind::BoosterNumberChange
        } else {
            EventKind::ProfileUpdate
        }
    }

    fn event_state(&self) -> Value {
        let mut state = serde_json::to_value(&self.profile).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut state {
            map.insert("boosterNumber".to_string(), json!(self.booster_number));
        }
        state
    }

    fn inherit(&mut self, previous: &Self) {
        if self.booster_number.is_none() {
            self.booster_number = previous.booster_number;
        }
    }
}
