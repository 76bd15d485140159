use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::decode::null_as_default;
use crate::diff::{FieldChange, WatchedField};
use crate::event::EventKind;
use crate::store::Tracked;

/// Item kind the collector keeps from a timeline page; retweets and other
/// kinds are dropped.
pub const POST_KIND: &str = "tweet";

/// A post record as returned by the upstream timeline listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostObservation {
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub retweet_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reply_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub like_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quote_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub view_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bookmark_count: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PostObservation {
    #[must_use]
    pub fn is_post(&self) -> bool {
        self.kind == POST_KIND
    }

    #[must_use]
    pub fn metrics(&self) -> EngagementMetrics {
        EngagementMetrics {
            retweets: self.retweet_count,
            replies: self.reply_count,
            likes: self.like_count,
            quotes: self.quote_count,
            views: self.view_count,
            bookmarks: self.bookmark_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub retweets: i64,
    pub replies: i64,
    pub likes: i64,
    pub quotes: i64,
    pub views: i64,
    pub bookmarks: i64,
}

/// Latest stored observation of one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSnapshot {
    pub post_id: String,
    pub profile_id: String,
    pub username: String,
    pub observed_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    /// Advances only when a watched counter changes.
    pub last_updated_at: DateTime<Utc>,
    pub post: PostObservation,
}

impl PostSnapshot {
    /// A snapshot for a freshly fetched post. Timestamps all start at
    /// `observed_at`; the store carries `first_seen_at` over from any
    /// earlier snapshot.
    #[must_use]
    pub fn new(
        post: PostObservation,
        profile_id: impl Into<String>,
        username: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            post_id: post.id.clone(),
            profile_id: profile_id.into(),
            username: username.into(),
            observed_at,
            first_seen_at: observed_at,
            last_updated_at: observed_at,
            post,
        }
    }
}

static POST_FIELDS: &[WatchedField<PostSnapshot>] = &[
    WatchedField::new("retweetCount", |s| json!(s.post.retweet_count)),
    WatchedField::new("replyCount", |s| json!(s.post.reply_count)),
    WatchedField::new("likeCount", |s| json!(s.post.like_count)),
    WatchedField::new("quoteCount", |s| json!(s.post.quote_count)),
    WatchedField::new("viewCount", |s| json!(s.post.view_count)),
    WatchedField::new("bookmarkCount", |s| json!(s.post.bookmark_count)),
];

impl Tracked for PostSnapshot {
    fn entity_id(&self) -> &str {
        &self.post_id
    }

    fn handle(&self) -> &str {
        &self.username
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    fn watched_fields() -> &'static [WatchedField<Self>] {
        POST_FIELDS
    }

    fn event_kind(_changes: &[FieldChange]) -> EventKind {
        EventKind::EngagementUpdate
    }

    fn event_state(&self) -> Value {
        serde_json::to_value(self.post.metrics()).unwrap_or(Value::Null)
    }

    fn inherit(&mut self, previous: &Self) {
        self.first_seen_at = previous.first_seen_at;
        self.last_updated_at = previous.last_updated_at;
    }

    fn mark_updated(&mut self, at: DateTime<Utc>) {
        self.last_updated_at = at;
    }
}
