//! Database operations for `posts`.

use async_trait::async_trait;
use boosterdb_core::{PostSnapshot, SnapshotStore, StoreError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::classify;

/// A row from the `posts` table. Counter columns are denormalized from
/// `payload` for querying; `payload` is authoritative.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub post_id: String,
    pub profile_id: String,
    pub username: String,
    pub observed_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl PostRow {
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if `payload` is not a valid post record.
    pub fn into_snapshot(self) -> Result<PostSnapshot, serde_json::Error> {
        Ok(PostSnapshot {
            post_id: self.post_id,
            profile_id: self.profile_id,
            username: self.username,
            observed_at: self.observed_at,
            first_seen_at: self.first_seen_at,
            last_updated_at: self.last_updated_at,
            post: serde_json::from_value(self.payload)?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT post_id, profile_id, username, observed_at, \
                                     first_seen_at, last_updated_at, payload \
                              FROM posts";

#[derive(Debug, Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recently first-seen posts for one profile.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on query failure or an undecodable payload.
    pub async fn recent_for_profile(
        &self,
        profile_id: &str,
        limit: i64,
    ) -> Result<Vec<PostSnapshot>, StoreError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "{SELECT_COLUMNS} WHERE profile_id = $1 ORDER BY first_seen_at DESC, post_id LIMIT $2"
        ))
        .bind(profile_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.into_iter()
            .map(|row| row.into_snapshot().map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl SnapshotStore<PostSnapshot> for PgPostStore {
    async fn get(&self, entity_id: &str) -> Result<Option<PostSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(&format!("{SELECT_COLUMNS} WHERE post_id = $1"))
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.map(PostRow::into_snapshot)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn latest_by_handle(&self, handle: &str) -> Result<Option<PostSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "{SELECT_COLUMNS} WHERE LOWER(username) = LOWER($1) \
             ORDER BY observed_at DESC, first_seen_at DESC LIMIT 1"
        ))
        .bind(handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        row.map(PostRow::into_snapshot)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Conflicts on `post_id` replace the counters, payload, and timestamps.
    /// `first_seen_at` is never moved forward.
    async fn put(&self, snapshot: &PostSnapshot) -> Result<(), StoreError> {
        let payload = serde_json::to_value(&snapshot.post)?;
        let metrics = snapshot.post.metrics();

        sqlx::query(
            "INSERT INTO posts \
                 (post_id, profile_id, username, observed_at, first_seen_at, last_updated_at, \
                  retweet_count, reply_count, like_count, quote_count, view_count, \
                  bookmark_count, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (post_id) DO UPDATE SET \
                 profile_id      = EXCLUDED.profile_id, \
                 username        = EXCLUDED.username, \
                 observed_at     = EXCLUDED.observed_at, \
                 first_seen_at   = LEAST(posts.first_seen_at, EXCLUDED.first_seen_at), \
                 last_updated_at = EXCLUDED.last_updated_at, \
                 retweet_count   = EXCLUDED.retweet_count, \
                 reply_count     = EXCLUDED.reply_count, \
                 like_count      = EXCLUDED.like_count, \
                 quote_count     = EXCLUDED.quote_count, \
                 view_count      = EXCLUDED.view_count, \
                 bookmark_count  = EXCLUDED.bookmark_count, \
                 payload         = EXCLUDED.payload",
        )
        .bind(&snapshot.post_id)
        .bind(&snapshot.profile_id)
        .bind(&snapshot.username)
        .bind(snapshot.observed_at)
        .bind(snapshot.first_seen_at)
        .bind(snapshot.last_updated_at)
        .bind(metrics.retweets)
        .bind(metrics.replies)
        .bind(metrics.likes)
        .bind(metrics.quotes)
        .bind(metrics.views)
        .bind(metrics.bookmarks)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(())
    }

    async fn all_entity_ids(&self) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT post_id FROM posts ORDER BY post_id")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn stale_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT post_id \
             FROM posts \
             GROUP BY post_id \
             HAVING MAX(observed_at) < $1 \
             ORDER BY MAX(observed_at), post_id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }
}
