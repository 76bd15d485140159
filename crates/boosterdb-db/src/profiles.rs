//! Database operations for `profile_snapshots`.

use async_trait::async_trait;
use boosterdb_core::{BoosterRegistry, ProfileSnapshot, SnapshotStore, StoreError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::classify;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `profile_snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileSnapshotRow {
    pub profile_id: String,
    pub username: String,
    pub observed_at: DateTime<Utc>,
    pub booster_number: Option<i64>,
    /// Full upstream profile record.
    pub payload: serde_json::Value,
}

impl ProfileSnapshotRow {
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if `payload` is not a valid profile record.
    pub fn into_snapshot(self) -> Result<ProfileSnapshot, serde_json::Error> {
        Ok(ProfileSnapshot {
            profile_id: self.profile_id,
            username: self.username,
            observed_at: self.observed_at,
            booster_number: self.booster_number,
            profile: serde_json::from_value(self.payload)?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT profile_id, username, observed_at, booster_number, payload \
                              FROM profile_snapshots";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_optional(
        &self,
        filter: &str,
        bind: &str,
    ) -> Result<Option<ProfileSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, ProfileSnapshotRow>(&format!("{SELECT_COLUMNS} {filter}"))
            .bind(bind)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.map(ProfileSnapshotRow::into_snapshot)
            .transpose()
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl SnapshotStore<ProfileSnapshot> for PgProfileStore {
    async fn get(&self, entity_id: &str) -> Result<Option<ProfileSnapshot>, StoreError> {
        self.fetch_optional("WHERE profile_id = $1", entity_id).await
    }

    async fn latest_by_handle(&self, handle: &str) -> Result<Option<ProfileSnapshot>, StoreError> {
        self.fetch_optional(
            "WHERE LOWER(username) = LOWER($1) ORDER BY observed_at DESC LIMIT 1",
            handle,
        )
        .await
    }

    /// Conflicts on `profile_id` replace every column in place.
    async fn put(&self, snapshot: &ProfileSnapshot) -> Result<(), StoreError> {
        let payload = serde_json::to_value(&snapshot.profile)?;

        sqlx::query(
            "INSERT INTO profile_snapshots \
                 (profile_id, username, observed_at, booster_number, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (profile_id) DO UPDATE SET \
                 username       = EXCLUDED.username, \
                 observed_at    = EXCLUDED.observed_at, \
                 booster_number = EXCLUDED.booster_number, \
                 payload        = EXCLUDED.payload, \
                 updated_at     = NOW()",
        )
        .bind(&snapshot.profile_id)
        .bind(&snapshot.username)
        .bind(snapshot.observed_at)
        .bind(snapshot.booster_number)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(())
    }

    async fn all_entity_ids(&self) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT profile_id FROM profile_snapshots ORDER BY profile_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    async fn stale_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT profile_id \
             FROM profile_snapshots \
             GROUP BY profile_id \
             HAVING MAX(observed_at) < $1 \
             ORDER BY MAX(observed_at), profile_id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }
}

#[async_trait]
impl BoosterRegistry for PgProfileStore {
    async fn highest_booster_number(&self) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(booster_number) FROM profile_snapshots")
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }
}
