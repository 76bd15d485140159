//! Append-only access to `profile_events` and `post_events`.
//!
//! No update or delete path exists here; the tables also
//! carry a trigger that rejects both.

use async_trait::async_trait;
use boosterdb_core::{ChangeEvent, EventKind, EventLog, FieldChange, StoreError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::classify;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `profile_events` or `post_events`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChangeEventRow {
    pub id: i64,
    pub entity_id: String,
    pub handle: String,
    pub event_kind: String,
    pub changes: serde_json::Value,
    pub before_state: serde_json::Value,
    pub after_state: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl ChangeEventRow {
    /// # Errors
    ///
    /// Returns `StoreError` if the kind is unknown or `changes` does not
    /// decode into field changes.
    pub fn into_event(self) -> Result<ChangeEvent, StoreError> {
        let kind = EventKind::parse(&self.event_kind).ok_or_else(|| {
            StoreError::Backend(format!("unknown event kind '{}'", self.event_kind).into())
        })?;
        let changes: Vec<FieldChange> = serde_json::from_value(self.changes)?;

        Ok(ChangeEvent {
            entity_id: self.entity_id,
            handle: self.handle,
            recorded_at: self.recorded_at,
            kind,
            changes,
            before: self.before_state,
            after: self.after_state,
        })
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventTable {
    Profiles,
    Posts,
}

impl EventTable {
    fn name(self) -> &'static str {
        match self {
            EventTable::Profiles => "profile_events",
            EventTable::Posts => "post_events",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
    table: EventTable,
}

impl PgEventLog {
    #[must_use]
    pub fn profiles(pool: PgPool) -> Self {
        Self {
            pool,
            table: EventTable::Profiles,
        }
    }

    #[must_use]
    pub fn posts(pool: PgPool) -> Self {
        Self {
            pool,
            table: EventTable::Posts,
        }
    }

    async fn newest_first(
        &self,
        filter: &str,
        key: &str,
        limit: usize,
    ) -> Result<Vec<ChangeEvent>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT id, entity_id, handle, event_kind, changes, before_state, after_state, \
                    recorded_at \
             FROM {} \
             WHERE {filter} \
             ORDER BY recorded_at DESC, id DESC \
             LIMIT $2",
            self.table.name()
        );

        let rows = sqlx::query_as::<_, ChangeEventRow>(&sql)
            .bind(key)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.into_iter().map(ChangeEventRow::into_event).collect()
    }
}

#[async_trait]
impl EventLog for PgEventLog {
    async fn append(&self, event: &ChangeEvent) -> Result<(), StoreError> {
        let changes = serde_json::to_value(&event.changes)?;
        let sql = format!(
            "INSERT INTO {} \
                 (entity_id, handle, event_kind, changes, before_state, after_state, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.table.name()
        );

        sqlx::query(&sql)
            .bind(&event.entity_id)
            .bind(&event.handle)
            .bind(event.kind.as_str())
            .bind(changes)
            .bind(&event.before)
            .bind(&event.after)
            .bind(event.recorded_at)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn by_entity_id(
        &self,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<ChangeEvent>, StoreError> {
        self.newest_first("entity_id = $1", entity_id, limit).await
    }

    async fn by_handle(&self, handle: &str, limit: usize) -> Result<Vec<ChangeEvent>, StoreError> {
        self.newest_first("LOWER(handle) = LOWER($1)", handle, limit)
            .await
    }
}
