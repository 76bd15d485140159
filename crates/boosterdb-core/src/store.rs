//! Storage contracts and the change-tracking write path.
//!
//! Snapshots and events live behind two independent traits. The only route
//! from a snapshot write to the event ledger is [`ChangeTracker::upsert`],
//! which appends explicitly before replacing the stored snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::diff::{detect_changes, FieldChange, WatchedField};
use crate::event::{ChangeEvent, EventKind};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot serve any request (pool closed, connection lost).
    /// Collection cycles stop when they see this.
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] BoxError),

    /// A single read or write failed; other entities may still succeed.
    #[error("storage error: {0}")]
    Backend(#[source] BoxError),

    #[error("failed to encode stored record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// An entity kind that can be snapshotted and diffed.
pub trait Tracked: Clone + Send + Sync + 'static {
    fn entity_id(&self) -> &str;
    fn handle(&self) -> &str;
    fn observed_at(&self) -> DateTime<Utc>;
    fn watched_fields() -> &'static [WatchedField<Self>];
    fn event_kind(changes: &[FieldChange]) -> EventKind;
    /// State recorded in the `before`/`after` columns of a change event.
    fn event_state(&self) -> Value;
    /// Carry over stored attributes a fresh observation does not provide.
    fn inherit(&mut self, previous: &Self);
    fn mark_updated(&mut self, _at: DateTime<Utc>) {}
}

/// Latest-observation storage, one row per entity id.
#[async_trait]
pub trait SnapshotStore<T: Tracked>: Send + Sync {
    async fn get(&self, entity_id: &str) -> Result<Option<T>, StoreError>;

    /// Case-insensitive lookup; the newest snapshot wins if a handle was reused.
    async fn latest_by_handle(&self, handle: &str) -> Result<Option<T>, StoreError>;

    /// Insert or replace the snapshot for `snapshot.entity_id()`.
    async fn put(&self, snapshot: &T) -> Result<(), StoreError>;

    /// Every entity id ever observed, ordered by id.
    async fn all_entity_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Ids whose latest observation is strictly older than `cutoff`, oldest first.
    async fn stale_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError>;
}

/// Append-only change ledger.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, event: &ChangeEvent) -> Result<(), StoreError>;

    /// Newest first.
    async fn by_entity_id(&self, entity_id: &str, limit: usize)
        -> Result<Vec<ChangeEvent>, StoreError>;

    /// Newest first, case-insensitive on the handle.
    async fn by_handle(&self, handle: &str, limit: usize) -> Result<Vec<ChangeEvent>, StoreError>;
}

#[async_trait]
pub trait BoosterRegistry: Send + Sync {
    async fn highest_booster_number(&self) -> Result<Option<i64>, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Created,
    Updated { changes: Vec<FieldChange> },
    Unchanged,
}

impl UpsertOutcome {
    #[must_use]
    pub fn recorded_event(&self) -> bool {
        matches!(self, UpsertOutcome::Updated { .. })
    }
}

/// Pairs a snapshot store with an event log and owns the write ordering
/// between them.
pub struct ChangeTracker<S, E> {
    snapshots: S,
    events: E,
}

impl<S, E> ChangeTracker<S, E> {
    pub fn new(snapshots: S, events: E) -> Self {
        Self { snapshots, events }
    }

    pub fn snapshots(&self) -> &S {
        &self.snapshots
    }

    pub fn events(&self) -> &E {
        &self.events
    }
}

impl<S, E: EventLog> ChangeTracker<S, E> {
    /// Store a fresh observation, recording a change event first if any
    /// watched field moved since the stored snapshot.
    ///
    /// The previous snapshot is found by entity id, never by handle. The
    /// stored observation timestamp advances even when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read, the event append, or the snapshot
    /// write fails. An append failure leaves the old snapshot in place.
    pub async fn upsert<T>(&self, mut candidate: T) -> Result<UpsertOutcome, StoreError>
    where
        T: Tracked,
        S: SnapshotStore<T>,
    {
        let Some(previous) = self.snapshots.get(candidate.entity_id()).await? else {
            self.snapshots.put(&candidate).await?;
            return Ok(UpsertOutcome::Created);
        };

        candidate.inherit(&previous);
        let changes = detect_changes(&previous, &candidate, T::watched_fields());
        if changes.is_empty() {
            self.snapshots.put(&candidate).await?;
            return Ok(UpsertOutcome::Unchanged);
        }

        let event = ChangeEvent {
            entity_id: candidate.entity_id().to_string(),
            handle: candidate.handle().to_string(),
            recorded_at: candidate.observed_at(),
            kind: T::event_kind(&changes),
            changes: changes.clone(),
            before: previous.event_state(),
            after: candidate.event_state(),
        };
        self.events.append(&event).await?;

        candidate.mark_updated(candidate.observed_at());
        self.snapshots.put(&candidate).await?;

        Ok(UpsertOutcome::Updated { changes })
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the snapshot lookup fails.
    pub async fn latest<T>(&self, handle: &str) -> Result<Option<T>, StoreError>
    where
        T: Tracked,
        S: SnapshotStore<T>,
    {
        self.snapshots.latest_by_handle(handle).await
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the event query fails.
    pub async fn history(
        &self,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<ChangeEvent>, StoreError> {
        self.events.by_entity_id(entity_id, limit).await
    }
}
