//! In-process storage backend.
//!
//! Backs the collector's orchestration tests and any dry run that should not
//! touch Postgres. Both stores can be flipped into an "unavailable" state to
//! exercise the fatal-error path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::event::ChangeEvent;
use crate::profile::ProfileSnapshot;
use crate::store::{BoosterRegistry, EventLog, SnapshotStore, StoreError, Tracked};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
}

fn check_available(flag: &AtomicBool) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        Err(StoreError::Unavailable("memory store marked unavailable".into()))
    } else {
        Ok(())
    }
}

pub struct MemorySnapshotStore<T> {
    rows: Mutex<BTreeMap<String, T>>,
    unavailable: AtomicBool,
}

impl<T> Default for MemorySnapshotStore<T> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }
}

impl<T: Tracked> MemorySnapshotStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<T: Tracked> SnapshotStore<T> for MemorySnapshotStore<T> {
    async fn get(&self, entity_id: &str) -> Result<Option<T>, StoreError> {
        check_available(&self.unavailable)?;
        Ok(lock(&self.rows)?.get(entity_id).cloned())
    }

    async fn latest_by_handle(&self, handle: &str) -> Result<Option<T>, StoreError> {
        check_available(&self.unavailable)?;
        let rows = lock(&self.rows)?;
        Ok(rows
            .values()
            .filter(|row| row.handle().eq_ignore_ascii_case(handle))
            .max_by_key(|row| row.observed_at())
            .cloned())
    }

    async fn put(&self, snapshot: &T) -> Result<(), StoreError> {
        check_available(&self.unavailable)?;
        lock(&self.rows)?.insert(snapshot.entity_id().to_string(), snapshot.clone());
        Ok(())
    }

    async fn all_entity_ids(&self) -> Result<Vec<String>, StoreError> {
        check_available(&self.unavailable)?;
        Ok(lock(&self.rows)?.keys().cloned().collect())
    }

    async fn stale_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        check_available(&self.unavailable)?;
        let rows = lock(&self.rows)?;
        let mut stale: Vec<(DateTime<Utc>, String)> = rows
            .values()
            .filter(|row| row.observed_at() < cutoff)
            .map(|row| (row.observed_at(), row.entity_id().to_string()))
            .collect();
        stale.sort();
        Ok(stale.into_iter().map(|(_, id)| id).collect())
    }
}

#[async_trait]
impl BoosterRegistry for MemorySnapshotStore<ProfileSnapshot> {
    async fn highest_booster_number(&self) -> Result<Option<i64>, StoreError> {
        check_available(&self.unavailable)?;
        Ok(lock(&self.rows)?
            .values()
            .filter_map(|row| row.booster_number)
            .max())
    }
}

#[derive(Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<ChangeEvent>>,
    unavailable: AtomicBool,
}

impl MemoryEventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn newest_first<F>(&self, limit: usize, keep: F) -> Result<Vec<ChangeEvent>, StoreError>
    where
        F: Fn(&ChangeEvent) -> bool,
    {
        check_available(&self.unavailable)?;
        let events = lock(&self.events)?;
        let mut matched: Vec<&ChangeEvent> = events.iter().rev().filter(|e| keep(e)).collect();
        // Stable sort keeps later appends first among equal timestamps.
        matched.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(matched.into_iter().take(limit).cloned().collect())
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, event: &ChangeEvent) -> Result<(), StoreError> {
        check_available(&self.unavailable)?;
        lock(&self.events)?.push(event.clone());
        Ok(())
    }

    async fn by_entity_id(
        &self,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<ChangeEvent>, StoreError> {
        self.newest_first(limit, |e| e.entity_id == entity_id)
    }

    async fn by_handle(&self, handle: &str, limit: usize) -> Result<Vec<ChangeEvent>, StoreError> {
        self.newest_first(limit, |e| e.handle.eq_ignore_ascii_case(handle))
    }
}
