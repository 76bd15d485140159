//! Chooses which entities a cycle refreshes.

use boosterdb_core::{SnapshotStore, StoreError, Tracked};
use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Every entity ever observed, ordered by id.
    All,
    /// Entities whose last observation is older than `stale_hours`, oldest first.
    StaleOnly { stale_hours: u64 },
}

impl SelectionMode {
    #[must_use]
    pub fn from_flag(only_stale: bool, stale_hours: u64) -> Self {
        if only_stale {
            SelectionMode::StaleOnly { stale_hours }
        } else {
            SelectionMode::All
        }
    }
}

/// `now - stale_hours`, clamped to the earliest representable instant when
/// the threshold is absurdly large.
#[must_use]
pub fn stale_cutoff(now: DateTime<Utc>, stale_hours: u64) -> DateTime<Utc> {
    i64::try_from(stale_hours)
        .ok()
        .and_then(TimeDelta::try_hours)
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Entity ids due for refresh under `mode`.
///
/// Entities that were never observed have no snapshot and are never
/// returned by the stale selection.
///
/// # Errors
///
/// Returns `StoreError` if the id query fails.
pub async fn select_entities<T, S>(
    store: &S,
    mode: SelectionMode,
    now: DateTime<Utc>,
) -> Result<Vec<String>, StoreError>
where
    T: Tracked,
    S: SnapshotStore<T> + ?Sized,
{
    match mode {
        SelectionMode::All => store.all_entity_ids().await,
        SelectionMode::StaleOnly { stale_hours } => {
            let cutoff = stale_cutoff(now, stale_hours);
            tracing::debug!(stale_hours, %cutoff, "selecting stale entities");
            store.stale_ids(cutoff).await
        }
    }
}
