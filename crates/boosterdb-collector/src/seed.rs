//! Adding individual profiles and seeding the booster list.

use std::time::Duration;

use boosterdb_core::{
    normalize_username, BoosterEntry, BoosterRegistry, ChangeTracker, EventLog, FailureKind,
    ProfileSnapshot, RunSummary, SnapshotStore, TwitterUpstream, UpsertOutcome,
};
use chrono::Utc;

use crate::cycle::tally;
use crate::CollectError;

/// Result of [`add_profile`]: the snapshot as stored and what the write did.
#[derive(Debug, Clone, PartialEq)]
pub struct AddedProfile {
    pub snapshot: ProfileSnapshot,
    pub outcome: UpsertOutcome,
}

/// Fetch `username` from the upstream and store it.
///
/// With no `booster_number`, a profile that already has one keeps it; any
/// other profile gets one past the highest number currently assigned.
///
/// # Errors
///
/// - [`CollectError::InvalidUsername`] if nothing is left after normalization.
/// - [`CollectError::Fetch`] if the upstream lookup fails.
/// - [`CollectError::Storage`] if any read or write fails.
pub async fn add_profile<U, S, E>(
    upstream: &U,
    tracker: &ChangeTracker<S, E>,
    username: &str,
    booster_number: Option<i64>,
) -> Result<AddedProfile, CollectError>
where
    U: TwitterUpstream + ?Sized,
    S: SnapshotStore<ProfileSnapshot> + BoosterRegistry,
    E: EventLog,
{
    let handle = normalize_username(username);
    if handle.is_empty() {
        return Err(CollectError::InvalidUsername(username.to_string()));
    }

    let observation = upstream
        .fetch_profile(&handle)
        .await
        .map_err(|source| CollectError::Fetch {
            handle: handle.clone(),
            source,
        })?;

    let booster_number = match booster_number {
        Some(number) => Some(number),
        None => next_booster_number(tracker.snapshots(), &observation.id).await?,
    };

    let profile_id = observation.id.clone();
    let candidate = ProfileSnapshot::new(observation, Utc::now(), booster_number);
    let outcome = tracker.upsert(candidate.clone()).await?;
    let snapshot = tracker.snapshots().get(&profile_id).await?.unwrap_or(candidate);

    tracing::info!(
        profile_id = %snapshot.profile_id,
        handle = %snapshot.username,
        booster_number = ?snapshot.booster_number,
        ?outcome,
        "profile added"
    );

    Ok(AddedProfile { snapshot, outcome })
}

/// `None` when the stored profile already carries a number (it is inherited
/// on upsert), otherwise the next free number.
async fn next_booster_number<S>(store: &S, profile_id: &str) -> Result<Option<i64>, CollectError>
where
    S: SnapshotStore<ProfileSnapshot> + BoosterRegistry,
{
    if let Some(existing) = store.get(profile_id).await? {
        if existing.booster_number.is_some() {
            return Ok(None);
        }
    }
    let highest = store.highest_booster_number().await?;
    Ok(Some(highest.map_or(1, |n| n + 1)))
}

/// Fetch and store every booster in list order with `delay` between entries.
///
/// Fetch and save failures are recorded per entry; the failing entry is
/// named `#<number>` since its upstream id is unknown.
///
/// # Errors
///
/// Returns [`CollectError::Storage`] only when storage becomes unavailable.
pub(crate) async fn seed_boosters<U, S, E>(
    upstream: &U,
    tracker: &ChangeTracker<S, E>,
    entries: &[BoosterEntry],
    delay: Duration,
) -> Result<RunSummary, CollectError>
where
    U: TwitterUpstream + ?Sized,
    S: SnapshotStore<ProfileSnapshot>,
    E: EventLog,
{
    let mut summary = RunSummary::new("boosters");
    summary.total = entries.len();

    for (index, entry) in entries.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let handle = entry.handle();
        tracing::info!(
            progress = index + 1,
            of = entries.len(),
            booster_number = entry.number,
            handle = %handle,
            "seeding booster"
        );

        let observation = match upstream.fetch_profile(&handle).await {
            Ok(observation) => observation,
            Err(e) => {
                tracing::warn!(handle = %handle, error = %e, "booster fetch failed");
                summary.failures.record(
                    FailureKind::FetchError,
                    format!("#{}", entry.number),
                    handle,
                    "profile fetch failed",
                    Some(e.to_string()),
                );
                continue;
            }
        };

        let profile_id = observation.id.clone();
        let snapshot = ProfileSnapshot::new(observation, Utc::now(), Some(entry.number));
        match tracker.upsert(snapshot).await {
            Ok(outcome) => {
                summary.succeeded += 1;
                tally(&mut summary, &outcome);
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(profile_id = %profile_id, error = %e, "failed to save booster");
                summary.failures.record(
                    FailureKind::SaveError,
                    profile_id,
                    handle,
                    "could not save profile",
                    Some(e.to_string()),
                );
            }
        }
    }

    Ok(summary)
}
