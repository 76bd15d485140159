//! Fixed-size batch refresh against the upstream's multi-profile endpoint.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use boosterdb_core::{
    ChangeTracker, EventLog, FailureKind, ProfileBatch, ProfileObservation, ProfileSnapshot,
    RunSummary, SnapshotStore, StoreError, TwitterUpstream, UNKNOWN_HANDLE,
};
use chrono::Utc;

use crate::cycle::tally;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Ids per upstream call. Zero is treated as one.
    pub batch_size: usize,
    /// Pause between consecutive batch calls.
    pub batch_delay: Duration,
}

/// Refresh `ids` in groups of `settings.batch_size`, upserting every
/// requested profile the upstream returns.
///
/// Ids a successful response leaves out are recorded as
/// [`FailureKind::ApiMissing`]. Requested profiles that come back but do not
/// decode are recorded as [`FailureKind::FetchError`] with the decode error.
/// Profiles nobody asked for are skipped, and only the first copy of a
/// repeated id is stored. A failed call records every id of its group as
/// [`FailureKind::BatchError`] and moves on to the next group without
/// retrying. A profile that cannot be saved is recorded as
/// [`FailureKind::SaveError`] and the batch continues.
///
/// # Errors
///
/// Returns a fatal [`StoreError`] (backend unavailable) as soon as one is
/// seen; everything else ends up in `summary.failures`.
pub async fn refresh_in_batches<U, S, E>(
    upstream: &U,
    tracker: &ChangeTracker<S, E>,
    ids: &[String],
    settings: &BatchSettings,
    summary: &mut RunSummary,
) -> Result<(), StoreError>
where
    U: TwitterUpstream + ?Sized,
    S: SnapshotStore<ProfileSnapshot>,
    E: EventLog,
{
    let batch_size = settings.batch_size.max(1);
    let batch_count = ids.len().div_ceil(batch_size);

    for (index, group) in ids.chunks(batch_size).enumerate() {
        if index > 0 && !settings.batch_delay.is_zero() {
            tokio::time::sleep(settings.batch_delay).await;
        }

        tracing::info!(
            batch = index + 1,
            batches = batch_count,
            size = group.len(),
            "refreshing profile batch"
        );

        let batch = match upstream.fetch_profiles(group).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(batch = index + 1, error = %e, "batch request failed");
                for id in group {
                    let handle = resolve_handle(tracker.snapshots(), id).await;
                    summary.failures.record(
                        FailureKind::BatchError,
                        id.as_str(),
                        handle,
                        "batch request failed",
                        Some(e.to_string()),
                    );
                }
                continue;
            }
        };

        let reconciled = reconcile(group, batch);

        for id in group {
            if reconciled.returned.contains(id.as_str()) {
                continue;
            }
            let handle = resolve_handle(tracker.snapshots(), id).await;
            if let Some(reason) = reconciled.undecoded.get(id.as_str()) {
                tracing::warn!(profile_id = %id, handle = %handle, "profile did not decode");
                summary.failures.record(
                    FailureKind::FetchError,
                    id.as_str(),
                    handle,
                    "could not decode profile",
                    Some(reason.clone()),
                );
            } else {
                tracing::warn!(profile_id = %id, handle = %handle, "profile missing from batch");
                summary.failures.record(
                    FailureKind::ApiMissing,
                    id.as_str(),
                    handle,
                    "missing from batch response",
                    None,
                );
            }
        }

        for profile in reconciled.profiles {
            let profile_id = profile.id.clone();
            let username = profile.user_name.clone();
            let snapshot = ProfileSnapshot::new(profile, Utc::now(), None);

            match tracker.upsert(snapshot).await {
                Ok(outcome) => {
                    summary.succeeded += 1;
                    tally(summary, &outcome);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(profile_id = %profile_id, error = %e, "failed to save profile");
                    summary.failures.record(
                        FailureKind::SaveError,
                        profile_id,
                        username,
                        "could not save profile",
                        Some(e.to_string()),
                    );
                }
            }
        }
    }

    Ok(())
}

/// A batch response narrowed to the ids of one group.
struct Reconciled<'a> {
    /// Decoded profiles to store, first copy of each requested id only.
    profiles: Vec<ProfileObservation>,
    /// Requested ids that came back decoded.
    returned: HashSet<&'a str>,
    /// Requested ids that came back only in undecodable form, with the
    /// first decode error seen for each.
    undecoded: HashMap<&'a str, String>,
}

fn reconcile(group: &[String], batch: ProfileBatch) -> Reconciled<'_> {
    let requested: HashSet<&str> = group.iter().map(String::as_str).collect();
    let mut reconciled = Reconciled {
        profiles: Vec::with_capacity(batch.profiles.len()),
        returned: HashSet::new(),
        undecoded: HashMap::new(),
    };

    for profile in batch.profiles {
        let Some(&id) = requested.get(profile.id.as_str()) else {
            tracing::warn!(profile_id = %profile.id, "skipping unrequested profile in batch");
            continue;
        };
        if !reconciled.returned.insert(id) {
            tracing::debug!(profile_id = %id, "skipping repeated profile in batch");
            continue;
        }
        reconciled.profiles.push(profile);
    }

    for item in batch.undecoded {
        match item.id.as_deref().and_then(|id| requested.get(id)) {
            Some(&id) => {
                reconciled.undecoded.entry(id).or_insert(item.reason);
            }
            None => {
                tracing::warn!(
                    profile_id = ?item.id,
                    reason = %item.reason,
                    "undecodable record matches no requested id"
                );
            }
        }
    }

    reconciled
}

/// Best-effort handle for a failure record: the stored username, or
/// [`UNKNOWN_HANDLE`] if there is none or the lookup fails. Never retried.
pub(crate) async fn resolve_handle<S>(store: &S, entity_id: &str) -> String
where
    S: SnapshotStore<ProfileSnapshot> + ?Sized,
{
    match store.get(entity_id).await {
        Ok(Some(snapshot)) => snapshot.username,
        Ok(None) => UNKNOWN_HANDLE.to_string(),
        Err(e) => {
            tracing::debug!(profile_id = %entity_id, error = %e, "handle lookup failed");
            UNKNOWN_HANDLE.to_string()
        }
    }
}
