//! Collection cycles: one scheduler pass followed by batch or per-profile
//! retrieval, ending in a [`RunSummary`].

use std::time::{Duration, Instant};

use boosterdb_core::{
    AppConfig, BoosterEntry, BoosterRegistry, ChangeTracker, EventLog, FailureKind, PostSnapshot,
    ProfileSnapshot, RunSummary, SnapshotStore, TwitterUpstream, UpsertOutcome, UNKNOWN_HANDLE,
};
use chrono::Utc;

use crate::batch::{refresh_in_batches, BatchSettings};
use crate::paginate::{fetch_recent_posts, PageLimits};
use crate::schedule::{select_entities, SelectionMode};
use crate::seed::{self, AddedProfile};
use crate::CollectError;

/// Knobs for every cycle a [`Collector`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Pause between consecutive profiles in per-profile cycles.
    pub user_delay: Duration,
    pub page_delay: Duration,
    pub max_posts_per_profile: usize,
    pub max_pages_per_profile: usize,
    pub only_stale_profiles: bool,
    pub only_stale_posts: bool,
    pub stale_hours: u64,
}

impl CycleSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            user_delay: Duration::from_millis(config.user_delay_ms),
            page_delay: Duration::from_millis(config.page_delay_ms),
            max_posts_per_profile: config.max_posts_per_profile,
            max_pages_per_profile: config.max_pages_per_profile,
            only_stale_profiles: config.only_stale_profiles,
            only_stale_posts: config.only_stale_posts,
            stale_hours: config.stale_hours,
        }
    }

    #[must_use]
    pub fn batch(&self) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch_size,
            batch_delay: self.batch_delay,
        }
    }

    #[must_use]
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            max_items: self.max_posts_per_profile,
            max_pages: self.max_pages_per_profile,
            page_delay: self.page_delay,
        }
    }

    #[must_use]
    pub fn profile_selection(&self) -> SelectionMode {
        SelectionMode::from_flag(self.only_stale_profiles, self.stale_hours)
    }

    #[must_use]
    pub fn post_selection(&self) -> SelectionMode {
        SelectionMode::from_flag(self.only_stale_posts, self.stale_hours)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTarget {
    /// Batch refresh of stored profiles.
    Profiles,
    /// Paginated timeline fetch for each selected profile.
    Posts,
}

/// Owns the upstream client and both change trackers for the lifetime of a
/// process, and runs cycles against them one at a time.
pub struct Collector<U, PS, PE, QS, QE> {
    upstream: U,
    profiles: ChangeTracker<PS, PE>,
    posts: ChangeTracker<QS, QE>,
    settings: CycleSettings,
}

impl<U, PS, PE, QS, QE> Collector<U, PS, PE, QS, QE>
where
    U: TwitterUpstream,
    PS: SnapshotStore<ProfileSnapshot> + BoosterRegistry,
    PE: EventLog,
    QS: SnapshotStore<PostSnapshot>,
    QE: EventLog,
{
    pub fn new(
        upstream: U,
        profiles: ChangeTracker<PS, PE>,
        posts: ChangeTracker<QS, QE>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            upstream,
            profiles,
            posts,
            settings,
        }
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn profiles(&self) -> &ChangeTracker<PS, PE> {
        &self.profiles
    }

    pub fn posts(&self) -> &ChangeTracker<QS, QE> {
        &self.posts
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Run one full cycle for `target` and report how it went.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Storage`] only when storage becomes
    /// unavailable; every per-entity failure is in the returned summary.
    pub async fn run_collection_cycle(
        &self,
        target: CycleTarget,
    ) -> Result<RunSummary, CollectError> {
        let started = Instant::now();
        let mut summary = match target {
            CycleTarget::Profiles => self.refresh_profiles().await?,
            CycleTarget::Posts => self.collect_posts().await?,
        };
        summary.elapsed = started.elapsed();

        tracing::info!(
            cycle = summary.label,
            total = summary.total,
            succeeded = summary.succeeded,
            failures = summary.failures.len(),
            events = summary.events_recorded,
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            "collection cycle complete"
        );
        Ok(summary)
    }

    async fn refresh_profiles(&self) -> Result<RunSummary, CollectError> {
        let mut summary = RunSummary::new("profiles");
        let mode = self.settings.profile_selection();
        let ids = select_entities::<ProfileSnapshot, _>(self.profiles.snapshots(), mode, Utc::now())
            .await?;
        summary.total = ids.len();

        if ids.is_empty() {
            tracing::info!(?mode, "no profiles due for refresh");
            return Ok(summary);
        }
        tracing::info!(?mode, profiles = ids.len(), "starting profile refresh");

        refresh_in_batches(
            &self.upstream,
            &self.profiles,
            &ids,
            &self.settings.batch(),
            &mut summary,
        )
        .await?;
        Ok(summary)
    }

    async fn collect_posts(&self) -> Result<RunSummary, CollectError> {
        let mut summary = RunSummary::new("posts");
        let mode = self.settings.post_selection();
        let ids = select_entities::<ProfileSnapshot, _>(self.profiles.snapshots(), mode, Utc::now())
            .await?;
        summary.total = ids.len();

        if ids.is_empty() {
            tracing::info!(?mode, "no profiles to collect posts for");
            return Ok(summary);
        }
        tracing::info!(?mode, profiles = ids.len(), "starting post collection");

        let limits = self.settings.page_limits();
        for (index, profile_id) in ids.iter().enumerate() {
            if index > 0 && !self.settings.user_delay.is_zero() {
                tokio::time::sleep(self.settings.user_delay).await;
            }

            let profile = match self.profiles.snapshots().get(profile_id).await {
                Ok(Some(profile)) => profile,
                Ok(None) => {
                    summary.failures.record(
                        FailureKind::FetchError,
                        profile_id.as_str(),
                        UNKNOWN_HANDLE,
                        "profile no longer stored",
                        None,
                    );
                    continue;
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    summary.failures.record(
                        FailureKind::FetchError,
                        profile_id.as_str(),
                        UNKNOWN_HANDLE,
                        "could not load stored profile",
                        Some(e.to_string()),
                    );
                    continue;
                }
            };

            tracing::info!(
                progress = index + 1,
                of = ids.len(),
                profile_id = %profile.profile_id,
                handle = %profile.username,
                "collecting posts"
            );

            let walk = match fetch_recent_posts(&self.upstream, &profile.profile_id, &limits).await
            {
                Ok(walk) => walk,
                Err(e) => {
                    tracing::warn!(handle = %profile.username, error = %e, "timeline fetch failed");
                    summary.failures.record(
                        FailureKind::FetchError,
                        profile.profile_id.as_str(),
                        profile.username.as_str(),
                        "timeline fetch failed",
                        Some(e.to_string()),
                    );
                    continue;
                }
            };

            if walk.items.is_empty() {
                tracing::debug!(handle = %profile.username, "no posts returned");
            }

            for item in walk.undecoded {
                let post_id = item.id.as_deref().unwrap_or("without id");
                summary.failures.record(
                    FailureKind::FetchError,
                    profile.profile_id.as_str(),
                    profile.username.as_str(),
                    format!("could not decode post {post_id}"),
                    Some(item.reason),
                );
            }

            for post in walk.items {
                let post_id = post.id.clone();
                let snapshot = PostSnapshot::new(
                    post,
                    profile.profile_id.as_str(),
                    profile.username.as_str(),
                    Utc::now(),
                );
                match self.posts.upsert(snapshot).await {
                    Ok(outcome) => {
                        summary.items_saved += 1;
                        tally(&mut summary, &outcome);
                    }
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => {
                        tracing::warn!(post_id = %post_id, error = %e, "failed to save post");
                        summary.failures.record(
                            FailureKind::SaveError,
                            profile.profile_id.as_str(),
                            profile.username.as_str(),
                            format!("could not save post {post_id}"),
                            Some(e.to_string()),
                        );
                    }
                }
            }

            summary.succeeded += 1;
        }

        Ok(summary)
    }

    /// Fetch one profile by handle and store it with a booster number.
    ///
    /// # Errors
    ///
    /// See [`seed::add_profile`].
    pub async fn add_profile(
        &self,
        username: &str,
        booster_number: Option<i64>,
    ) -> Result<AddedProfile, CollectError> {
        seed::add_profile(&self.upstream, &self.profiles, username, booster_number).await
    }

    /// Fetch and store every entry of the booster list, in list order.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Storage`] only when storage becomes unavailable.
    pub async fn seed_boosters(
        &self,
        entries: &[BoosterEntry],
    ) -> Result<RunSummary, CollectError> {
        let started = Instant::now();
        let delay = self.settings.user_delay;
        let mut summary =
            seed::seed_boosters(&self.upstream, &self.profiles, entries, delay).await?;
        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

/// Fold one upsert outcome into the run counters.
pub(crate) fn tally(summary: &mut RunSummary, outcome: &UpsertOutcome) {
    match outcome {
        UpsertOutcome::Created => summary.created += 1,
        UpsertOutcome::Updated { .. } => {
            summary.updated += 1;
            summary.events_recorded += 1;
        }
        UpsertOutcome::Unchanged => summary.unchanged += 1,
    }
}
