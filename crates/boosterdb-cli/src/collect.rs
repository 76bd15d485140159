//! Collection command handlers for the CLI.
//!
//! These are called from `main` after the database pool and config are
//! established. Per-entity failures end up in the returned summary; only a
//! storage outage or a missing API key turns into an error here.

use std::path::Path;

use boosterdb_collector::{Collector, CycleSettings, CycleTarget};
use boosterdb_core::{AppConfig, ChangeTracker, RunSummary, UpsertOutcome};
use boosterdb_db::{PgEventLog, PgPostStore, PgProfileStore};
use boosterdb_twitter::TwitterClient;
use clap::Subcommand;
use sqlx::PgPool;

pub(crate) type PgCollector =
    Collector<TwitterClient, PgProfileStore, PgEventLog, PgPostStore, PgEventLog>;

/// Sub-commands available under `collect`.
#[derive(Debug, Subcommand)]
pub enum CollectCommands {
    /// Refresh stored profiles through the batch endpoint
    Profiles {
        /// Refresh every stored profile, not only stale ones
        #[arg(long, conflicts_with = "stale_hours")]
        all: bool,
        /// Only refresh profiles not observed in this many hours
        #[arg(long)]
        stale_hours: Option<u64>,
    },
    /// Fetch recent posts for stored profiles
    Posts {
        /// Only collect for profiles not observed within the stale threshold
        #[arg(long, conflicts_with = "all")]
        stale: bool,
        /// Collect for every stored profile
        #[arg(long)]
        all: bool,
        /// Maximum posts to keep per profile
        #[arg(long)]
        max_posts: Option<usize>,
        /// Maximum timeline pages to request per profile
        #[arg(long)]
        max_pages: Option<usize>,
    },
}

/// Apply command-line overrides on top of the configured cycle settings.
pub(crate) fn settings_for(
    command: &CollectCommands,
    mut settings: CycleSettings,
) -> (CycleSettings, CycleTarget) {
    match command {
        CollectCommands::Profiles { all, stale_hours } => {
            if *all {
                settings.only_stale_profiles = false;
            }
            if let Some(hours) = stale_hours {
                settings.only_stale_profiles = true;
                settings.stale_hours = *hours;
            }
            (settings, CycleTarget::Profiles)
        }
        CollectCommands::Posts {
            stale,
            all,
            max_posts,
            max_pages,
        } => {
            if *stale {
                settings.only_stale_posts = true;
            }
            if *all {
                settings.only_stale_posts = false;
            }
            if let Some(max_posts) = max_posts {
                settings.max_posts_per_profile = *max_posts;
            }
            if let Some(max_pages) = max_pages {
                settings.max_pages_per_profile = *max_pages;
            }
            (settings, CycleTarget::Posts)
        }
    }
}

/// Wire the Postgres stores and the Twitter client into a collector.
///
/// # Errors
///
/// Returns an error if no API key is configured or the HTTP client cannot be
/// built.
pub(crate) fn build_collector(
    pool: &PgPool,
    config: &AppConfig,
    settings: CycleSettings,
) -> anyhow::Result<PgCollector> {
    let client = TwitterClient::from_app_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build Twitter client: {e}"))?;

    let profiles = ChangeTracker::new(
        PgProfileStore::new(pool.clone()),
        PgEventLog::profiles(pool.clone()),
    );
    let posts = ChangeTracker::new(
        PgPostStore::new(pool.clone()),
        PgEventLog::posts(pool.clone()),
    );

    Ok(Collector::new(client, profiles, posts, settings))
}

/// Run one profile or post cycle.
///
/// # Errors
///
/// Returns an error if the collector cannot be built or storage becomes
/// unavailable mid-run.
pub(crate) async fn run_collect(
    pool: &PgPool,
    config: &AppConfig,
    command: CollectCommands,
) -> anyhow::Result<RunSummary> {
    let (settings, target) = settings_for(&command, CycleSettings::from_app_config(config));
    tracing::info!(?target, ?settings, "starting collection");

    let collector = build_collector(pool, config, settings)?;
    Ok(collector.run_collection_cycle(target).await?)
}

/// Fetch one profile and store it, assigning a booster number if needed.
///
/// # Errors
///
/// Returns an error if the handle is invalid, the upstream lookup fails, or
/// storage fails.
pub(crate) async fn run_add(
    pool: &PgPool,
    config: &AppConfig,
    username: &str,
    booster: Option<i64>,
) -> anyhow::Result<()> {
    let collector = build_collector(pool, config, CycleSettings::from_app_config(config))?;
    let added = collector.add_profile(username, booster).await?;

    let action = match added.outcome {
        UpsertOutcome::Created => "added",
        UpsertOutcome::Updated { .. } => "updated",
        UpsertOutcome::Unchanged => "unchanged",
    };
    let booster = added
        .snapshot
        .booster_number
        .map_or_else(|| "-".to_string(), |n| format!("#{n}"));
    println!(
        "{action}: @{} ({}) booster {booster}",
        added.snapshot.username, added.snapshot.profile_id
    );
    Ok(())
}

/// Seed every booster listed in the YAML file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or validated, or storage
/// becomes unavailable mid-run.
pub(crate) async fn run_seed(
    pool: &PgPool,
    config: &AppConfig,
    path: &Path,
) -> anyhow::Result<RunSummary> {
    let file = boosterdb_core::load_boosters(path)?;
    tracing::info!(path = %path.display(), boosters = file.boosters.len(), "seeding boosters");

    let collector = build_collector(pool, config, CycleSettings::from_app_config(config))?;
    Ok(collector.seed_boosters(&file.boosters).await?)
}
