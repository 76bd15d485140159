//! Read-only change history queries.

use boosterdb_core::{ChangeEvent, EventLog, SnapshotStore};
use boosterdb_db::{PgEventLog, PgPostStore, PgProfileStore};
use sqlx::PgPool;

/// Print profile change events for `handle`, newest first.
///
/// The handle is resolved to the stored profile so events recorded under an
/// earlier username are included.
///
/// # Errors
///
/// Returns an error if a query fails.
pub(crate) async fn print_profile_history(
    pool: &PgPool,
    handle: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let handle = handle.trim_start_matches('@');
    let profiles = PgProfileStore::new(pool.clone());
    let events = PgEventLog::profiles(pool.clone());

    let history = match profiles.latest_by_handle(handle).await? {
        Some(profile) => {
            let booster = profile
                .booster_number
                .map_or_else(|| "-".to_string(), |n| format!("#{n}"));
            println!(
                "@{} ({}) booster {booster}, last observed {}",
                profile.username,
                profile.profile_id,
                profile.observed_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            events.by_entity_id(&profile.profile_id, limit).await?
        }
        None => {
            println!("@{handle}: no stored profile");
            events.by_handle(handle, limit).await?
        }
    };

    print_events(&history);
    Ok(())
}

/// Print the stored posts for `handle` with their current engagement, then
/// the engagement changes recorded for them, newest first.
///
/// # Errors
///
/// Returns an error if a query fails.
pub(crate) async fn print_post_history(
    pool: &PgPool,
    handle: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let handle = handle.trim_start_matches('@');
    let profiles = PgProfileStore::new(pool.clone());
    let posts = PgPostStore::new(pool.clone());
    let events = PgEventLog::posts(pool.clone());

    if let Some(profile) = profiles.latest_by_handle(handle).await? {
        let recent = posts
            .recent_for_profile(&profile.profile_id, i64::try_from(limit).unwrap_or(i64::MAX))
            .await?;
        println!("@{}: {} recent post(s)", profile.username, recent.len());
        for post in &recent {
            let m = post.post.metrics();
            println!(
                "  {}  first seen {}  likes {} retweets {} replies {} \
                 quotes {} views {} bookmarks {}",
                post.post_id,
                post.first_seen_at.format("%Y-%m-%d %H:%M"),
                m.likes,
                m.retweets,
                m.replies,
                m.quotes,
                m.views,
                m.bookmarks
            );
        }
        println!();
    }

    let history = events.by_handle(handle, limit).await?;
    print_events(&history);
    Ok(())
}

fn print_events(events: &[ChangeEvent]) {
    if events.is_empty() {
        println!("no recorded changes");
        return;
    }
    for event in events {
        println!(
            "{}  {}  {} (@{})",
            event.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"),
            event.kind,
            event.entity_id,
            event.handle
        );
        for change in &event.changes {
            println!("    {}: {} -> {}", change.field, change.old, change.new);
        }
    }
}
