//! Offline unit tests for boosterdb-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::path::PathBuf;

use boosterdb_core::{AppConfig, Environment};
use boosterdb_db::{PoolConfig, PostRow, ProfileSnapshotRow};
use chrono::Utc;
use serde_json::json;

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        boosters_path: PathBuf::from("./config/boosters.yaml"),
        twitter_api_key: None,
        twitter_base_url: "https://api.twitterapi.io/".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        request_timeout_secs: 30,
        user_agent: "ua".to_string(),
        max_retries: 3,
        retry_backoff_base_ms: 1000,
        batch_size: 10,
        batch_delay_ms: 2000,
        user_delay_ms: 1000,
        page_delay_ms: 500,
        max_posts_per_profile: 100,
        max_pages_per_profile: 3,
        only_stale_profiles: true,
        only_stale_posts: false,
        stale_hours: 24,
        profile_schedule: "0 0 * * * *".to_string(),
        post_schedule: "0 30 */6 * * *".to_string(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn profile_row_decodes_payload() {
    let row = ProfileSnapshotRow {
        profile_id: "100".to_string(),
        username: "alice".to_string(),
        observed_at: Utc::now(),
        booster_number: Some(4),
        payload: json!({
            "id": "100",
            "userName": "alice",
            "name": "Alice",
            "followers": 10,
            "coverPicture": "https://example.test/c.png"
        }),
    };

    let snapshot = row.into_snapshot().expect("payload should decode");
    assert_eq!(snapshot.booster_number, Some(4));
    assert_eq!(snapshot.profile.followers, 10);
    assert_eq!(
        snapshot.profile.extra.get("coverPicture"),
        Some(&json!("https://example.test/c.png"))
    );
}

#[test]
fn profile_row_with_bad_payload_fails() {
    let row = ProfileSnapshotRow {
        profile_id: "100".to_string(),
        username: "alice".to_string(),
        observed_at: Utc::now(),
        booster_number: None,
        payload: json!("not an object"),
    };
    assert!(row.into_snapshot().is_err());
}

#[test]
fn post_row_decodes_payload() {
    let now = Utc::now();
    let row = PostRow {
        post_id: "p1".to_string(),
        profile_id: "100".to_string(),
        username: "alice".to_string(),
        observed_at: now,
        first_seen_at: now,
        last_updated_at: now,
        payload: json!({"id": "p1", "type": "tweet", "likeCount": 3}),
    };

    let snapshot = row.into_snapshot().expect("payload should decode");
    assert!(snapshot.post.is_post());
    assert_eq!(snapshot.post.metrics().likes, 3);
}
