//! Orchestration tests against the in-memory backend and a scripted upstream.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use boosterdb_collector::{
    refresh_in_batches, BatchSettings, CollectError, Collector, CycleSettings, CycleTarget,
};
use boosterdb_core::{
    BoosterEntry, BoosterRegistry, ChangeTracker, EventKind, EventLog, FailureKind,
    MemoryEventLog, MemorySnapshotStore, Page, PostObservation, PostSnapshot, ProfileBatch,
    ProfileObservation, ProfileSnapshot, RunSummary, SnapshotStore, StoreError, Tracked,
    TwitterUpstream, UndecodedItem, UpsertOutcome, UpstreamError, UNKNOWN_HANDLE,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};

// ---------------------------------------------------------------------------
// Scripted upstream
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeUpstream {
    profiles: Mutex<HashMap<String, ProfileObservation>>,
    omitted: HashSet<String>,
    /// Ids returned in a batch as records that do not decode.
    undecodable: HashSet<String>,
    /// Appended to every successful batch response.
    extra_returns: Vec<ProfileObservation>,
    failing_batch_ids: HashSet<String>,
    timelines: Mutex<HashMap<String, Vec<Vec<PostObservation>>>>,
    /// Attached to the first timeline page of a user.
    undecodable_posts: HashMap<String, Vec<UndecodedItem>>,
    failing_timelines: HashSet<String>,
    batch_calls: Mutex<Vec<Vec<String>>>,
    page_calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeUpstream {
    fn with_profiles(ids: impl IntoIterator<Item = String>) -> Self {
        let upstream = Self::default();
        {
            let mut profiles = upstream.profiles.lock().unwrap();
            for id in ids {
                profiles.insert(id.clone(), observation(&id, 10));
            }
        }
        upstream
    }

    fn set_followers(&self, id: &str, followers: i64) {
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(profile) = profiles.get_mut(id) {
            profile.followers = followers;
        }
    }

    fn set_timeline(&self, user_id: &str, pages: Vec<Vec<PostObservation>>) {
        self.timelines
            .lock()
            .unwrap()
            .insert(user_id.to_string(), pages);
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.batch_calls.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl TwitterUpstream for FakeUpstream {
    async fn fetch_profile(&self, username: &str) -> Result<ProfileObservation, UpstreamError> {
        self.profiles
            .lock()
            .unwrap()
            .values()
            .find(|p| p.user_name.eq_ignore_ascii_case(username))
            .cloned()
            .ok_or_else(|| UpstreamError::new(Some(404), "User not found"))
    }

    async fn fetch_profiles(&self, ids: &[String]) -> Result<ProfileBatch, UpstreamError> {
        self.batch_calls.lock().unwrap().push(ids.to_vec());
        if ids.iter().any(|id| self.failing_batch_ids.contains(id)) {
            return Err(UpstreamError::new(Some(503), "Service unavailable"));
        }
        let profiles = self.profiles.lock().unwrap();
        let mut batch = ProfileBatch::default();
        for id in ids {
            if self.omitted.contains(id) {
                continue;
            }
            if self.undecodable.contains(id) {
                batch.undecoded.push(UndecodedItem {
                    id: Some(id.clone()),
                    kind: Some("user".to_string()),
                    reason: "invalid type: string \"n/a\", expected i64".to_string(),
                });
                continue;
            }
            if let Some(profile) = profiles.get(id) {
                batch.profiles.push(profile.clone());
            }
        }
        batch.profiles.extend(self.extra_returns.iter().cloned());
        Ok(batch)
    }

    async fn fetch_posts_page(
        &self,
        user_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PostObservation>, UpstreamError> {
        self.page_calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), cursor.map(str::to_string)));
        if self.failing_timelines.contains(user_id) {
            return Err(UpstreamError::new(Some(500), "Internal error"));
        }
        let pages = self
            .timelines
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        let index = cursor
            .and_then(|c| c.strip_prefix('p'))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        let items = pages.get(index).cloned().unwrap_or_default();
        let next_cursor = (index + 1 < pages.len()).then(|| format!("p{}", index + 1));
        let mut page = Page::new(items, next_cursor);
        if index == 0 {
            if let Some(undecoded) = self.undecodable_posts.get(user_id) {
                page.undecoded.clone_from(undecoded);
            }
        }
        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// Snapshot store that fails writes for chosen ids
// ---------------------------------------------------------------------------

struct FlakyStore<T> {
    inner: MemorySnapshotStore<T>,
    /// id -> whether the failure is fatal
    failing_puts: HashMap<String, bool>,
}

impl<T: Tracked> FlakyStore<T> {
    fn new(failing_puts: HashMap<String, bool>) -> Self {
        Self {
            inner: MemorySnapshotStore::new(),
            failing_puts,
        }
    }
}

#[async_trait]
impl<T: Tracked> SnapshotStore<T> for FlakyStore<T> {
    async fn get(&self, entity_id: &str) -> Result<Option<T>, StoreError> {
        self.inner.get(entity_id).await
    }

    async fn latest_by_handle(&self, handle: &str) -> Result<Option<T>, StoreError> {
        self.inner.latest_by_handle(handle).await
    }

    async fn put(&self, snapshot: &T) -> Result<(), StoreError> {
        match self.failing_puts.get(snapshot.entity_id()) {
            Some(true) => Err(StoreError::Unavailable("connection lost".into())),
            Some(false) => Err(StoreError::Backend("value too long".into())),
            None => self.inner.put(snapshot).await,
        }
    }

    async fn all_entity_ids(&self) -> Result<Vec<String>, StoreError> {
        self.inner.all_entity_ids().await
    }

    async fn stale_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        self.inner.stale_ids(cutoff).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type ProfileTracker = ChangeTracker<MemorySnapshotStore<ProfileSnapshot>, MemoryEventLog>;
type PostTracker = ChangeTracker<MemorySnapshotStore<PostSnapshot>, MemoryEventLog>;
type TestCollector = Collector<
    FakeUpstream,
    MemorySnapshotStore<ProfileSnapshot>,
    MemoryEventLog,
    MemorySnapshotStore<PostSnapshot>,
    MemoryEventLog,
>;

fn observation(id: &str, followers: i64) -> ProfileObservation {
    ProfileObservation {
        id: id.to_string(),
        user_name: format!("user{id}"),
        name: format!("User {id}"),
        followers,
        ..ProfileObservation::default()
    }
}

fn tweet(id: &str, likes: i64) -> PostObservation {
    PostObservation {
        id: id.to_string(),
        kind: "tweet".to_string(),
        like_count: likes,
        ..PostObservation::default()
    }
}

fn retweet(id: &str) -> PostObservation {
    PostObservation {
        id: id.to_string(),
        kind: "retweet".to_string(),
        ..PostObservation::default()
    }
}

fn ids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(|n| n.to_string()).collect()
}

fn settings() -> CycleSettings {
    CycleSettings {
        batch_size: 10,
        batch_delay: Duration::ZERO,
        user_delay: Duration::ZERO,
        page_delay: Duration::ZERO,
        max_posts_per_profile: 25,
        max_pages_per_profile: 5,
        only_stale_profiles: false,
        only_stale_posts: false,
        stale_hours: 24,
    }
}

fn batch_settings() -> BatchSettings {
    BatchSettings {
        batch_size: 10,
        batch_delay: Duration::ZERO,
    }
}

fn profile_tracker() -> ProfileTracker {
    ChangeTracker::new(MemorySnapshotStore::new(), MemoryEventLog::new())
}

fn post_tracker() -> PostTracker {
    ChangeTracker::new(MemorySnapshotStore::new(), MemoryEventLog::new())
}

fn collector(upstream: FakeUpstream, settings: CycleSettings) -> TestCollector {
    Collector::new(upstream, profile_tracker(), post_tracker(), settings)
}

async fn store_profile(
    tracker: &ProfileTracker,
    id: &str,
    observed_at: DateTime<Utc>,
    booster_number: Option<i64>,
) {
    tracker
        .snapshots()
        .put(&ProfileSnapshot::new(
            observation(id, 10),
            observed_at,
            booster_number,
        ))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Batch orchestration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn twelve_ids_make_two_batches_and_omitted_id_is_api_missing() {
    let mut upstream = FakeUpstream::with_profiles(ids(1..=12));
    upstream.omitted.insert("4".to_string());
    let tracker = profile_tracker();
    let mut summary = RunSummary::new("profiles");

    refresh_in_batches(
        &upstream,
        &tracker,
        &ids(1..=12),
        &batch_settings(),
        &mut summary,
    )
    .await
    .unwrap();

    assert_eq!(upstream.batch_sizes(), vec![10, 2]);

    let missing = summary.failures.counts();
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(missing.get(&FailureKind::ApiMissing), Some(&1));
    let record = &summary.failures.records()[0];
    assert_eq!(record.entity_id, "4");
    assert_eq!(record.handle, UNKNOWN_HANDLE);

    let mut first_batch_written = 0;
    for id in ids(1..=10) {
        if tracker.snapshots().get(&id).await.unwrap().is_some() {
            first_batch_written += 1;
        }
    }
    assert_eq!(first_batch_written, 9);
    assert!(tracker.snapshots().get("4").await.unwrap().is_none());
    assert_eq!(tracker.snapshots().len(), 11);
    assert_eq!(summary.created, 11);
    assert_eq!(summary.succeeded, 11);
}

#[tokio::test]
async fn unrequested_and_repeated_profiles_are_not_stored() {
    let mut upstream = FakeUpstream::with_profiles(ids(1..=2));
    upstream.extra_returns = vec![observation("1", 500), observation("999", 1)];
    let tracker = profile_tracker();
    let mut summary = RunSummary::new("profiles");
    summary.total = 2;

    refresh_in_batches(&upstream, &tracker, &ids(1..=2), &batch_settings(), &mut summary)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.unchanged, 0);
    assert!(!summary.has_failures());
    assert!((summary.success_rate() - 100.0).abs() < f64::EPSILON);
    assert_eq!(tracker.snapshots().len(), 2);
    assert!(tracker.snapshots().get("999").await.unwrap().is_none());

    let first = tracker.snapshots().get("1").await.unwrap().unwrap();
    assert_eq!(first.profile.followers, 10, "first copy of a repeated id wins");
}

#[tokio::test]
async fn undecodable_profile_is_a_fetch_error_not_api_missing() {
    let mut upstream = FakeUpstream::with_profiles(ids(1..=3));
    upstream.undecodable.insert("2".to_string());
    let tracker = profile_tracker();
    store_profile(&tracker, "2", Utc::now() - ChronoDuration::hours(30), None).await;
    let mut summary = RunSummary::new("profiles");

    refresh_in_batches(&upstream, &tracker, &ids(1..=3), &batch_settings(), &mut summary)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    let records = summary.failures.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, FailureKind::FetchError);
    assert_eq!(records[0].entity_id, "2");
    assert_eq!(records[0].handle, "user2");
    assert_eq!(records[0].reason, "could not decode profile");
    assert!(records[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("invalid type")));
    assert!(summary.failures.counts().get(&FailureKind::ApiMissing).is_none());
}

#[tokio::test]
async fn missing_id_resolves_stored_handle() {
    let mut upstream = FakeUpstream::with_profiles(ids(1..=3));
    upstream.omitted.insert("2".to_string());
    let tracker = profile_tracker();
    store_profile(&tracker, "2", Utc::now() - ChronoDuration::hours(30), None).await;
    let mut summary = RunSummary::new("profiles");

    refresh_in_batches(&upstream, &tracker, &ids(1..=3), &batch_settings(), &mut summary)
        .await
        .unwrap();

    let record = &summary.failures.records()[0];
    assert_eq!(record.kind, FailureKind::ApiMissing);
    assert_eq!(record.handle, "user2");
    assert_eq!(record.reason, "missing from batch response");
}

#[tokio::test]
async fn failed_batch_records_every_id_and_continues() {
    let mut upstream = FakeUpstream::with_profiles(ids(1..=12));
    upstream.failing_batch_ids.insert("3".to_string());
    let tracker = profile_tracker();
    let mut summary = RunSummary::new("profiles");

    refresh_in_batches(
        &upstream,
        &tracker,
        &ids(1..=12),
        &batch_settings(),
        &mut summary,
    )
    .await
    .unwrap();

    assert_eq!(upstream.batch_sizes(), vec![10, 2]);
    assert_eq!(
        summary.failures.counts().get(&FailureKind::BatchError),
        Some(&10)
    );
    let record = &summary.failures.records()[0];
    assert_eq!(record.error.as_deref(), Some("upstream error 503: Service unavailable"));
    assert_eq!(tracker.snapshots().len(), 2);
    assert_eq!(summary.succeeded, 2);
}

#[tokio::test]
async fn save_failure_is_recorded_and_batch_continues() {
    let upstream = FakeUpstream::with_profiles(ids(1..=4));
    let store: FlakyStore<ProfileSnapshot> =
        FlakyStore::new(HashMap::from([("2".to_string(), false)]));
    let tracker = ChangeTracker::new(store, MemoryEventLog::new());
    let mut summary = RunSummary::new("profiles");

    refresh_in_batches(&upstream, &tracker, &ids(1..=4), &batch_settings(), &mut summary)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 3);
    let records = summary.failures.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, FailureKind::SaveError);
    assert_eq!(records[0].entity_id, "2");
    assert_eq!(records[0].handle, "user2");
    assert_eq!(tracker.snapshots().inner.len(), 3);
}

#[tokio::test]
async fn fatal_storage_error_aborts_the_batch_run() {
    let upstream = FakeUpstream::with_profiles(ids(1..=12));
    let store: FlakyStore<ProfileSnapshot> =
        FlakyStore::new(HashMap::from([("2".to_string(), true)]));
    let tracker = ChangeTracker::new(store, MemoryEventLog::new());
    let mut summary = RunSummary::new("profiles");

    let err = refresh_in_batches(
        &upstream,
        &tracker,
        &ids(1..=12),
        &batch_settings(),
        &mut summary,
    )
    .await
    .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(upstream.batch_sizes(), vec![10], "second batch must not run");
    assert_eq!(tracker.snapshots().inner.len(), 1);
}

// ---------------------------------------------------------------------------
// Collection cycles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_profile_cycle_refreshes_only_old_profiles() {
    let upstream = FakeUpstream::with_profiles(ids(1..=2));
    upstream.set_followers("2", 99);
    let collector = collector(
        upstream,
        CycleSettings {
            only_stale_profiles: true,
            ..settings()
        },
    );
    let now = Utc::now();
    store_profile(collector.profiles(), "1", now - ChronoDuration::hours(1), Some(1)).await;
    store_profile(collector.profiles(), "2", now - ChronoDuration::hours(30), Some(2)).await;

    let summary = collector
        .run_collection_cycle(CycleTarget::Profiles)
        .await
        .unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.events_recorded, 1);
    assert!(!summary.has_failures());

    let events = collector.profiles().history("2", 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::ProfileUpdate);
    assert_eq!(events[0].changes[0].field, "followers");

    let stored = collector.profiles().snapshots().get("2").await.unwrap().unwrap();
    assert_eq!(stored.booster_number, Some(2), "refresh keeps the booster number");
}

#[tokio::test]
async fn identical_refresh_records_no_events() {
    let collector = collector(FakeUpstream::with_profiles(ids(1..=3)), settings());
    for id in ["1", "2", "3"] {
        store_profile(collector.profiles(), id, Utc::now() - ChronoDuration::hours(2), None).await;
    }

    let summary = collector
        .run_collection_cycle(CycleTarget::Profiles)
        .await
        .unwrap();

    assert_eq!(summary.unchanged, 3);
    assert_eq!(summary.events_recorded, 0);
    assert!(collector.profiles().events().is_empty());
    let stored = collector.profiles().snapshots().get("1").await.unwrap().unwrap();
    assert!(stored.observed_at > Utc::now() - ChronoDuration::minutes(1));
}

#[tokio::test]
async fn empty_store_cycle_makes_no_calls() {
    let collector = collector(FakeUpstream::default(), settings());
    let summary = collector
        .run_collection_cycle(CycleTarget::Profiles)
        .await
        .unwrap();
    assert_eq!(summary.total, 0);
    assert!((summary.success_rate() - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn unavailable_store_ends_cycle_with_storage_error() {
    let collector = collector(FakeUpstream::default(), settings());
    collector.profiles().snapshots().set_unavailable(true);

    let err = collector
        .run_collection_cycle(CycleTarget::Posts)
        .await
        .unwrap_err();
    assert!(matches!(err, CollectError::Storage(ref e) if e.is_fatal()));
}

#[tokio::test]
async fn post_cycle_caps_items_and_keeps_only_posts() {
    let upstream = FakeUpstream::with_profiles(ids(1..=1));
    let pages: Vec<Vec<PostObservation>> = (0..4)
        .map(|page| {
            let mut items: Vec<PostObservation> =
                (0..10).map(|i| tweet(&format!("t{page}-{i}"), 1)).collect();
            items.insert(3, retweet(&format!("rt{page}")));
            items
        })
        .collect();
    upstream.set_timeline("1", pages);
    let collector = collector(upstream, settings());
    store_profile(collector.profiles(), "1", Utc::now(), None).await;

    let summary = collector
        .run_collection_cycle(CycleTarget::Posts)
        .await
        .unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.items_saved, 25);
    assert_eq!(summary.created, 25);
    assert_eq!(collector.posts().snapshots().len(), 25);
    assert!(collector.posts().snapshots().get("rt0").await.unwrap().is_none());

    let cursors: Vec<Option<String>> = collector
        .upstream()
        .page_calls
        .lock()
        .unwrap()
        .iter()
        .map(|(_, cursor)| cursor.clone())
        .collect();
    assert_eq!(cursors, vec![None, Some("p1".to_string()), Some("p2".to_string())]);

    let post = collector.posts().snapshots().get("t0-0").await.unwrap().unwrap();
    assert_eq!(post.profile_id, "1");
    assert_eq!(post.username, "user1");
}

#[tokio::test]
async fn engagement_change_on_second_pass_records_one_event() {
    let upstream = FakeUpstream::with_profiles(ids(1..=1));
    upstream.set_timeline("1", vec![vec![tweet("a", 1), tweet("b", 1)]]);
    let collector = collector(upstream, settings());
    store_profile(collector.profiles(), "1", Utc::now(), None).await;

    let first = collector
        .run_collection_cycle(CycleTarget::Posts)
        .await
        .unwrap();
    assert_eq!(first.created, 2);

    collector
        .upstream()
        .set_timeline("1", vec![vec![tweet("a", 1), tweet("b", 7)]]);
    let second = collector
        .run_collection_cycle(CycleTarget::Posts)
        .await
        .unwrap();

    assert_eq!(second.updated, 1);
    assert_eq!(second.unchanged, 1);
    assert_eq!(second.events_recorded, 1);
    let events = collector.posts().history("b", 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::EngagementUpdate);
    assert_eq!(events[0].changes[0].field, "likeCount");

    let stored = collector.posts().snapshots().get("b").await.unwrap().unwrap();
    assert!(stored.first_seen_at < stored.last_updated_at);
}

#[tokio::test]
async fn timeline_failure_is_recorded_and_next_profile_runs() {
    let mut upstream = FakeUpstream::with_profiles(ids(1..=2));
    upstream.failing_timelines.insert("1".to_string());
    upstream.set_timeline("2", vec![vec![tweet("x", 0)]]);
    let collector = collector(upstream, settings());
    store_profile(collector.profiles(), "1", Utc::now(), None).await;
    store_profile(collector.profiles(), "2", Utc::now(), None).await;

    let summary = collector
        .run_collection_cycle(CycleTarget::Posts)
        .await
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.items_saved, 1);
    let record = &summary.failures.records()[0];
    assert_eq!(record.kind, FailureKind::FetchError);
    assert_eq!(record.entity_id, "1");
    assert_eq!(record.handle, "user1");
    assert_eq!(record.error.as_deref(), Some("upstream error 500: Internal error"));
}

#[tokio::test]
async fn undecodable_posts_are_reported_and_retweets_ignored() {
    let mut upstream = FakeUpstream::with_profiles(ids(1..=1));
    let undecoded = |id: &str, kind: &str| UndecodedItem {
        id: Some(id.to_string()),
        kind: Some(kind.to_string()),
        reason: "invalid type: map, expected i64".to_string(),
    };
    upstream.undecodable_posts.insert(
        "1".to_string(),
        vec![undecoded("bad", "tweet"), undecoded("rt-bad", "retweet")],
    );
    upstream.set_timeline("1", vec![vec![tweet("ok", 2)]]);
    let collector = collector(upstream, settings());
    store_profile(collector.profiles(), "1", Utc::now(), None).await;

    let summary = collector
        .run_collection_cycle(CycleTarget::Posts)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.items_saved, 1);
    let records = summary.failures.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, FailureKind::FetchError);
    assert_eq!(records[0].entity_id, "1");
    assert_eq!(records[0].reason, "could not decode post bad");
    assert_eq!(
        records[0].error.as_deref(),
        Some("invalid type: map, expected i64")
    );
}

// ---------------------------------------------------------------------------
// Adding and seeding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_profile_assigns_next_booster_number() {
    let collector = collector(FakeUpstream::with_profiles(ids(1..=2)), settings());
    store_profile(collector.profiles(), "1", Utc::now(), Some(4)).await;

    let added = collector.add_profile("@User2", None).await.unwrap();
    assert_eq!(added.outcome, UpsertOutcome::Created);
    assert_eq!(added.snapshot.booster_number, Some(5));
    assert_eq!(
        collector
            .profiles()
            .snapshots()
            .highest_booster_number()
            .await
            .unwrap(),
        Some(5)
    );
}

#[tokio::test]
async fn re_adding_without_number_keeps_existing_one() {
    let collector = collector(FakeUpstream::with_profiles(ids(1..=1)), settings());
    store_profile(collector.profiles(), "1", Utc::now(), Some(3)).await;

    let added = collector.add_profile("user1", None).await.unwrap();
    assert_eq!(added.outcome, UpsertOutcome::Unchanged);
    assert_eq!(added.snapshot.booster_number, Some(3));
}

#[tokio::test]
async fn explicit_number_change_is_a_booster_number_event() {
    let collector = collector(FakeUpstream::with_profiles(ids(1..=1)), settings());
    store_profile(collector.profiles(), "1", Utc::now(), Some(3)).await;

    collector.add_profile("user1", Some(8)).await.unwrap();

    let events = collector.profiles().events().by_handle("USER1", 5).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::BoosterNumberChange);
    assert_eq!(events[0].changes[0].old, serde_json::json!(3));
    assert_eq!(events[0].changes[0].new, serde_json::json!(8));
}

#[tokio::test]
async fn add_profile_rejects_blank_and_unknown_handles() {
    let collector = collector(FakeUpstream::with_profiles(ids(1..=1)), settings());

    let err = collector.add_profile("  @?x=1", None).await.unwrap_err();
    assert!(matches!(err, CollectError::InvalidUsername(_)));

    let err = collector.add_profile("nobody", None).await.unwrap_err();
    match err {
        CollectError::Fetch { handle, source } => {
            assert_eq!(handle, "nobody");
            assert_eq!(source.status, Some(404));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn seeding_stores_boosters_and_records_fetch_failures() {
    let collector = collector(FakeUpstream::with_profiles(ids(1..=2)), settings());
    let entries = vec![
        BoosterEntry {
            number: 1,
            username: "@user1".to_string(),
        },
        BoosterEntry {
            number: 2,
            username: "ghost".to_string(),
        },
        BoosterEntry {
            number: 3,
            username: "USER2".to_string(),
        },
    ];

    let summary = collector.seed_boosters(&entries).await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.created, 2);
    let record = &summary.failures.records()[0];
    assert_eq!(record.kind, FailureKind::FetchError);
    assert_eq!(record.entity_id, "#2");
    assert_eq!(record.handle, "ghost");

    let stored = collector.profiles().snapshots().get("2").await.unwrap().unwrap();
    assert_eq!(stored.booster_number, Some(3));
}
