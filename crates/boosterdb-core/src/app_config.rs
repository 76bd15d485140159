use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub boosters_path: PathBuf,
    pub twitter_api_key: Option<String>,
    pub twitter_base_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    /// Ids per `batch_info_by_ids` call. Always at least 1.
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    /// Pause between consecutive profiles in per-entity cycles (posts, seeding).
    pub user_delay_ms: u64,
    pub page_delay_ms: u64,
    pub max_posts_per_profile: usize,
    pub max_pages_per_profile: usize,
    pub only_stale_profiles: bool,
    pub only_stale_posts: bool,
    pub stale_hours: u64,
    pub profile_schedule: String,
    pub post_schedule: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("boosters_path", &self.boosters_path)
            .field("database_url", &"[redacted]")
            .field(
                "twitter_api_key",
                &self.twitter_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("twitter_base_url", &self.twitter_base_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("batch_size", &self.batch_size)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("user_delay_ms", &self.user_delay_ms)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("max_posts_per_profile", &self.max_posts_per_profile)
            .field("max_pages_per_profile", &self.max_pages_per_profile)
            .field("only_stale_profiles", &self.only_stale_profiles)
            .field("only_stale_posts", &self.only_stale_posts)
            .field("stale_hours", &self.stale_hours)
            .field("profile_schedule", &self.profile_schedule)
            .field("post_schedule", &self.post_schedule)
            .finish()
    }
}
