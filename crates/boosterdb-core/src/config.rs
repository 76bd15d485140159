use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_TWITTER_BASE_URL: &str = "https://api.twitterapi.io/";
const DEFAULT_USER_AGENT: &str = "boosterdb/0.1 (profile-tracking)";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it from a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(invalid(var, format!("expected a boolean, got \"{raw}\""))),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("BOOSTERDB_ENV", "development"))?;
    let log_level = or_default("BOOSTERDB_LOG_LEVEL", "info");
    let boosters_path = PathBuf::from(or_default(
        "BOOSTERDB_BOOSTERS_PATH",
        "./config/boosters.yaml",
    ));
    let twitter_api_key = lookup("TWITTER_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());
    let twitter_base_url = or_default("BOOSTERDB_TWITTER_BASE_URL", DEFAULT_TWITTER_BASE_URL);

    let db_max_connections = parse_u32("BOOSTERDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("BOOSTERDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("BOOSTERDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let request_timeout_secs = parse_u64("BOOSTERDB_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("BOOSTERDB_USER_AGENT", DEFAULT_USER_AGENT);
    let max_retries = parse_u32("BOOSTERDB_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("BOOSTERDB_RETRY_BACKOFF_BASE_MS", "1000")?;

    let batch_size = parse_usize("BOOSTERDB_BATCH_SIZE", "10")?;
    if batch_size == 0 {
        return Err(invalid(
            "BOOSTERDB_BATCH_SIZE",
            "batch size must be at least 1".to_string(),
        ));
    }
    let batch_delay_ms = parse_u64("BOOSTERDB_BATCH_DELAY_MS", "2000")?;
    let user_delay_ms = parse_u64("BOOSTERDB_USER_DELAY_MS", "1000")?;
    let page_delay_ms = parse_u64("BOOSTERDB_PAGE_DELAY_MS", "500")?;
    let max_posts_per_profile = parse_usize("BOOSTERDB_MAX_POSTS_PER_PROFILE", "100")?;
    let max_pages_per_profile = parse_usize("BOOSTERDB_MAX_PAGES_PER_PROFILE", "3")?;
    let only_stale_profiles = parse_bool("BOOSTERDB_ONLY_STALE_PROFILES", "true")?;
    let only_stale_posts = parse_bool("BOOSTERDB_ONLY_STALE_POSTS", "false")?;
    let stale_hours = parse_u64("BOOSTERDB_STALE_HOURS", "24")?;

    let profile_schedule = or_default("BOOSTERDB_PROFILE_SCHEDULE", "0 0 * * * *");
    let post_schedule = or_default("BOOSTERDB_POST_SCHEDULE", "0 30 */6 * * *");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        boosters_path,
        twitter_api_key,
        twitter_base_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        batch_size,
        batch_delay_ms,
        user_delay_ms,
        page_delay_ms,
        max_posts_per_profile,
        max_pages_per_profile,
        only_stale_profiles,
        only_stale_posts,
        stale_hours,
        profile_schedule,
        post_schedule,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BOOSTERDB_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
