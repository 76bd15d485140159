//! HTTP client for the twitterapi.io REST API.
//!
//! Wraps `reqwest` with API key handling, envelope checks, and per-call
//! transient retry. Non-2xx responses become [`TwitterError::Api`] carrying
//! the body's message; 2xx responses whose envelope reports failure become
//! [`TwitterError::Rejected`].

use std::time::Duration;

use async_trait::async_trait;
use boosterdb_core::{
    AppConfig, Page, PostObservation, ProfileBatch, ProfileObservation, TwitterUpstream,
    UndecodedItem, UpstreamError,
};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TwitterError;
use crate::retry::retry_with_backoff;
use crate::types::{
    is_success, BatchUsersResponse, ErrorBody, LastTweetsResponse, UserInfoResponse,
};

const DEFAULT_BASE_URL: &str = "https://api.twitterapi.io/";
const API_KEY_HEADER: &str = "X-API-Key";

const USER_INFO_PATH: &str = "twitter/user/info";
const BATCH_USERS_PATH: &str = "twitter/user/batch_info_by_ids";
const LAST_TWEETS_PATH: &str = "twitter/user/last_tweets";

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "boosterdb/0.1 (profile-tracking)".to_string(),
            max_retries: 3,
            retry_backoff_base_ms: 1_000,
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.request_timeout_secs,
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            retry_backoff_base_ms: config.retry_backoff_base_ms,
        }
    }
}

/// Client for the twitterapi.io REST API.
///
/// Use [`TwitterClient::new`] for production or [`TwitterClient::with_base_url`]
/// to point at a mock server in tests.
pub struct TwitterClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    retry_backoff_base_ms: u64,
}

impl TwitterClient {
    /// Creates a new client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`TwitterError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, options: &ClientOptions) -> Result<Self, TwitterError> {
        Self::with_base_url(api_key, options, DEFAULT_BASE_URL)
    }

    /// Builds a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TwitterError::MissingApiKey`] if no key is configured, or
    /// any error [`TwitterClient::with_base_url`] can return.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, TwitterError> {
        let api_key = config
            .twitter_api_key
            .as_deref()
            .ok_or(TwitterError::MissingApiKey)?;
        Self::with_base_url(
            api_key,
            &ClientOptions::from_app_config(config),
            &config.twitter_base_url,
        )
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`TwitterError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`TwitterError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        options: &ClientOptions,
        base_url: &str,
    ) -> Result<Self, TwitterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(options.user_agent.as_str())
            .build()?;

        // Exactly one trailing slash so relative endpoint paths join under it.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| TwitterError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            max_retries: options.max_retries,
            retry_backoff_base_ms: options.retry_backoff_base_ms,
        })
    }

    /// Fetches one profile by handle.
    ///
    /// # Errors
    ///
    /// - [`TwitterError::Api`] on a non-2xx status.
    /// - [`TwitterError::Rejected`] if the envelope reports failure or has no profile.
    /// - [`TwitterError::Http`] on network failure.
    /// - [`TwitterError::Deserialize`] if the body does not match the expected shape.
    pub async fn get_user_info(&self, username: &str) -> Result<ProfileObservation, TwitterError> {
        let url = self.build_url(USER_INFO_PATH, &[("userName", username)])?;
        let envelope: UserInfoResponse = self.get_json(&url).await?;

        if !is_success(envelope.status.as_deref()) {
            return Err(TwitterError::Rejected(
                envelope.msg.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let data = envelope
            .data
            .filter(|d| !d.is_null())
            .ok_or_else(|| TwitterError::Rejected(format!("no profile data for @{username}")))?;

        serde_json::from_value(data).map_err(|e| TwitterError::Deserialize {
            context: format!("user/info(userName={username})"),
            source: e,
        })
    }

    /// Fetches many profiles in one call. Ids the upstream no longer knows
    /// about are omitted from the result, not reported as errors. Records
    /// that come back but do not decode are listed in
    /// [`ProfileBatch::undecoded`].
    ///
    /// # Errors
    ///
    /// - [`TwitterError::Api`] on a non-2xx status.
    /// - [`TwitterError::Rejected`] if the envelope reports failure or has no `users` array.
    /// - [`TwitterError::Http`] on network failure.
    pub async fn get_users_by_ids(
        &self,
        ids: &[String],
    ) -> Result<ProfileBatch, TwitterError> {
        if ids.is_empty() {
            return Ok(ProfileBatch::default());
        }

        let joined = ids.join(",");
        let url = self.build_url(BATCH_USERS_PATH, &[("userIds", &joined)])?;
        let envelope: BatchUsersResponse = self.get_json(&url).await?;

        if !is_success(envelope.status.as_deref()) {
            return Err(TwitterError::Rejected(
                envelope.msg.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        let users = envelope.users.ok_or_else(|| {
            let message = envelope
                .msg
                .unwrap_or_else(|| "missing users array".to_string());
            TwitterError::Rejected(message)
        })?;

        let (profiles, undecoded) = parse_items(users, "batch_info_by_ids");
        Ok(ProfileBatch {
            profiles,
            undecoded,
        })
    }

    /// Fetches one page of a user's timeline.
    ///
    /// A page without any item array comes back as [`Page::malformed`].
    ///
    /// # Errors
    ///
    /// - [`TwitterError::Api`] on a non-2xx status.
    /// - [`TwitterError::Rejected`] if the envelope reports failure.
    /// - [`TwitterError::Http`] on network failure.
    pub async fn get_last_tweets(
        &self,
        user_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PostObservation>, TwitterError> {
        let mut params = vec![("userId", user_id)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        let url = self.build_url(LAST_TWEETS_PATH, &params)?;
        let envelope: LastTweetsResponse = self.get_json(&url).await?;

        if !is_success(envelope.status.as_deref()) {
            let message = envelope
                .message
                .or(envelope.msg)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(TwitterError::Rejected(message));
        }

        let (raw, next_cursor) = envelope.into_items();
        let Some(raw) = raw else {
            return Ok(Page::malformed());
        };
        let (items, undecoded) = parse_items(raw, "last_tweets");
        Ok(Page {
            items: Some(items),
            next_cursor,
            undecoded,
        })
    }

    /// Builds the full request URL with properly percent-encoded query parameters.
    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, TwitterError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| TwitterError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// GET with transient retry, then status and JSON checks.
    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, TwitterError> {
        let body = retry_with_backoff(self.max_retries, self.retry_backoff_base_ms, || {
            self.request_once(url)
        })
        .await?;

        serde_json::from_str(&body).map_err(|e| TwitterError::Deserialize {
            context: url.path().to_string(),
            source: e,
        })
    }

    async fn request_once(&self, url: &Url) -> Result<String, TwitterError> {
        let response = self
            .client
            .get(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TwitterError::Api {
                status: status.as_u16(),
                message: error_message(&body, status.canonical_reason()),
            });
        }

        Ok(body)
    }
}

/// Pulls the human-readable message out of a `{error, message}` error body.
fn error_message(body: &str, fallback: Option<&str>) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.msg))
        .filter(|m| !m.trim().is_empty())
        .or_else(|| fallback.map(str::to_string))
        .unwrap_or_else(|| "Invalid JSON from Twitter API".to_string())
}

/// Deserializes each raw item independently. Items that fail are returned
/// separately with their raw id and type so the caller can report them.
fn parse_items<T: DeserializeOwned>(
    raw: Vec<Value>,
    context: &str,
) -> (Vec<T>, Vec<UndecodedItem>) {
    let mut parsed = Vec::with_capacity(raw.len());
    let mut undecoded = Vec::new();

    for item in raw {
        let id = raw_string(&item, "id");
        let kind = raw_string(&item, "type");
        match serde_json::from_value::<T>(item) {
            Ok(value) => parsed.push(value),
            Err(e) => {
                tracing::warn!(context, id = ?id, error = %e, "could not decode item");
                undecoded.push(UndecodedItem {
                    id,
                    kind,
                    reason: e.to_string(),
                });
            }
        }
    }

    (parsed, undecoded)
}

/// A string or numeric field of a raw record, as a string.
fn raw_string(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl TwitterUpstream for TwitterClient {
    async fn fetch_profile(&self, username: &str) -> Result<ProfileObservation, UpstreamError> {
        self.get_user_info(username).await.map_err(UpstreamError::from)
    }

    async fn fetch_profiles(&self, ids: &[String]) -> Result<ProfileBatch, UpstreamError> {
        self.get_users_by_ids(ids).await.map_err(UpstreamError::from)
    }

    async fn fetch_posts_page(
        &self,
        user_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PostObservation>, UpstreamError> {
        self.get_last_tweets(user_id, cursor)
            .await
            .map_err(UpstreamError::from)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
