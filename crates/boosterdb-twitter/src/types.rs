//! Response envelopes for the twitterapi.io endpoints.
//!
//! Item arrays are kept as raw JSON so one malformed record can be skipped
//! without discarding the rest of the page.

use serde::Deserialize;
use serde_json::Value;

/// Envelope `status` value for a successful call.
pub const STATUS_SUCCESS: &str = "success";

/// `GET twitter/user/info`
#[derive(Debug, Deserialize)]
pub struct UserInfoResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// `GET twitter/user/batch_info_by_ids`
#[derive(Debug, Deserialize)]
pub struct BatchUsersResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub users: Option<Vec<Value>>,
}

/// `GET twitter/user/last_tweets`
///
/// Tweets usually arrive under `data.tweets`; some responses carry them at
/// the top level instead.
#[derive(Debug, Deserialize)]
pub struct LastTweetsResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<TweetsData>,
    #[serde(default)]
    pub tweets: Option<Vec<Value>>,
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TweetsData {
    #[serde(default)]
    pub tweets: Option<Vec<Value>>,
}

impl LastTweetsResponse {
    /// The item array, wherever the upstream put it. `None` if absent.
    #[must_use]
    pub fn into_items(self) -> (Option<Vec<Value>>, Option<String>) {
        let cursor = if self.has_next_page {
            self.next_cursor.filter(|c| !c.is_empty())
        } else {
            None
        };
        let items = self.data.and_then(|d| d.tweets).or(self.tweets);
        (items, cursor)
    }
}

/// Body of a non-2xx response.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// `true` when the envelope either omits `status` or reports success.
#[must_use]
pub fn is_success(status: Option<&str>) -> bool {
    status.is_none_or(|s| s == STATUS_SUCCESS)
}
