use boosterdb_core::UpstreamError;
use thiserror::Error;

/// Errors returned by the twitterapi.io client.
#[derive(Debug, Error)]
pub enum TwitterError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response. `message` comes from the `{error, message}` body
    /// when the upstream sent one.
    #[error("Twitter API error {status}: {message}")]
    Api { status: u16, message: String },

    /// 2xx response whose envelope `status` was not `"success"`.
    #[error("Twitter API failure: {0}")]
    Rejected(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("TWITTER_API_KEY is not set")]
    MissingApiKey,

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl TwitterError {
    /// HTTP status attached to this failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            TwitterError::Http(e) => e.status().map(|s| s.as_u16()),
            TwitterError::Api { status, .. } => Some(*status),
            TwitterError::Rejected(_)
            | TwitterError::Deserialize { .. }
            | TwitterError::MissingApiKey
            | TwitterError::InvalidBaseUrl { .. } => None,
        }
    }
}

impl From<TwitterError> for UpstreamError {
    fn from(err: TwitterError) -> Self {
        let status = err.status();
        let message = match &err {
            TwitterError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        };
        UpstreamError::new(status, message)
    }
}
