use async_trait::async_trait;
use thiserror::Error;

use crate::post::PostObservation;
use crate::profile::ProfileObservation;

/// A classified upstream failure: the HTTP status (when one was received)
/// and the message the upstream or transport produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upstream error {}: {message}", status_label(.status))]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "n/a".to_string(), |s| s.to_string())
}

/// A record the upstream returned that did not decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndecodedItem {
    /// The raw `id`, when the record carried a usable one.
    pub id: Option<String>,
    /// The raw `type`, when present.
    pub kind: Option<String>,
    pub reason: String,
}

/// One multi-profile lookup: the profiles that decoded, plus the ones that
/// came back but could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileBatch {
    pub profiles: Vec<ProfileObservation>,
    pub undecoded: Vec<UndecodedItem>,
}

/// One page of a cursor listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// `None` when the page body had no item array at all.
    pub items: Option<Vec<T>>,
    pub next_cursor: Option<String>,
    pub undecoded: Vec<UndecodedItem>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self {
            items: Some(items),
            next_cursor,
            undecoded: Vec::new(),
        }
    }

    #[must_use]
    pub fn malformed() -> Self {
        Self {
            items: None,
            next_cursor: None,
            undecoded: Vec::new(),
        }
    }
}

/// The retrieval operations the collector needs from the upstream.
#[async_trait]
pub trait TwitterUpstream: Send + Sync {
    async fn fetch_profile(&self, username: &str) -> Result<ProfileObservation, UpstreamError>;

    /// Profiles for every id the upstream still knows about. Ids it omits
    /// are absent from both halves of the result.
    async fn fetch_profiles(&self, ids: &[String]) -> Result<ProfileBatch, UpstreamError>;

    async fn fetch_posts_page(
        &self,
        user_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PostObservation>, UpstreamError>;
}
