//! Collection orchestration: which profiles to refresh, how to walk the
//! upstream's batch and cursor endpoints, and how each observation reaches
//! storage.
//!
//! Everything here runs sequentially on the calling task. Per-entity
//! failures land in the run's [`boosterdb_core::FailureReport`]; only a
//! storage outage ends a run early.

pub mod batch;
pub mod cycle;
pub mod paginate;
pub mod schedule;
pub mod seed;

pub use batch::{refresh_in_batches, BatchSettings};
pub use cycle::{Collector, CycleSettings, CycleTarget};
pub use paginate::{collect_pages, fetch_recent_posts, PageLimits, PageWalk};
pub use schedule::{select_entities, stale_cutoff, SelectionMode};
pub use seed::{add_profile, AddedProfile};

use boosterdb_core::{StoreError, UpstreamError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    /// Storage failed in a way that affects every remaining entity.
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("failed to fetch @{handle}: {source}")]
    Fetch {
        handle: String,
        #[source]
        source: UpstreamError,
    },

    #[error("invalid username: {0:?}")]
    InvalidUsername(String),
}
