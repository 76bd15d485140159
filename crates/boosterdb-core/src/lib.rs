//! Domain model, configuration, and storage contracts shared by every
//! boosterdb crate.

pub mod app_config;
pub mod boosters;
pub mod config;
pub mod decode;
pub mod diff;
pub mod event;
pub mod failure;
pub mod memory;
pub mod post;
pub mod profile;
pub mod store;
pub mod summary;
pub mod upstream;

pub use app_config::{AppConfig, Environment};
pub use boosters::{load_boosters, normalize_username, BoosterEntry, BoostersFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use diff::{detect_changes, FieldChange, WatchedField};
pub use event::{ChangeEvent, EventKind};
pub use failure::{FailureKind, FailureRecord, FailureReport, UNKNOWN_HANDLE};
pub use memory::{MemoryEventLog, MemorySnapshotStore};
pub use post::{EngagementMetrics, PostObservation, PostSnapshot};
pub use profile::{ProfileObservation, ProfileSnapshot};
pub use store::{
    BoosterRegistry, ChangeTracker, EventLog, SnapshotStore, StoreError, Tracked, UpsertOutcome,
};
pub use summary::RunSummary;
pub use upstream::{
    Page, ProfileBatch, TwitterUpstream, UndecodedItem, UpstreamError,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read boosters file {path}: {source}")]
    BoostersFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse boosters file: {0}")]
    BoostersFileParse(#[from] serde_yaml::Error),

    #[error("invalid boosters file: {0}")]
    Validation(String),
}
