//! HTTP client for the twitterapi.io REST API.

pub mod client;
pub mod error;
pub(crate) mod retry;
pub mod types;

pub use client::{ClientOptions, TwitterClient};
pub use error::TwitterError;
