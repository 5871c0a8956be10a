//! Error types for the harvest crate

use thiserror::Error;

use crate::crawler::FetchError;
use crate::crawler::storage::StorageError;

/// Result type for harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for harvest operations
///
/// This is what a caller of [`crate::harvest::Harvester`] sees. Per-page
/// failures never surface here; they are absorbed by the crawl and only
/// show up as the `last_error` of [`Error::NoRelevantContent`].
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be accepted as given
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Seeding produced no crawlable URL
    #[error("No URLs found")]
    NoUrlsFound,

    /// The crawl finished without accepting a single page
    #[error(
        "No relevant content found after visiting {visited} pages (last error: {})",
        .last_error.as_deref().unwrap_or("none")
    )]
    NoRelevantContent {
        /// Number of URLs fetched during the run
        visited: usize,
        /// The most recent per-page failure, if any
        last_error: Option<String>,
    },

    /// The corpus could not be written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A fetch client could not be constructed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Another harvest holds the run gate
    #[error("A harvest is already running")]
    Busy,
}
