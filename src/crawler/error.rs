//! Error types for the crawler module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Why a single URL produced no page record
///
/// This is the error half of the per-URL result the orchestrator matches
/// on. None of these abort a run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Browser automation could not be started
    #[error("Browser unavailable: {0}")]
    DriverUnavailable(String),

    /// The page did not load within the allotted time
    #[error("Timed out after {secs}s fetching {url}")]
    Timeout {
        /// URL being fetched
        url: String,
        /// Timeout that elapsed
        secs: u64,
    },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("Unexpected status {status} for {url}")]
    Status {
        /// URL being fetched
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The browser session failed mid-page
    #[error("Browser error: {0}")]
    Browser(String),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The page yielded too little usable text to keep
    #[error("Extracted content too short ({length} chars)")]
    ExtractionEmpty {
        /// Length of what was extracted
        length: usize,
    },
}

impl FetchError {
    /// Whether this error means the browser path cannot be used at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FetchError::DriverUnavailable(_))
    }

    /// Whether the browser session should be discarded after this error
    pub fn is_session_fault(&self) -> bool {
        matches!(self, FetchError::Browser(_))
    }
}

impl From<chromiumoxide::error::CdpError> for FetchError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        FetchError::Browser(err.to_string())
    }
}

/// Run-level crawl failures
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Neither search nor the provided seeds yielded a usable URL
    #[error("No seed URLs to crawl")]
    NoSeeds,
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::NoSeeds => CrateError::NoUrlsFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(FetchError::DriverUnavailable("no chrome".into()).is_unavailable());
        assert!(!FetchError::Browser("closed".into()).is_unavailable());
        assert!(FetchError::Browser("closed".into()).is_session_fault());
        assert!(
            !FetchError::Timeout {
                url: "https://example.com".into(),
                secs: 10
            }
            .is_session_fault()
        );
    }

    #[test]
    fn test_no_seeds_maps_to_no_urls() {
        let err: CrateError = CrawlError::NoSeeds.into();
        assert!(matches!(err, CrateError::NoUrlsFound));
    }

    #[test]
    fn test_no_relevant_content_message() {
        let err = CrateError::NoRelevantContent {
            visited: 4,
            last_error: Some("Timed out after 10s fetching https://a.test/".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 pages"));
        assert!(msg.contains("Timed out"));

        let err = CrateError::NoRelevantContent {
            visited: 0,
            last_error: None,
        };
        assert!(err.to_string().ends_with("(last error: none)"));
    }
}
