//! # Bounded Web Crawler Module
//!
//! This module provides the harvesting pipeline: it seeds a frontier from a
//! topic query, crawls outward breadth-first within depth and page limits,
//! extracts usable English text from each page and persists the accepted
//! pages as a single corpus file.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: Bounds, delays, timeouts and browser settings
//! - `FrontierSeeder`: Search-engine seeding with a static topic fallback
//! - `BrowserPool`: A single lazily created, health-checked browser session
//! - `PageFetcher`: Browser rendering with a direct HTTP degraded path
//! - `Crawler`: The breadth-first orchestrator over a `CrawlRunContext`
//! - `Storage`: The corpus sink
//!
//! ## Features
//!
//! - Breadth-first exploration with a visited set per run
//! - Same-origin link expansion from accepted pages only
//! - Main-content detection and an ASCII-ratio English filter
//! - Per-page failures are isolated and never abort a run
//!
//! ## Usage
//!
//! Most callers go through [`crate::harvest::Harvester`], which wires these
//! pieces together and enforces one crawl at a time.

mod browser;
mod config;
mod content_extraction;
mod error;
mod fetcher;
mod orchestrator;
mod seeder;
pub mod storage;

pub use browser::{BrowserPool, SessionGuard};
pub use config::{CrawlerConfig, CrawlerConfigBuilder, DEFAULT_USER_AGENT};
pub use content_extraction::{
    PageAnalysis, PageLink, analyze_page, extract_content, extract_links, is_english_text,
    is_pseudo_link,
};
pub use error::{CrawlError, FetchError};
pub use fetcher::{BrowserFetcher, FallbackFetcher, HttpFetcher, PageFetcher};
pub use orchestrator::{CrawlEvent, CrawlOutcome, CrawlRunContext, Crawler, RunPhase};
pub use seeder::{
    FrontierSeeder, GENERIC_URLS, SEARCH_BACKENDS, SearchBackend, SearchResults, TOPIC_GROUPS,
    TopicGroup, fallback_urls, parse_search_results, search_string,
};
pub use storage::{Storage, StorageConfig, StorageError};

use serde::{Deserialize, Serialize};
use url::Url;

/// One harvest request's crawl parameters, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    /// Topic query
    pub query: String,

    /// Keywords, in request order
    pub keywords: Vec<String>,

    /// Deepest frontier depth that is still fetched
    pub max_depth: u32,

    /// Cap on accepted pages
    pub max_pages: usize,
}

impl CrawlJob {
    /// Create a job with the bounds taken from `config`
    pub fn new(query: impl Into<String>, keywords: Vec<String>, config: &CrawlerConfig) -> Self {
        Self {
            query: query.into(),
            keywords,
            max_depth: config.max_depth,
            max_pages: config.max_pages,
        }
    }
}

/// A queued URL and the depth it was discovered at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized URL
    pub url: Url,

    /// Hops from the seed it descends from
    pub depth: u32,
}

/// An accepted page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// URL of the page
    pub url: String,

    /// Extracted content of the page
    pub content: String,
}

/// How a page was retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchVia {
    /// Rendered by the automated browser
    Browser,
    /// Direct HTTP GET
    Http,
}

/// Raw HTML of a fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: Url,

    /// Document HTML or rendered DOM snapshot
    pub html: String,

    /// Which fetch path produced it
    pub via: FetchVia,
}

/// Normalize a URL for visited-set membership
///
/// Parsing lowercases the scheme and host and drops default ports. The
/// fragment is removed.
pub fn normalize_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw.trim())?;
    url.set_fragment(None);
    Ok(url)
}
