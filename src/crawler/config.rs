//! # Crawler Configuration Module
//!
//! This module provides configuration options for a harvest run, including
//! the crawl bounds, politeness delay, fetch timeouts and browser settings.
//! It uses a builder pattern for flexible configuration.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: The main configuration struct with crawler parameters
//! - `CrawlerConfigBuilder`: Builder pattern implementation for easier configuration
//!
//! ## Features
//!
//! - Defaults equal the fixed harvest constants (depth 2, 15 pages, 0.5s delay,
//!   5 links per page, 5 search results)
//! - Separate bounds for HTTP requests, page loads and element waits
//! - Optional overall run deadline
//! - Browser toggle for environments without Chrome

use std::path::PathBuf;
use std::time::Duration;

/// Desktop Chrome user agent sent on both fetch paths
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl
    pub max_depth: u32,

    /// Maximum number of accepted pages
    pub max_pages: usize,

    /// Pause in milliseconds between successive page fetches
    pub rate_limit_ms: u64,

    /// Maximum outbound links enqueued per accepted page
    pub max_links_per_page: usize,

    /// Maximum seed URLs taken from search results
    pub max_seed_urls: usize,

    /// User agent to use for requests
    pub user_agent: String,

    /// Timeout for direct HTTP requests, in seconds
    pub request_timeout_secs: u64,

    /// Timeout for a browser page load, in seconds
    pub page_load_timeout_secs: u64,

    /// How long to wait for elements to appear, in seconds
    pub element_wait_secs: u64,

    /// How long to look for a consent button on search pages, in seconds
    pub consent_timeout_secs: u64,

    /// Pause after a search page loads before reading results, in milliseconds
    pub search_settle_ms: u64,

    /// CSS selector for collapsed sections to expand before snapshotting
    pub expand_selector: String,

    /// Attempts at the expansion pass before giving up
    pub expand_attempts: u32,

    /// Pause after each expansion click, in milliseconds
    pub expand_click_delay_ms: u64,

    /// Whether to try browser automation at all
    pub use_browser: bool,

    /// Explicit Chrome executable; auto-detected when `None`
    pub chrome_executable: Option<PathBuf>,

    /// Browser viewport
    pub window_size: (u32, u32),

    /// Overall run deadline in seconds; unbounded when `None`
    pub run_timeout_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 15,
            rate_limit_ms: 500,
            max_links_per_page: 5,
            max_seed_urls: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 10,
            page_load_timeout_secs: 30,
            element_wait_secs: 10,
            consent_timeout_secs: 3,
            search_settle_ms: 3000,
            expand_selector: ".collapsible".to_string(),
            expand_attempts: 3,
            expand_click_delay_ms: 1000,
            use_browser: true,
            chrome_executable: None,
            window_size: (1920, 1080),
            run_timeout_secs: None,
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the maximum depth to crawl
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Set the maximum number of accepted pages
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the delay in milliseconds between page fetches
    pub fn rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.config.rate_limit_ms = rate_limit_ms;
        self
    }

    /// Set the per-page cap on enqueued links
    pub fn max_links_per_page(mut self, max_links_per_page: usize) -> Self {
        self.config.max_links_per_page = max_links_per_page;
        self
    }

    /// Set the cap on seed URLs taken from search
    pub fn max_seed_urls(mut self, max_seed_urls: usize) -> Self {
        self.config.max_seed_urls = max_seed_urls;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the direct HTTP request timeout in seconds
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the browser page load timeout in seconds
    pub fn page_load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_load_timeout_secs = secs;
        self
    }

    /// Set how long to wait for expandable elements in seconds
    pub fn element_wait_secs(mut self, secs: u64) -> Self {
        self.config.element_wait_secs = secs;
        self
    }

    /// Set the selector of sections to expand
    pub fn expand_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.expand_selector = selector.into();
        self
    }

    /// Set whether browser automation is attempted
    pub fn use_browser(mut self, use_browser: bool) -> Self {
        self.config.use_browser = use_browser;
        self
    }

    /// Set an explicit Chrome executable
    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    /// Set the overall run deadline in seconds
    pub fn run_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.run_timeout_secs = secs;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Get the politeness delay as a Duration
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    pub fn search_settle(&self) -> Duration {
        Duration::from_millis(self.search_settle_ms)
    }

    pub fn expand_click_delay(&self) -> Duration {
        Duration::from_millis(self.expand_click_delay_ms)
    }

    /// Get the run deadline, if one is configured
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}
