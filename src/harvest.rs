//! # Harvest Service
//!
//! The request/response boundary of the crate: one [`HarvestRequest`] runs
//! seed, crawl and persist and produces a [`HarvestResponse`] describing the
//! corpus file that was written.
//!
//! A [`Harvester`] runs at most one crawl at a time. [`Harvester::harvest`]
//! waits for a running crawl to finish; [`Harvester::try_harvest`] fails
//! fast with [`Error::Busy`] instead.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, instrument};

use crate::crawler::{
    BrowserFetcher, BrowserPool, CrawlEvent, CrawlJob, CrawlOutcome, Crawler, CrawlerConfig,
    FallbackFetcher, FrontierSeeder, HttpFetcher, PageFetcher, Storage,
};
use crate::error::{Error, Result};

/// A topic query and the keywords that refine it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRequest {
    pub query: String,

    #[serde(default, alias = "keyword")]
    pub keywords: Vec<String>,
}

impl HarvestRequest {
    pub fn new(query: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            query: query.into(),
            keywords,
        }
    }
}

/// Summary of a successful harvest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestResponse {
    /// Human-readable status line
    pub message: String,

    /// File name of the corpus, without directory
    pub filename: String,

    /// Full path of the corpus file
    pub corpus_file_path: String,

    /// Number of accepted pages
    pub pages_scraped: usize,

    /// Sum of the accepted contents' lengths, in characters
    pub total_content_length: usize,

    /// Accepted page URLs in crawl order
    pub urls: Vec<String>,
}

/// Runs harvests one at a time over a shared fetch layer
pub struct Harvester {
    config: CrawlerConfig,
    storage: Storage,
    seeder: FrontierSeeder,
    fetcher: Box<dyn PageFetcher>,
    browser: Option<Arc<BrowserPool>>,
    events: Option<UnboundedSender<CrawlEvent>>,
    gate: Mutex<()>,
}

impl Harvester {
    /// Wire up seeding and fetching from `config`
    ///
    /// With the browser enabled, seeding and page rendering share one
    /// browser session; page fetches fall back to direct HTTP when Chrome
    /// cannot be started. Nothing is launched until the first harvest.
    pub fn new(config: CrawlerConfig, storage: Storage) -> Result<Self> {
        let browser = config
            .use_browser
            .then(|| Arc::new(BrowserPool::new(&config)));

        let seeder = FrontierSeeder::new(browser.clone(), &config);
        let fetcher = FallbackFetcher::new(
            browser
                .clone()
                .map(|pool| BrowserFetcher::new(pool, &config)),
            HttpFetcher::new(&config)?,
        );

        let mut harvester = Self::with_parts(config, storage, seeder, Box::new(fetcher));
        harvester.browser = browser;
        Ok(harvester)
    }

    /// Build a harvester around an existing seeder and fetch layer
    pub fn with_parts(
        config: CrawlerConfig,
        storage: Storage,
        seeder: FrontierSeeder,
        fetcher: Box<dyn PageFetcher>,
    ) -> Self {
        Self {
            config,
            storage,
            seeder,
            fetcher,
            browser: None,
            events: None,
            gate: Mutex::new(()),
        }
    }

    /// Send crawl progress events to `events`
    pub fn with_events(mut self, events: UnboundedSender<CrawlEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Run one harvest, waiting for any harvest already in progress
    pub async fn harvest(&self, request: &HarvestRequest) -> Result<HarvestResponse> {
        let _permit = self.gate.lock().await;
        self.run(request, None).await
    }

    /// Run one harvest, or fail with [`Error::Busy`] if one is in progress
    pub async fn try_harvest(&self, request: &HarvestRequest) -> Result<HarvestResponse> {
        let _permit = self.gate.try_lock().map_err(|_| Error::Busy)?;
        self.run(request, None).await
    }

    /// Run one harvest from explicit seed URLs instead of searching
    pub async fn harvest_seeds(
        &self,
        request: &HarvestRequest,
        seeds: Vec<String>,
    ) -> Result<HarvestResponse> {
        let _permit = self.gate.lock().await;
        self.run(request, Some(seeds)).await
    }

    /// Close the browser session, if one was started
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.browser {
            pool.shutdown().await;
        }
    }

    #[instrument(skip(self, request, seeds), fields(query = %request.query))]
    async fn run(
        &self,
        request: &HarvestRequest,
        seeds: Option<Vec<String>>,
    ) -> Result<HarvestResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(Error::InvalidRequest("query must not be empty".to_string()));
        }
        let keywords = request
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();
        let job = CrawlJob::new(query, keywords, &self.config);

        let mut crawler = Crawler::new(&self.config, &self.seeder, self.fetcher.as_ref());
        if let Some(events) = &self.events {
            crawler = crawler.with_events(events.clone());
        }
        let outcome = match seeds {
            Some(seeds) => crawler.crawl_from(&job, seeds).await?,
            None => crawler.crawl(&job).await?,
        };

        if outcome.records.is_empty() {
            return Err(Error::NoRelevantContent {
                visited: outcome.visited,
                last_error: outcome.last_error,
            });
        }

        let path = self.storage.persist(&outcome.records).await?;
        let response = summarize(&outcome, &path);
        info!(
            pages = response.pages_scraped,
            total_content_length = response.total_content_length,
            path = %response.corpus_file_path,
            "Harvest completed"
        );
        Ok(response)
    }
}

fn summarize(outcome: &CrawlOutcome, path: &std::path::Path) -> HarvestResponse {
    HarvestResponse {
        message: "Scraping completed successfully".to_string(),
        filename: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        corpus_file_path: path.display().to_string(),
        pages_scraped: outcome.records.len(),
        total_content_length: outcome.total_content_length(),
        urls: outcome.urls(),
    }
}
