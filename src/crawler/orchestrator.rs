//! Breadth-first crawl orchestration
//!
//! A run moves through three phases: seeding fills the work queue with the
//! seed URLs at depth 0, draining fetches one page at a time until the queue
//! empties or the page cap is reached, and then the run is done. All state
//! of a run lives in its [`CrawlRunContext`], so separate runs never share a
//! visited set or a record list.

use std::collections::{HashSet, VecDeque};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::crawler::config::CrawlerConfig;
use crate::crawler::content_extraction::{PageLink, analyze_page, is_pseudo_link};
use crate::crawler::error::{CrawlError, FetchError};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::seeder::FrontierSeeder;
use crate::crawler::{CrawlJob, FrontierEntry, PageRecord, normalize_url};

/// Pages must yield more than this many characters to be kept
const MIN_ACCEPTED_CHARS: usize = 20;

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Seeding,
    Draining,
    Done,
}

/// Progress notifications emitted during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    Seeded {
        count: usize,
    },
    PageAccepted {
        url: String,
        depth: u32,
        pages: usize,
        content_length: usize,
    },
    PageSkipped {
        url: String,
        reason: String,
    },
    PageFailed {
        url: String,
        error: String,
    },
    Finished {
        pages: usize,
        visited: usize,
    },
}

/// All mutable state of one crawl run
pub struct CrawlRunContext {
    job: CrawlJob,
    phase: RunPhase,
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    enqueued: HashSet<String>,
    records: Vec<PageRecord>,
    fetches: usize,
    last_error: Option<String>,
    deadline_hit: bool,
    started: Instant,
    events: Option<UnboundedSender<CrawlEvent>>,
}

impl CrawlRunContext {
    /// Fresh context for `job` with an empty queue and visited set
    pub fn new(job: CrawlJob, events: Option<UnboundedSender<CrawlEvent>>) -> Self {
        Self {
            job,
            phase: RunPhase::Seeding,
            queue: VecDeque::new(),
            visited: HashSet::new(),
            enqueued: HashSet::new(),
            records: Vec::new(),
            fetches: 0,
            last_error: None,
            deadline_hit: false,
            started: Instant::now(),
            events,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn job(&self) -> &CrawlJob {
        &self.job
    }

    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Queue `url` at `depth` unless it was already queued or visited
    fn enqueue(&mut self, url: url::Url, depth: u32) -> bool {
        let key = url.to_string();
        if self.visited.contains(&key) || !self.enqueued.insert(key) {
            return false;
        }
        self.queue.push_back(FrontierEntry { url, depth });
        true
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = events.send(event);
        }
    }

    fn into_outcome(self) -> CrawlOutcome {
        CrawlOutcome {
            records: self.records,
            visited: self.visited.len(),
            fetches: self.fetches,
            last_error: self.last_error,
            deadline_hit: self.deadline_hit,
        }
    }
}

/// Result of a finished run
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Accepted pages in crawl order
    pub records: Vec<PageRecord>,

    /// Size of the visited set at the end of the run
    pub visited: usize,

    /// Fetches issued
    pub fetches: usize,

    /// Most recent per-page failure
    pub last_error: Option<String>,

    /// Whether the run deadline cut draining short
    pub deadline_hit: bool,
}

impl CrawlOutcome {
    /// Total content length in characters
    pub fn total_content_length(&self) -> usize {
        self.records.iter().map(|r| r.content.chars().count()).sum()
    }

    /// URLs of the accepted pages, in crawl order
    pub fn urls(&self) -> Vec<String> {
        self.records.iter().map(|r| r.url.clone()).collect()
    }
}

/// An accepted page and the links found on it
struct PageOutcome {
    record: PageRecord,
    links: Vec<PageLink>,
}

/// Breadth-first crawler over a seeder and a fetch layer
pub struct Crawler<'a> {
    config: &'a CrawlerConfig,
    seeder: &'a FrontierSeeder,
    fetcher: &'a dyn PageFetcher,
    events: Option<UnboundedSender<CrawlEvent>>,
}

impl<'a> Crawler<'a> {
    pub fn new(
        config: &'a CrawlerConfig,
        seeder: &'a FrontierSeeder,
        fetcher: &'a dyn PageFetcher,
    ) -> Self {
        Self {
            config,
            seeder,
            fetcher,
            events: None,
        }
    }

    /// Send progress events to `events` during runs
    pub fn with_events(mut self, events: UnboundedSender<CrawlEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Seed from the job's query and crawl
    #[instrument(skip(self), fields(query = %job.query))]
    pub async fn crawl(&self, job: &CrawlJob) -> Result<CrawlOutcome, CrawlError> {
        let seeds = self.seeder.seed(&job.query, &job.keywords).await;
        self.crawl_from(job, seeds).await
    }

    /// Crawl from explicit seed URLs, skipping the seeder
    pub async fn crawl_from(
        &self,
        job: &CrawlJob,
        seeds: Vec<String>,
    ) -> Result<CrawlOutcome, CrawlError> {
        let mut ctx = CrawlRunContext::new(job.clone(), self.events.clone());

        for seed in &seeds {
            match normalize_url(seed) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    ctx.enqueue(url, 0);
                }
                Ok(_) => warn!(seed = %seed, "Skipping non-HTTP seed URL"),
                Err(e) => warn!(seed = %seed, error = %e, "Skipping invalid seed URL"),
            }
        }
        if ctx.queue.is_empty() {
            return Err(CrawlError::NoSeeds);
        }
        ctx.emit(CrawlEvent::Seeded {
            count: ctx.queue.len(),
        });

        info!(
            seeds = ctx.queue.len(),
            max_depth = job.max_depth,
            max_pages = job.max_pages,
            "Starting crawl"
        );
        ctx.phase = RunPhase::Draining;
        self.drain(&mut ctx).await;
        ctx.phase = RunPhase::Done;

        info!(
            pages = ctx.records.len(),
            visited = ctx.visited.len(),
            "Crawling completed"
        );
        ctx.emit(CrawlEvent::Finished {
            pages: ctx.records.len(),
            visited: ctx.visited.len(),
        });
        Ok(ctx.into_outcome())
    }

    async fn drain(&self, ctx: &mut CrawlRunContext) {
        let deadline = self.config.run_timeout();

        while ctx.records.len() < ctx.job.max_pages {
            if deadline.is_some_and(|limit| ctx.started.elapsed() >= limit) {
                warn!(
                    pages = ctx.records.len(),
                    pending = ctx.queue.len(),
                    "Run deadline reached, stopping crawl"
                );
                ctx.deadline_hit = true;
                break;
            }
            let Some(entry) = ctx.queue.pop_front() else {
                break;
            };

            if entry.depth > ctx.job.max_depth {
                continue;
            }
            if !ctx.visited.insert(entry.url.to_string()) {
                debug!(url = %entry.url, "URL already visited, skipping");
                continue;
            }

            ctx.fetches += 1;
            match self.fetch_and_extract(&ctx.job, &entry).await {
                Ok(page) => self.accept(ctx, &entry, page),
                Err(FetchError::ExtractionEmpty { length }) => {
                    debug!(url = %entry.url, length, "Content does not meet criteria");
                    ctx.emit(CrawlEvent::PageSkipped {
                        url: entry.url.to_string(),
                        reason: format!("only {length} characters of content"),
                    });
                }
                Err(e) => {
                    warn!(url = %entry.url, error = %e, "Error scraping page");
                    ctx.last_error = Some(e.to_string());
                    ctx.emit(CrawlEvent::PageFailed {
                        url: entry.url.to_string(),
                        error: e.to_string(),
                    });
                }
            }

            let delay = self.config.rate_limit();
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }

    /// Fetch one entry and decide whether its content is kept
    #[instrument(skip(self, job), fields(url = %entry.url, depth = entry.depth))]
    async fn fetch_and_extract(
        &self,
        job: &CrawlJob,
        entry: &FrontierEntry,
    ) -> Result<PageOutcome, FetchError> {
        let page = self.fetcher.fetch(&entry.url).await?;
        let analysis = analyze_page(&page.html, &entry.url);

        let length = analysis.content.chars().count();
        if length <= MIN_ACCEPTED_CHARS {
            return Err(FetchError::ExtractionEmpty { length });
        }

        // Keywords are reported only; acceptance goes by length alone
        let has_keywords = mentions_keywords(&analysis.content, &job.keywords);
        info!(length, has_keywords, via = ?page.via, "Content meets criteria");

        Ok(PageOutcome {
            record: PageRecord {
                url: entry.url.to_string(),
                content: analysis.content,
            },
            links: analysis.links,
        })
    }

    fn accept(&self, ctx: &mut CrawlRunContext, entry: &FrontierEntry, page: PageOutcome) {
        let content_length = page.record.content.chars().count();
        ctx.records.push(page.record);

        let origin = entry.url.origin();
        let mut added = 0;
        for link in page.links {
            if added >= self.config.max_links_per_page {
                break;
            }
            if link.text.is_empty() || is_pseudo_link(&link.url) || link.url.origin() != origin {
                continue;
            }
            if ctx.enqueue(link.url, entry.depth + 1) {
                added += 1;
            }
        }
        debug!(url = %entry.url, added, "Added links to queue");

        ctx.emit(CrawlEvent::PageAccepted {
            url: entry.url.to_string(),
            depth: entry.depth,
            pages: ctx.records.len(),
            content_length,
        });
    }
}

fn mentions_keywords(content: &str, keywords: &[String]) -> bool {
    let content = content.to_lowercase();
    keywords
        .iter()
        .any(|keyword| content.contains(&keyword.to_lowercase()))
}
