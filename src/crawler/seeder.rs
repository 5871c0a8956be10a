//! Frontier seeding for the crawler module
//!
//! Live search engines are tried first, in a fixed order, through the
//! browser. When none of them yields anything (or there is no browser) the
//! query is matched against a small table of topics with curated starting
//! URLs, so a crawl always has somewhere to begin.

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::crawler::browser::BrowserPool;
use crate::crawler::config::CrawlerConfig;

/// A search engine and where its organic results live in the DOM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBackend {
    pub name: &'static str,
    pub endpoint: &'static str,
    pub result_selector: &'static str,
}

impl SearchBackend {
    /// Results page URL for `search`
    pub fn search_url(&self, search: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(self.endpoint, &[("q", search)])
    }
}

/// Search engines in priority order
pub const SEARCH_BACKENDS: [SearchBackend; 3] = [
    SearchBackend {
        name: "bing",
        endpoint: "https://www.bing.com/search",
        result_selector: "li.b_algo h2 a",
    },
    SearchBackend {
        name: "duckduckgo",
        endpoint: "https://duckduckgo.com/",
        result_selector: "h2 a",
    },
    SearchBackend {
        name: "google",
        endpoint: "https://www.google.com/search",
        result_selector: "div.g a",
    },
];

/// Results pointing back at these never become seeds
const SEARCH_ENGINE_DOMAINS: [&str; 3] = ["google.com", "bing.com", "duckduckgo.com"];

/// A topic and the sites crawled for it when search comes up empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicGroup {
    pub name: &'static str,
    /// Case-insensitive substrings of the query that select this topic
    pub triggers: &'static [&'static str],
    pub urls: &'static [&'static str],
}

/// Topic fallback table; the first group with a matching trigger wins
pub const TOPIC_GROUPS: [TopicGroup; 4] = [
    TopicGroup {
        name: "climate/environment",
        triggers: &["climate", "environment", "renewable", "carbon", "energy"],
        urls: &[
            "https://www.un.org/en/climatechange",
            "https://www.epa.gov/climate-change",
            "https://www.nationalgeographic.com/environment/topic/climate-change",
            "https://www.climate.gov/",
            "https://www.ipcc.ch/",
            "https://www.bbc.com/news/science-environment",
            "https://www.theguardian.com/environment",
        ],
    },
    TopicGroup {
        name: "technology/ai",
        triggers: &["ai", "artificial intelligence", "machine learning", "technology"],
        urls: &[
            "https://www.technologyreview.com/",
            "https://www.wired.com/",
            "https://www.theverge.com/",
            "https://www.techcrunch.com/",
            "https://www.artificialintelligence-news.com/",
            "https://www.bbc.com/news/technology",
            "https://www.theguardian.com/technology",
            "https://www.nytimes.com/section/technology",
        ],
    },
    TopicGroup {
        name: "programming",
        triggers: &["python", "programming", "code", "software"],
        urls: &[
            "https://www.python.org/",
            "https://docs.python.org/3/tutorial/",
            "https://realpython.com/",
            "https://www.geeksforgeeks.org/python-programming-language/",
            "https://www.tutorialspoint.com/python/",
            "https://www.w3schools.com/python/",
            "https://www.programiz.com/python-programming",
        ],
    },
    TopicGroup {
        name: "space/science",
        triggers: &["space", "nasa", "mars", "satellite", "astronomy"],
        urls: &[
            "https://www.nasa.gov/",
            "https://www.space.com/",
            "https://www.esa.int/",
            "https://www.bbc.com/news/science-environment",
            "https://www.science.org/",
            "https://www.nature.com/",
        ],
    },
];

/// Encyclopedic sites used when no topic matches
pub const GENERIC_URLS: &[&str] = &[
    "https://www.wikipedia.org/",
    "https://www.britannica.com/",
    "https://www.encyclopedia.com/",
    "https://www.bbc.com/news",
    "https://www.theguardian.com/",
    "https://www.nytimes.com/",
];

/// Combined search string: the query followed by the keywords
pub fn search_string(query: &str, keywords: &[String]) -> String {
    std::iter::once(query)
        .chain(keywords.iter().map(String::as_str))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Static seeds for `query`; never empty
pub fn fallback_urls(query: &str) -> Vec<String> {
    let query = query.to_lowercase();
    let (name, urls) = TOPIC_GROUPS
        .iter()
        .find(|group| group.triggers.iter().any(|t| query.contains(t)))
        .map(|group| (group.name, group.urls))
        .unwrap_or(("generic", GENERIC_URLS));
    debug!(topic = name, "Selected fallback topic");
    urls.iter().map(|url| url.to_string()).collect()
}

/// Result anchors found on a search page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Elements matching the backend's result selector
    pub matched: usize,

    /// Usable seed URLs, deduplicated and capped
    pub urls: Vec<String>,
}

/// Pull seed candidates out of a rendered search results page
///
/// Relative targets are resolved against `page_url`. Non-HTTP targets and
/// anything on a search engine's own domain are dropped.
pub fn parse_search_results(
    html: &str,
    backend: &SearchBackend,
    page_url: &Url,
    cap: usize,
) -> SearchResults {
    let Ok(selector) = Selector::parse(backend.result_selector) else {
        warn!(backend = backend.name, "Invalid result selector");
        return SearchResults::default();
    };
    let document = Html::parse_document(html);

    let mut results = SearchResults::default();
    let mut seen = HashSet::new();
    for anchor in document.select(&selector) {
        results.matched += 1;
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| page_url.join(href).ok())
        else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") || is_search_engine(&url) {
            continue;
        }
        if results.urls.len() < cap && seen.insert(url.to_string()) {
            results.urls.push(url.to_string());
        }
    }
    results
}

fn is_search_engine(url: &Url) -> bool {
    url.host_str().is_some_and(|host| {
        SEARCH_ENGINE_DOMAINS
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    })
}

/// Turns a query and keywords into the initial frontier
pub struct FrontierSeeder {
    browser: Option<Arc<BrowserPool>>,
    max_seed_urls: usize,
}

impl FrontierSeeder {
    /// Seeder that searches through `browser` when one is given
    pub fn new(browser: Option<Arc<BrowserPool>>, config: &CrawlerConfig) -> Self {
        Self {
            browser,
            max_seed_urls: config.max_seed_urls,
        }
    }

    /// Seeder that goes straight to the topic fallback
    pub fn offline(config: &CrawlerConfig) -> Self {
        Self::new(None, config)
    }

    /// Seed URLs for a query, in crawl order
    #[instrument(skip(self))]
    pub async fn seed(&self, query: &str, keywords: &[String]) -> Vec<String> {
        if let Some(pool) = &self.browser {
            let search = search_string(query, keywords);
            if let Some(urls) = self.search(pool, &search).await {
                info!(count = urls.len(), "Seeded from search results");
                return urls;
            }
        }

        let urls = fallback_urls(query);
        info!(count = urls.len(), "Seeded from topic fallback");
        urls
    }

    async fn search(&self, pool: &BrowserPool, search: &str) -> Option<Vec<String>> {
        for backend in &SEARCH_BACKENDS {
            let url = match backend.search_url(search) {
                Ok(url) => url,
                Err(e) => {
                    warn!(backend = backend.name, error = %e, "Invalid search URL");
                    continue;
                }
            };

            let html = match pool.load_search_page(&url).await {
                Ok(html) => html,
                Err(e) if e.is_unavailable() => {
                    warn!(error = %e, "Browser not available for search");
                    return None;
                }
                Err(e) => {
                    warn!(backend = backend.name, error = %e, "Error with search engine");
                    continue;
                }
            };

            let results = parse_search_results(&html, backend, &url, self.max_seed_urls);
            if results.matched == 0 {
                debug!(backend = backend.name, "No results found");
                continue;
            }
            info!(
                backend = backend.name,
                matched = results.matched,
                usable = results.urls.len(),
                "Found search results"
            );
            // The first backend with any results wins, usable or not
            return (!results.urls.is_empty()).then_some(results.urls);
        }
        None
    }
}
