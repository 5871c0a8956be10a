//! Page retrieval for the crawler module
//!
//! Two fetch paths sit behind [`PageFetcher`]: the automated browser, which
//! renders the page and expands collapsed sections before snapshotting, and
//! a direct HTTP GET used when the browser cannot be started.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::crawler::browser::{BrowserPool, SessionGuard};
use crate::crawler::config::CrawlerConfig;
use crate::crawler::error::FetchError;
use crate::crawler::{FetchVia, FetchedPage};

/// Retrieves the HTML of a single URL
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`, returning its HTML or why it could not be retrieved
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Direct HTTP fetch path
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Build a client with a browser-like user agent and the request timeout
    pub fn new(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn classify(&self, url: &Url, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Http(err)
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| self.classify(url, e))?;
        debug!(bytes = html.len(), "Fetched page over HTTP");
        Ok(FetchedPage {
            url: url.clone(),
            html,
            via: FetchVia::Http,
        })
    }
}

/// Browser fetch path
pub struct BrowserFetcher {
    pool: Arc<BrowserPool>,
    expand_attempts: u32,
}

impl BrowserFetcher {
    pub fn new(pool: Arc<BrowserPool>, config: &CrawlerConfig) -> Self {
        Self {
            pool,
            expand_attempts: config.expand_attempts.max(1),
        }
    }

    async fn render(&self, session: &SessionGuard<'_>, url: &Url) -> Result<FetchedPage, FetchError> {
        session.navigate(url).await?;

        for attempt in 1..=self.expand_attempts {
            match session.expand_sections().await {
                Ok(clicked) => {
                    if clicked > 0 {
                        debug!(clicked, "Expanded collapsed sections");
                    }
                    break;
                }
                Err(e) if attempt == self.expand_attempts => {
                    debug!(error = %e, "All UI interaction attempts failed");
                }
                Err(e) => debug!(attempt, error = %e, "UI interaction attempt failed"),
            }
        }

        let html = session.snapshot().await?;
        Ok(FetchedPage {
            url: url.clone(),
            html,
            via: FetchVia::Browser,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let session = self.pool.acquire().await?;
        let result = self.render(&session, url).await;
        session.release_after(&result).await;
        result
    }
}

/// Tries a primary path and degrades to a fallback when it is unavailable
///
/// Only [`FetchError::DriverUnavailable`] triggers the fallback; any other
/// primary failure is the page's result and is not retried. Once the
/// primary has been unavailable, every later fetch goes straight to the
/// fallback.
pub struct FallbackFetcher<P = BrowserFetcher, S = HttpFetcher> {
    primary: Option<P>,
    fallback: S,
    degraded: AtomicBool,
}

impl<P, S> FallbackFetcher<P, S> {
    pub fn new(primary: Option<P>, fallback: S) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<P, S> PageFetcher for FallbackFetcher<P, S>
where
    P: PageFetcher,
    S: PageFetcher,
{
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if let Some(primary) = &self.primary {
            if !self.degraded.load(Ordering::Relaxed) {
                match primary.fetch(url).await {
                    Err(e) if e.is_unavailable() => {
                        if !self.degraded.swap(true, Ordering::Relaxed) {
                            warn!(error = %e, "Browser not available, using direct HTTP fetch");
                        }
                    }
                    other => return other,
                }
            }
        }
        self.fallback.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    struct Unavailable;

    #[async_trait]
    impl PageFetcher for Unavailable {
        async fn fetch(&self, _url: &Url) -> Result<FetchedPage, FetchError> {
            Err(FetchError::DriverUnavailable("no chrome".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingUnavailable {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CountingUnavailable {
        async fn fetch(&self, _url: &Url) -> Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::DriverUnavailable("no chrome".to_string()))
        }
    }

    struct AlwaysTimeout;

    #[async_trait]
    impl PageFetcher for AlwaysTimeout {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
            Err(FetchError::Timeout {
                url: url.to_string(),
                secs: 30,
            })
        }
    }

    fn http() -> HttpFetcher {
        HttpFetcher::new(&CrawlerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_http_fetch_success() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/page")
            .match_header("user-agent", mockito::Matcher::Regex("Chrome".to_string()))
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><p>hello</p></body></html>")
            .expect(1)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/page", server.url())).unwrap();
        let page = http().fetch(&url).await.unwrap();

        assert_eq!(page.url, url);
        assert_eq!(page.via, FetchVia::Http);
        assert!(page.html.contains("hello"));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_fetch_rejects_error_status() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/missing", server.url())).unwrap();
        match http().fetch(&url).await {
            Err(FetchError::Status { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_fetch_network_error() {
        // Grab a free port and close it again so nothing is listening
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

        assert!(matches!(http().fetch(&url).await, Err(FetchError::Http(_))));
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_unavailable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html><body>fallback</body></html>")
            .create_async()
            .await;

        let fetcher = FallbackFetcher::new(Some(Unavailable), http());
        let url = Url::parse(&server.url()).unwrap();
        let page = fetcher.fetch(&url).await.unwrap();

        assert_eq!(page.via, FetchVia::Http);
        assert!(page.html.contains("fallback"));
    }

    #[tokio::test]
    async fn test_unavailable_primary_is_not_tried_again() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html><body>fallback</body></html>")
            .expect(3)
            .create_async()
            .await;

        let fetcher = FallbackFetcher::new(Some(CountingUnavailable::default()), http());
        for path in ["/a", "/b", "/c"] {
            let url = Url::parse(&format!("{}{}", server.url(), path)).unwrap();
            let page = fetcher.fetch(&url).await.unwrap();
            assert_eq!(page.via, FetchVia::Http);
        }

        let primary = fetcher.primary.as_ref().unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_primary_failure_is_not_retried() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let fetcher = FallbackFetcher::new(Some(AlwaysTimeout), http());
        let url = Url::parse(&server.url()).unwrap();

        assert!(matches!(
            fetcher.fetch(&url).await,
            Err(FetchError::Timeout { .. })
        ));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_chrome_degrades_to_http() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html><body>served over http</body></html>")
            .create_async()
            .await;

        let config = CrawlerConfig::builder()
            .chrome_executable("/nonexistent/harvest/chrome")
            .build();
        let pool = Arc::new(BrowserPool::new(&config));
        let fetcher = FallbackFetcher::new(
            Some(BrowserFetcher::new(pool, &config)),
            HttpFetcher::new(&config).unwrap(),
        );

        let url = Url::parse(&server.url()).unwrap();
        let page = fetcher.fetch(&url).await.unwrap();
        assert_eq!(page.via, FetchVia::Http);
    }
}
