//! Browser session management for the crawler module
//!
//! A pool of exactly one automated Chrome session. The session is created
//! lazily on the first checkout, health-checked on every later checkout and
//! replaced when it stops answering. Checkouts are scoped: a
//! [`SessionGuard`] hands the session back to the pool when dropped.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::crawler::config::CrawlerConfig;
use crate::crawler::error::FetchError;

/// Bound on the liveness probe
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on aborting in-flight page activity
const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

/// Interval between element lookups while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined })";

const ACCEPT_CONSENT: &str = r#"(() => {
    for (const button of document.querySelectorAll('button')) {
        const text = button.textContent || '';
        if (text.includes('Accept') || text.includes('I agree') || text.includes('Allow')) {
            button.click();
            return true;
        }
    }
    return false;
})()"#;

struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(width, height)
            .request_timeout(config.page_load_timeout())
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", config.user_agent));
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(FetchError::DriverUnavailable)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::DriverUnavailable(format!("Browser launch failed: {e}")))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(FetchError::DriverUnavailable(format!(
                    "Failed to open page: {e}"
                )));
            }
        };
        if let Err(e) = page
            .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
            .await
        {
            warn!(error = %e, "Failed to mask automation fingerprint");
        }

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    async fn is_alive(&self) -> bool {
        matches!(
            timeout(HEALTH_CHECK_TIMEOUT, self.page.url()).await,
            Ok(Ok(_))
        )
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "Browser close error");
        }
        self.handler.abort();
    }
}

/// Pool of a single browser session
pub struct BrowserPool {
    config: CrawlerConfig,
    slot: Mutex<Option<BrowserSession>>,
}

impl BrowserPool {
    /// Create an empty pool; nothing is launched until [`BrowserPool::acquire`]
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            config: config.clone(),
            slot: Mutex::new(None),
        }
    }

    /// Check out the session, launching or replacing it as needed
    ///
    /// Waits while another caller holds the session. Fails with
    /// [`FetchError::DriverUnavailable`] when Chrome cannot be started.
    pub async fn acquire(&self) -> Result<SessionGuard<'_>, FetchError> {
        let mut slot = self.slot.lock().await;
        let session = match slot.take() {
            Some(session) => {
                if session.is_alive().await {
                    session
                } else {
                    warn!("Browser session not responsive, creating a new one");
                    session.close().await;
                    BrowserSession::launch(&self.config).await?
                }
            }
            None => {
                let session = BrowserSession::launch(&self.config).await?;
                info!("Browser session started");
                session
            }
        };

        Ok(SessionGuard {
            slot,
            session: Some(session),
            healthy: true,
            config: &self.config,
        })
    }

    /// Whether a session is currently parked in the pool
    pub async fn has_session(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Load a search results page and return its rendered DOM
    ///
    /// Dismisses a consent interstitial if one shows up within the consent
    /// timeout, then waits the settle time before snapshotting.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn load_search_page(&self, url: &Url) -> Result<String, FetchError> {
        let session = self.acquire().await?;
        let result = async {
            session.navigate(url).await?;
            if session.dismiss_consent().await {
                debug!("Accepted cookies");
            }
            sleep(self.config.search_settle()).await;
            session.snapshot().await
        }
        .await;
        session.release_after(&result).await;
        result
    }

    /// Close the session, if any
    pub async fn shutdown(&self) {
        if let Some(session) = self.slot.lock().await.take() {
            session.close().await;
            info!("Browser session closed");
        }
    }
}

/// Exclusive checkout of the pooled session
///
/// Dropping the guard returns a healthy session to the pool and closes an
/// unhealthy one in the background.
pub struct SessionGuard<'a> {
    slot: MutexGuard<'a, Option<BrowserSession>>,
    session: Option<BrowserSession>,
    healthy: bool,
    config: &'a CrawlerConfig,
}

impl SessionGuard<'_> {
    fn page(&self) -> Result<&Page, FetchError> {
        self.session
            .as_ref()
            .map(|session| &session.page)
            .ok_or_else(|| FetchError::Browser("Session already released".to_string()))
    }

    /// Discard the session instead of returning it to the pool
    pub fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }

    /// Navigate to `url` within the page load timeout
    pub async fn navigate(&self, url: &Url) -> Result<(), FetchError> {
        let page = self.page()?;
        match timeout(self.config.page_load_timeout(), page.goto(url.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                secs: self.config.page_load_timeout_secs,
            }),
        }
    }

    /// Current DOM of the page as HTML
    pub async fn snapshot(&self) -> Result<String, FetchError> {
        Ok(self.page()?.content().await?)
    }

    /// Click a cookie consent button if one appears; never fails
    pub async fn dismiss_consent(&self) -> bool {
        let Ok(page) = self.page() else {
            return false;
        };
        let deadline = Instant::now() + self.config.consent_timeout();
        loop {
            let clicked = page
                .evaluate(ACCEPT_CONSENT)
                .await
                .ok()
                .and_then(|result| result.into_value::<bool>().ok())
                .unwrap_or(false);
            if clicked {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Click every collapsed section matching the expand selector
    ///
    /// Waits up to the element wait for sections to appear. Failed clicks
    /// are logged and skipped; only a failed lookup is an error.
    pub async fn expand_sections(&self) -> Result<usize, FetchError> {
        let page = self.page()?;
        let selector = self.config.expand_selector.as_str();
        let deadline = Instant::now() + self.config.element_wait();
        let sections = loop {
            let found = page.find_elements(selector).await?;
            if !found.is_empty() || Instant::now() >= deadline {
                break found;
            }
            sleep(POLL_INTERVAL).await;
        };
        if sections.is_empty() {
            debug!("No expandable sections found");
            return Ok(0);
        }

        debug!(count = sections.len(), "Found expandable sections");
        let mut clicked = 0;
        for section in &sections {
            match section.call_js_fn("function() { this.click(); }", false).await {
                Ok(_) => clicked += 1,
                Err(e) => debug!(error = %e, "Error clicking expandable section"),
            }
            sleep(self.config.expand_click_delay()).await;
        }
        Ok(clicked)
    }

    /// Stop any in-flight page activity and return the session
    ///
    /// Bounded and infallible.
    pub async fn release(self) {
        if let Ok(page) = self.page() {
            if let Ok(Err(e)) = timeout(RELEASE_TIMEOUT, page.evaluate("window.stop();")).await {
                debug!(error = %e, "Failed to stop page activity");
            }
        }
    }

    /// Release the session, discarding it first if `result` shows it broke
    pub async fn release_after<T>(mut self, result: &Result<T, FetchError>) {
        if result.as_ref().is_err_and(FetchError::is_session_fault) {
            self.mark_unhealthy();
        }
        self.release().await;
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if self.healthy {
            *self.slot = Some(session);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(session.close());
            }
            Err(_) => drop(session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_browser_is_unavailable() {
        let config = CrawlerConfig::builder()
            .chrome_executable("/nonexistent/harvest/chrome")
            .build();
        let pool = BrowserPool::new(&config);

        match pool.acquire().await {
            Err(e) => assert!(e.is_unavailable(), "unexpected error: {e}"),
            Ok(_) => panic!("Expected the browser to be unavailable"),
        }
        assert!(!pool.has_session().await);
    }

    #[tokio::test]
    async fn test_search_page_needs_a_browser() {
        let config = CrawlerConfig::builder()
            .chrome_executable("/nonexistent/harvest/chrome")
            .build();
        let pool = BrowserPool::new(&config);
        let url = Url::parse("https://www.bing.com/search?q=mars").unwrap();

        let result = pool.load_search_page(&url).await;
        assert!(matches!(result, Err(FetchError::DriverUnavailable(_))));
    }

    #[tokio::test]
    async fn test_shutdown_without_session_is_noop() {
        let pool = BrowserPool::new(&CrawlerConfig::default());
        pool.shutdown().await;
        assert!(!pool.has_session().await);
    }
}
