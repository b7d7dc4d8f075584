use async_trait::async_trait;
use gist_common::{GistError, Result};
use gist_drivers::{DriverOptions, GistDriver, GistPage, NavigationError, NavigationStatus};
use std::sync::Arc;
use std::time::Duration;

/// Returns `{ title, description }` as rendered by the page.
pub const METADATA_SCRIPT: &str = r#"
    const pick = (sel) => {
        const el = document.querySelector(sel);
        return el ? (el.getAttribute('content') || '').trim() : '';
    };
    return {
        title: (document.title || '').trim(),
        description: pick('meta[name="description"]') || pick('meta[property="og:description"]'),
    };
"#;

/// One open tab.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Load `url`, giving up after `timeout`. `Ok(None)` means no response was observed.
    async fn navigate(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<Option<NavigationStatus>, NavigationError>;

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Full rendered HTML of the current document.
    async fn content(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    async fn close(&self) -> Result<()>;
}

/// One browser session.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;
    async fn close(&self) -> Result<()>;
}

/// Starts a browser session for a pipeline run.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Browser>>;
}

/// Map a navigation result onto the retry taxonomy.
///
/// 429, 5xx, timeouts, missing responses and driver failures are retryable;
/// any other 4xx is permanent.
pub fn classify_navigation(
    url: &str,
    outcome: std::result::Result<Option<NavigationStatus>, NavigationError>,
) -> Result<()> {
    match outcome {
        Err(NavigationError::Timeout(detail)) => Err(GistError::transient(format!(
            "navigation to {url} timed out: {detail}"
        ))),
        Err(NavigationError::Failed(detail)) => Err(GistError::transient(format!(
            "navigation to {url} failed: {detail}"
        ))),
        Ok(None) => Err(GistError::transient(format!("no response received from {url}"))),
        Ok(Some(NavigationStatus {
            status,
            status_text,
        })) => {
            let message = format!("HTTP {status} {status_text}").trim_end().to_string();
            match status {
                429 | 500..=599 => Err(GistError::transient(message)),
                400..=499 => Err(GistError::permanent(message)),
                _ => Ok(()),
            }
        }
    }
}

/// A launched browser and its working tab, closed exactly once.
///
/// [`BrowserSession::close`] is the normal exit. If the session is dropped
/// unclosed, for instance because the future driving it was cancelled, the
/// close runs on a spawned task instead.
pub(crate) struct BrowserSession {
    browser: Arc<dyn Browser>,
    page: Arc<dyn BrowserPage>,
    closed: bool,
}

impl BrowserSession {
    pub(crate) async fn open(launcher: &dyn BrowserLauncher) -> Result<Self> {
        let browser = launcher.launch().await?;
        match browser.new_page().await {
            Ok(page) => Ok(Self {
                browser: Arc::from(browser),
                page: Arc::from(page),
                closed: false,
            }),
            Err(err) => {
                close_browser(browser.as_ref()).await;
                Err(err)
            }
        }
    }

    pub(crate) fn page(&self) -> &dyn BrowserPage {
        self.page.as_ref()
    }

    pub(crate) async fn close(mut self) {
        self.closed = true;
        shut_down(self.page.as_ref(), self.browser.as_ref()).await;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let (page, browser) = (Arc::clone(&self.page), Arc::clone(&self.browser));
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("browser.session.dropped");
                handle.spawn(async move { shut_down(page.as_ref(), browser.as_ref()).await });
            }
            Err(_) => tracing::error!("browser.session.leaked"),
        }
    }
}

async fn shut_down(page: &dyn BrowserPage, browser: &dyn Browser) {
    if let Err(err) = page.close().await {
        tracing::warn!(error = %err, "browser.page.close_failed");
    }
    close_browser(browser).await;
}

async fn close_browser(browser: &dyn Browser) {
    if let Err(err) = browser.close().await {
        tracing::warn!(error = %err, "browser.close_failed");
    }
}

/// Launches Chromedriver-backed sessions.
#[derive(Debug, Clone, Default)]
pub struct WebDriverLauncher {
    options: DriverOptions,
}

impl WebDriverLauncher {
    pub fn new(options: DriverOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>> {
        let driver = GistDriver::connect(&self.options)
            .await
            .map_err(|e| GistError::transient(format!("browser start-up failed: {e:#}")))?;
        Ok(Box::new(driver))
    }
}

#[async_trait]
impl Browser for GistDriver {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        let page = GistDriver::new_page(self).await?;
        Ok(Box::new(page))
    }

    async fn close(&self) -> Result<()> {
        Ok(GistDriver::close(self).await?)
    }
}

#[async_trait]
impl BrowserPage for GistPage {
    async fn navigate(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<Option<NavigationStatus>, NavigationError> {
        match tokio::time::timeout(timeout, self.goto(url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(NavigationError::Timeout(format!(
                "no load event after {} ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        Ok(GistPage::evaluate(self, script).await?)
    }

    async fn content(&self) -> Result<String> {
        Ok(GistPage::content(self).await?)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(GistPage::current_url(self).await?)
    }

    async fn close(&self) -> Result<()> {
        Ok(GistPage::close(self).await?)
    }
}
