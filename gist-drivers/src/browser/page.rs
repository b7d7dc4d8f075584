use crate::browser::stealth::{StealthProfile, StealthScripts};
use anyhow::{Context, Result};
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::WindowHandle;
use fantoccini::Client;
use serde::{Deserialize, Serialize};

/// Reads the main-document response status recorded by the browser.
const NAVIGATION_STATUS_SCRIPT: &str = r#"
    const entry = performance.getEntriesByType('navigation')[0];
    if (!entry || !entry.responseStatus) { return null; }
    return entry.responseStatus;
"#;

/// HTTP status of the main document after a navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationStatus {
    pub status: u16,
    pub status_text: String,
}

impl NavigationStatus {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("navigation timed out: {0}")]
    Timeout(String),
    #[error("navigation failed: {0}")]
    Failed(String),
}

/// A single browser tab.
pub struct GistPage {
    client: Client,
    home: WindowHandle,
    stealth: StealthProfile,
}

impl GistPage {
    pub(crate) fn new(client: Client, home: WindowHandle, stealth: StealthProfile) -> Self {
        Self {
            client,
            home,
            stealth,
        }
    }

    /// Navigate to `url` and report the main-document status, if the browser recorded one.
    pub async fn goto(&self, url: &str) -> Result<Option<NavigationStatus>, NavigationError> {
        if let Err(err) = self.client.goto(url).await {
            return Err(if is_timeout(&err) {
                NavigationError::Timeout(err.to_string())
            } else {
                NavigationError::Failed(err.to_string())
            });
        }

        if let Err(err) = self.apply_stealth().await {
            tracing::debug!(%url, error = %err, "browser.stealth.skipped");
        }

        let raw = self
            .client
            .execute(NAVIGATION_STATUS_SCRIPT, vec![])
            .await
            .map_err(|e| NavigationError::Failed(e.to_string()))?;
        Ok(raw
            .as_u64()
            .and_then(|s| u16::try_from(s).ok())
            .map(NavigationStatus::new))
    }

    async fn apply_stealth(&self) -> Result<()> {
        self.client
            .execute(StealthScripts::core_evasions(), vec![])
            .await?;
        match self.stealth {
            StealthProfile::Lightweight => {}
            StealthProfile::Balanced => {
                self.client
                    .execute(StealthScripts::canvas_evasions(), vec![])
                    .await?;
            }
            StealthProfile::Maximum => {
                self.client
                    .execute(StealthScripts::canvas_evasions(), vec![])
                    .await?;
                self.client
                    .execute(StealthScripts::webgl_evasions(), vec![])
                    .await?;
            }
        }
        Ok(())
    }

    /// Run `script` in the page and return its JSON result.
    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.client
            .execute(script, vec![])
            .await
            .context("script evaluation failed")
    }

    /// Return the full rendered page HTML.
    pub async fn content(&self) -> Result<String> {
        self.client.source().await.context("failed to read page source")
    }

    /// Return the current page URL.
    pub async fn current_url(&self) -> Result<String> {
        Ok(self
            .client
            .current_url()
            .await
            .context("failed to read current URL")?
            .to_string())
    }

    /// Close this tab and return focus to the session's first window.
    pub async fn close(&self) -> Result<()> {
        self.client.close_window().await.context("failed to close tab")?;
        self.client
            .switch_to_window(self.home.clone())
            .await
            .context("failed to switch back to the home window")?;
        Ok(())
    }
}

fn is_timeout(err: &CmdError) -> bool {
    match err {
        CmdError::Standard(wd) => wd.error == ErrorStatus::Timeout,
        CmdError::WaitTimeout => true,
        _ => false,
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        410 => "Gone",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
