use crate::browser::{
    page::GistPage,
    stealth::{build_stealth_arguments, pick_user_agent, StealthProfile},
};
use anyhow::{Context, Result};
use fantoccini::wd::{TimeoutConfiguration, WindowHandle};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::time::Duration;
use webdriver::capabilities::Capabilities;

/// Connection settings for a WebDriver session.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthProfile,
    /// Hard page-load timeout enforced by the browser for every navigation.
    pub navigation_timeout: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            stealth: StealthProfile::Balanced,
            navigation_timeout: Duration::from_millis(60_000),
        }
    }
}

/// Thin wrapper around a `fantoccini` WebDriver client.
pub struct GistDriver {
    client: Client,
    home: WindowHandle,
    stealth: StealthProfile,
}

impl GistDriver {
    /// Connect to a running WebDriver service (Chromedriver on `:9515` by default).
    pub async fn connect(options: &DriverOptions) -> Result<Self> {
        let user_agent = pick_user_agent();
        let mut args = build_stealth_arguments(&options.stealth, user_agent);
        if options.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }

        let mut caps = Capabilities::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&options.webdriver_url)
            .await
            .with_context(|| format!("failed to connect to WebDriver at {}", options.webdriver_url))?;

        client
            .update_timeouts(TimeoutConfiguration::new(
                Some(options.navigation_timeout),
                Some(options.navigation_timeout),
                None,
            ))
            .await
            .context("failed to set page-load timeout")?;

        let home = client.window().await.context("failed to read window handle")?;
        tracing::debug!(
            webdriver = %options.webdriver_url,
            headless = options.headless,
            stealth = ?options.stealth,
            "browser.session.open"
        );

        Ok(Self {
            client,
            home,
            stealth: options.stealth.clone(),
        })
    }

    /// Open a fresh tab and make it the active window.
    pub async fn new_page(&self) -> Result<GistPage> {
        let created = self
            .client
            .new_window(true)
            .await
            .context("failed to open a new tab")?;
        self.client
            .switch_to_window(created.handle)
            .await
            .context("failed to switch to the new tab")?;
        Ok(GistPage::new(
            self.client.clone(),
            self.home.clone(),
            self.stealth.clone(),
        ))
    }

    /// Close the underlying browser session.
    pub async fn close(&self) -> Result<()> {
        self.client
            .clone()
            .close()
            .await
            .context("failed to end the WebDriver session")?;
        tracing::debug!("browser.session.closed");
        Ok(())
    }
}
