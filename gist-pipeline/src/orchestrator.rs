use crate::backoff::{BackoffExecutor, RetryPolicy};
use crate::browser::{
    classify_navigation, BrowserLauncher, BrowserPage, BrowserSession, METADATA_SCRIPT,
};
use crate::extract::{extract, extract_links, extract_metadata};
use crate::scheduler::RequestScheduler;
use crate::summarize::{options_policy, Summarizer};
use gist_common::{
    BatchOutcome, BatchReport, GistError, PageMetadata, PageRecord, Result, SummaryOptions,
};
use gist_llm::traits::LlmClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

/// Timing knobs that are not part of the per-run options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub navigation_timeout: Duration,
    /// Pause after each URL in sequential runs.
    pub url_pacing: Duration,
    /// Single-URL mode: independent navigation retries.
    pub navigation_retries: u32,
    pub navigation_delay: Duration,
    /// Single-URL mode: independent extraction retries.
    pub extraction_retries: u32,
    pub extraction_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(60_000),
            url_pacing: Duration::from_millis(1000),
            navigation_retries: 2,
            navigation_delay: Duration::from_millis(1000),
            extraction_retries: 2,
            extraction_delay: Duration::from_millis(500),
        }
    }
}

/// Drives pages through navigate -> extract -> summarize.
pub struct PipelineOrchestrator {
    launcher: Arc<dyn BrowserLauncher>,
    summarizer: Summarizer,
    backoff: BackoffExecutor,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        llm: Arc<dyn LlmClient + Send + Sync>,
        scheduler: RequestScheduler,
        settings: PipelineSettings,
    ) -> Self {
        Self::with_summarizer(launcher, Summarizer::new(llm, scheduler), settings)
    }

    pub fn with_summarizer(
        launcher: Arc<dyn BrowserLauncher>,
        summarizer: Summarizer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            launcher,
            summarizer,
            backoff: BackoffExecutor::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Single-URL run. Navigation and extraction retry independently.
    ///
    /// `InvalidInput` and `ExhaustedRetries` propagate. With `follow_links`,
    /// each discovered link adds one outcome after the primary one.
    pub async fn summarize_url(&self, url: &str, opts: &SummaryOptions) -> Result<BatchReport> {
        opts.validate()?;
        let target = validate_url(url)?;

        let session = BrowserSession::open(self.launcher.as_ref()).await?;
        let result = self.run_single(session.page(), url, &target, opts).await;
        session.close().await;

        let mut report = result?;
        self.attach_comparative(&mut report, opts).await;
        Ok(report)
    }

    /// Batch run over `urls`, strictly in order. Only browser start-up is fatal.
    ///
    /// Link-following belongs to single-URL runs; options asking for it are
    /// rejected with `InvalidInput`.
    pub async fn summarize_batch(&self, urls: &[String], opts: &SummaryOptions) -> Result<BatchReport> {
        opts.validate()?;
        if opts.follow_links.is_some() {
            return Err(GistError::invalid_input(
                "follow_links applies to single-URL runs only",
            ));
        }

        let session = BrowserSession::open(self.launcher.as_ref()).await?;
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            outcomes.push(self.process_url(session.page(), url, opts).await);
            sleep(self.settings.url_pacing).await;
        }
        session.close().await;

        let mut report = BatchReport {
            outcomes,
            ..Default::default()
        };
        tracing::info!(
            total = report.outcomes.len(),
            succeeded = report.successes(),
            failed = report.failures(),
            "pipeline.batch.done"
        );
        self.attach_comparative(&mut report, opts).await;
        Ok(report)
    }

    async fn run_single(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        target: &Url,
        opts: &SummaryOptions,
    ) -> Result<BatchReport> {
        tracing::info!(%url, "pipeline.url.start");
        let nav_policy = RetryPolicy::new(
            "navigate",
            self.settings.navigation_retries,
            self.settings.navigation_delay,
        );
        let extract_policy = RetryPolicy::new(
            "extract",
            self.settings.extraction_retries,
            self.settings.extraction_delay,
        );

        let (navigated, nav_retries) = self
            .backoff
            .run_counted(|| self.navigate(page, target), &nav_policy)
            .await;
        navigated?;
        let (captured, extract_retries) = self
            .backoff
            .run_counted(|| self.capture(page, url, target), &extract_policy)
            .await;
        let record = captured?;
        let (summary, summarize_retries) = self.summarizer.summarize_counted(&record, opts).await?;
        let retries = nav_retries + extract_retries + summarize_retries;
        tracing::info!(%url, retries, "pipeline.url.done");

        let links = record.links().to_vec();
        let (_, metadata, _) = record.into_parts();
        let mut outcomes = vec![BatchOutcome::success(summary, metadata, retries)];

        if let Some(n) = opts.follow_links {
            let follow: Vec<_> = links.into_iter().take(usize::from(n)).collect();
            tracing::info!(%url, links = follow.len(), "pipeline.follow_links");
            for link in &follow {
                sleep(self.settings.url_pacing).await;
                outcomes.push(self.process_url(page, link, opts).await);
            }
        }

        Ok(BatchReport {
            outcomes,
            ..Default::default()
        })
    }

    /// One URL as a single retried unit. Never fails; errors land in the outcome.
    async fn process_url(&self, page: &dyn BrowserPage, url: &str, opts: &SummaryOptions) -> BatchOutcome {
        let target = match validate_url(url) {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!(%url, error = %err, "pipeline.url.invalid");
                return BatchOutcome::failure(url, &err, 0);
            }
        };

        tracing::info!(%url, "pipeline.url.start");
        let policy = options_policy(url, opts);
        let (result, retries) = self
            .backoff
            .run_counted(|| self.attempt(page, url, &target, opts), &policy)
            .await;
        match result {
            Ok((summary, metadata)) => {
                tracing::info!(%url, retries, "pipeline.url.done");
                BatchOutcome::success(summary, metadata, retries)
            }
            Err(err) => {
                tracing::warn!(%url, retries, error = %err, "pipeline.url.failed");
                BatchOutcome::failure(url, &err, retries)
            }
        }
    }

    async fn attempt(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        target: &Url,
        opts: &SummaryOptions,
    ) -> Result<(String, PageMetadata)> {
        self.navigate(page, target).await?;
        let record = self.capture(page, url, target).await?;
        let summary = self.summarizer.summarize_once(&record, opts).await?;
        let (_, metadata, _) = record.into_parts();
        Ok((summary, metadata))
    }

    async fn navigate(&self, page: &dyn BrowserPage, target: &Url) -> Result<()> {
        let outcome = page
            .navigate(target.as_str(), self.settings.navigation_timeout)
            .await;
        classify_navigation(target.as_str(), outcome)
    }

    /// Read the loaded page and turn it into a record.
    async fn capture(&self, page: &dyn BrowserPage, url: &str, target: &Url) -> Result<PageRecord> {
        let (html, rendered, current) = futures::try_join!(
            page.content(),
            page.evaluate(METADATA_SCRIPT),
            page.current_url()
        )?;

        let text = extract(&html)?;
        let mut metadata = extract_metadata(&html, url);
        if let Some(title) = non_empty_str(&rendered, "title") {
            metadata.title = title;
        }
        if let Some(description) = non_empty_str(&rendered, "description") {
            metadata.description = description;
        }

        let base = Url::parse(&current).unwrap_or_else(|_| target.clone());
        let links = extract_links(&html, &base);
        tracing::debug!(%url, chars = text.len(), links = links.len(), "pipeline.extracted");
        Ok(PageRecord::new(text, metadata, links))
    }

    async fn attach_comparative(&self, report: &mut BatchReport, opts: &SummaryOptions) {
        if !opts.comparative {
            return;
        }
        if report.successes() < 2 {
            tracing::info!(
                succeeded = report.successes(),
                "pipeline.comparative.skipped"
            );
            return;
        }
        match self.summarizer.compare(&report.outcomes, opts).await {
            Ok(text) => report.comparative = Some(text),
            Err(err) => {
                tracing::warn!(error = %err, "pipeline.comparative.failed");
                report.comparative_error = Some(err.to_string());
            }
        }
    }
}

/// Accept only absolute http(s) URLs.
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| GistError::invalid_input(format!("invalid URL {url:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        scheme => Err(GistError::invalid_input(format!(
            "invalid URL {url:?}: unsupported scheme {scheme:?}, expected http or https"
        ))),
    }
}

fn non_empty_str(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gist_common::ErrorKind;

    #[test]
    fn validate_url_accepts_only_http_schemes() {
        assert!(validate_url("https://example.com/a").is_ok());
        assert!(validate_url(" http://example.com ").is_ok());
        for bad in ["not a url", "ftp://example.com/file", "file:///etc/hosts", "mailto:a@b.c"] {
            let err = validate_url(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{bad}");
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn rendered_metadata_needs_non_empty_strings() {
        let v = serde_json::json!({ "title": "  Rendered ", "description": "" });
        assert_eq!(non_empty_str(&v, "title").as_deref(), Some("Rendered"));
        assert_eq!(non_empty_str(&v, "description"), None);
        assert_eq!(non_empty_str(&serde_json::Value::Null, "title"), None);
    }
}
