use crate::backoff::{BackoffExecutor, RetryPolicy};
use crate::scheduler::RequestScheduler;
use gist_common::{BatchOutcome, GistError, PageRecord, Result, SummaryOptions};
use gist_llm::traits::LlmClient;
use std::sync::Arc;
use std::time::Duration;

/// Page text beyond this many characters is cut before prompting.
pub const MAX_PROMPT_TEXT_CHARS: usize = 24_000;

const COMPARATIVE_MAX_TOKENS: u32 = 1200;

/// Turns extracted pages into summaries through the shared scheduler.
#[derive(Clone)]
pub struct Summarizer {
    llm: Arc<dyn LlmClient + Send + Sync>,
    scheduler: RequestScheduler,
    backoff: BackoffExecutor,
    temperature: Option<f32>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmClient + Send + Sync>, scheduler: RequestScheduler) -> Self {
        Self {
            llm,
            scheduler,
            backoff: BackoffExecutor::new(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    /// Summarize with retries under the options' policy, inside one scheduler slot.
    pub async fn summarize(&self, record: &PageRecord, opts: &SummaryOptions) -> Result<String> {
        self.summarize_counted(record, opts).await.map(|(summary, _)| summary)
    }

    /// Like [`Summarizer::summarize`], also returning how many model retries happened.
    pub async fn summarize_counted(
        &self,
        record: &PageRecord,
        opts: &SummaryOptions,
    ) -> Result<(String, u32)> {
        let prompt = build_prompt(record, opts);
        let policy = options_policy("summarize", opts);
        let max_tokens = opts.length.max_tokens();
        self.scheduler
            .execute(|| async {
                let (result, retries) = self
                    .backoff
                    .run_counted(|| self.generate(&prompt, max_tokens), &policy)
                    .await;
                result.map(|summary| (summary, retries))
            })
            .await
    }

    /// One model call, no retries. Used when the caller already retries the enclosing unit.
    pub async fn summarize_once(&self, record: &PageRecord, opts: &SummaryOptions) -> Result<String> {
        let prompt = build_prompt(record, opts);
        let max_tokens = opts.length.max_tokens();
        self.scheduler
            .execute(|| self.generate(&prompt, max_tokens))
            .await
    }

    /// Cross-document synthesis over successful outcomes.
    pub async fn compare(&self, outcomes: &[BatchOutcome], opts: &SummaryOptions) -> Result<String> {
        let prompt = build_comparative_prompt(outcomes);
        let policy = options_policy("comparative synthesis", opts);
        self.scheduler
            .execute(|| {
                self.backoff
                    .run(|| self.generate(&prompt, COMPARATIVE_MAX_TOKENS), &policy)
            })
            .await
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let response = self
            .llm
            .generate(
                prompt,
                Some(self.llm.default_system_prompt()),
                Some(max_tokens),
                self.temperature,
            )
            .await?;
        let text = response.text.trim();
        if text.is_empty() {
            return Err(GistError::empty_summary());
        }
        tracing::debug!(
            model = self.llm.model_name(),
            chars = text.len(),
            tokens = ?response.tokens_used,
            "summarize.generated"
        );
        Ok(text.to_string())
    }
}

pub(crate) fn options_policy(label: &str, opts: &SummaryOptions) -> RetryPolicy {
    RetryPolicy::new(
        label,
        opts.max_retries,
        Duration::from_millis(opts.retry_delay_ms),
    )
}

/// Prompt for a single page.
pub fn build_prompt(record: &PageRecord, opts: &SummaryOptions) -> String {
    let meta = record.metadata();
    let mut prompt = format!(
        "Summarize the following web page {}.\n{}\n",
        opts.length.instruction(),
        opts.format.instruction()
    );
    if opts.include_metadata {
        prompt.push_str("Begin with a short header naming the page title and URL.\n");
    }
    prompt.push_str(&format!("\nURL: {}\n", meta.url));
    if !meta.title.is_empty() {
        prompt.push_str(&format!("Title: {}\n", meta.title));
    }
    if !meta.description.is_empty() {
        prompt.push_str(&format!("Description: {}\n", meta.description));
    }
    prompt.push_str("\nContent:\n\"\"\"\n");
    prompt.push_str(truncate_chars(record.text(), MAX_PROMPT_TEXT_CHARS));
    prompt.push_str("\n\"\"\"\n");
    prompt
}

/// Prompt comparing the summaries of several sources.
pub fn build_comparative_prompt(outcomes: &[BatchOutcome]) -> String {
    let mut prompt = String::from(
        "Compare the following summaries of different web pages. Identify the common themes, \
         the points where the sources agree or disagree, and anything unique to a single \
         source. Refer to sources by their number.\n",
    );
    for (i, outcome) in outcomes.iter().filter(|o| o.is_success()).enumerate() {
        prompt.push_str(&format!(
            "\nSource {} ({}):\n{}\n",
            i + 1,
            outcome.url,
            outcome.summary
        ));
    }
    prompt
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerConfig;
    use async_trait::async_trait;
    use gist_common::{ErrorKind, PageMetadata, SummaryFormat, SummaryLength};
    use gist_llm::traits::LlmResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<(String, Option<u32>)>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for Scripted {
        async fn generate(
            &self,
            prompt: &str,
            _system_prompt: Option<&str>,
            max_tokens: Option<u32>,
            _temperature: Option<f32>,
        ) -> Result<LlmResponse> {
            self.prompts.lock().unwrap().push((prompt.to_string(), max_tokens));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("fallback summary".into()));
            reply.map(|text| LlmResponse {
                text,
                ..Default::default()
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn record() -> PageRecord {
        PageRecord::new(
            "Body text of the page.".into(),
            PageMetadata {
                title: "A Title".into(),
                description: String::new(),
                url: "https://example.com/a".into(),
                timestamp: chrono::Utc::now(),
            },
            vec![],
        )
    }

    fn summarizer(llm: Arc<Scripted>) -> Summarizer {
        Summarizer::new(
            llm,
            RequestScheduler::new(SchedulerConfig {
                max_concurrent: 2,
                min_delay: Duration::ZERO,
            }),
        )
    }

    #[test]
    fn prompt_reflects_length_and_format() {
        let opts = SummaryOptions {
            length: SummaryLength::Short,
            format: SummaryFormat::Bullets,
            ..Default::default()
        };
        let prompt = build_prompt(&record(), &opts);
        assert!(prompt.contains("in 2-3 sentences"));
        assert!(prompt.contains("bulleted list"));
        assert!(prompt.contains("Title: A Title"));
        assert!(!prompt.contains("Description:"));
        assert!(prompt.contains("Body text of the page."));
    }

    #[test]
    fn comparative_prompt_numbers_successes_only() {
        let meta = PageMetadata::bare("https://a.test/");
        let ok_a = BatchOutcome::success("first".into(), meta.clone(), 0);
        let failed = BatchOutcome::failure("https://bad.test/", &GistError::permanent("404"), 0);
        let ok_b = BatchOutcome::success("second".into(), PageMetadata::bare("https://b.test/"), 0);
        let prompt = build_comparative_prompt(&[ok_a, failed, ok_b]);
        assert!(prompt.contains("Source 1 (https://a.test/):\nfirst"));
        assert!(prompt.contains("Source 2 (https://b.test/):\nsecond"));
        assert!(!prompt.contains("bad.test"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn whitespace_reply_is_retried_as_empty_summary() {
        let llm = Scripted::new(vec![Ok("   \n".into()), Ok(" Real summary. ".into())]);
        let opts = SummaryOptions {
            length: SummaryLength::Long,
            ..Default::default()
        };
        let summary = summarizer(llm.clone())
            .summarize(&record(), &opts)
            .await
            .unwrap();
        assert_eq!(summary, "Real summary.");
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0].1, Some(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn counted_summary_reports_model_retries() {
        let llm = Scripted::new(vec![
            Err(GistError::transient("openai API error (503)")),
            Ok("\n".into()),
            Ok("Third time lucky.".into()),
        ]);
        let (summary, retries) = summarizer(llm)
            .summarize_counted(&record(), &SummaryOptions::default())
            .await
            .unwrap();
        assert_eq!(summary, "Third time lucky.");
        assert_eq!(retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_surfaces_empty_summary() {
        let llm = Scripted::new(vec![Ok(String::new())]);
        let err = summarizer(llm)
            .summarize_once(&record(), &SummaryOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptySummary);
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_model_error_is_not_retried() {
        let llm = Scripted::new(vec![Err(GistError::permanent("openai API error (401)"))]);
        let err = summarizer(llm.clone())
            .summarize(&record(), &SummaryOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert_eq!(llm.prompts.lock().unwrap().len(), 1);
    }
}
