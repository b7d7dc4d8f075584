#![allow(dead_code)]

use async_trait::async_trait;
use gist_common::{GistError, Result};
use gist_drivers::{NavigationError, NavigationStatus};
use gist_llm::traits::{LlmClient, LlmResponse};
use gist_pipeline::{
    Browser, BrowserLauncher, BrowserPage, PipelineOrchestrator, PipelineSettings,
    RequestScheduler, SchedulerConfig,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

pub type NavResult = std::result::Result<Option<NavigationStatus>, NavigationError>;

pub fn status(code: u16) -> NavResult {
    Ok(Some(NavigationStatus::new(code)))
}

/// An article page with enough readable text to pass extraction.
pub fn article(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{href}\">link</a>"))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body>\
         <nav>Home About Contact</nav>\
         <article><h1>{title}</h1>\
         <p>{title} opens with a paragraph that is long enough to be real content.</p>\
         <p>It continues with a second paragraph describing the subject in more depth.</p>\
         {anchors}</article></body></html>"
    )
}

#[derive(Default)]
pub struct WebState {
    pub pages: HashMap<String, String>,
    pub scripted: HashMap<String, VecDeque<NavResult>>,
    pub navigations: Vec<String>,
    pub current: Option<String>,
    pub launches: usize,
    pub browser_closes: usize,
    pub page_closes: usize,
}

/// In-memory web: known pages answer 200, unknown ones 404.
#[derive(Clone, Default)]
pub struct FakeWeb {
    pub state: Arc<Mutex<WebState>>,
}

impl FakeWeb {
    pub fn page(self, url: &str, html: String) -> Self {
        self.state.lock().unwrap().pages.insert(url.to_string(), html);
        self
    }

    /// Navigation results returned for `url` before falling back to the page table.
    pub fn script(self, url: &str, results: Vec<NavResult>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripted
            .insert(url.to_string(), results.into());
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn launches(&self) -> usize {
        self.state.lock().unwrap().launches
    }

    pub fn browser_closes(&self) -> usize {
        self.state.lock().unwrap().browser_closes
    }

    pub fn page_closes(&self) -> usize {
        self.state.lock().unwrap().page_closes
    }
}

#[async_trait]
impl BrowserLauncher for FakeWeb {
    async fn launch(&self) -> Result<Box<dyn Browser>> {
        self.state.lock().unwrap().launches += 1;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl Browser for FakeWeb {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        Ok(Box::new(self.clone()))
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().browser_closes += 1;
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for FakeWeb {
    async fn navigate(&self, url: &str, _timeout: Duration) -> NavResult {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        if let Some(next) = state.scripted.get_mut(url).and_then(|q| q.pop_front()) {
            if next.is_ok() {
                state.current = Some(url.to_string());
            }
            return next;
        }
        state.current = Some(url.to_string());
        if state.pages.contains_key(url) {
            status(200)
        } else {
            status(404)
        }
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "title": "", "description": "" }))
    }

    async fn content(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        state
            .current
            .as_ref()
            .and_then(|url| state.pages.get(url))
            .cloned()
            .ok_or_else(|| GistError::transient("no document loaded"))
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state.current.clone().unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().page_closes += 1;
        Ok(())
    }
}

/// Answers from a script, then with a summary naming the page's URL line.
#[derive(Default)]
pub struct FakeLlm {
    pub replies: Mutex<VecDeque<Result<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(replies: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let scripted = self.replies.lock().unwrap().pop_front();
        let text = match scripted {
            Some(reply) => reply?,
            None => {
                let url = prompt
                    .lines()
                    .find_map(|l| l.strip_prefix("URL: "))
                    .unwrap_or("comparison");
                format!("Summary of {url}")
            }
        };
        Ok(LlmResponse {
            text,
            model: Some("fake".into()),
            tokens_used: None,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

pub fn orchestrator(web: &FakeWeb, llm: &Arc<FakeLlm>) -> PipelineOrchestrator {
    init_test_tracing();
    PipelineOrchestrator::new(
        Arc::new(web.clone()),
        llm.clone(),
        RequestScheduler::new(SchedulerConfig::default()),
        PipelineSettings::default(),
    )
}
