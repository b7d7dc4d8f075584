//! The resilient scrape-and-summarize pipeline.
//!
//! Leaf-first:
//!
//! - [`backoff`]: bounded retries with pure exponential delay, driven by the
//!   `retryable` flag on [`gist_common::GistError`]
//! - [`scheduler`]: FIFO request scheduler bounding in-flight work and
//!   spacing dispatches
//! - [`extract`]: readable-text, metadata and link extraction from rendered HTML
//! - [`browser`]: the browser seam, plus its WebDriver implementation
//! - [`summarize`]: prompt building and model calls through scheduler + backoff
//! - [`orchestrator`]: single-URL and batch runs with per-URL failure isolation
pub mod backoff;
pub mod browser;
pub mod extract;
pub mod orchestrator;
pub mod scheduler;
pub mod summarize;

pub use backoff::{BackoffExecutor, RetryPolicy};
pub use browser::{Browser, BrowserLauncher, BrowserPage, WebDriverLauncher};
pub use orchestrator::{PipelineOrchestrator, PipelineSettings};
pub use scheduler::{RequestScheduler, SchedulerConfig};
pub use summarize::Summarizer;
