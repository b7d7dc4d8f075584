//! Provider-agnostic language-model integration for gist.
//!
//! This crate exposes a common [`traits::LlmClient`] interface and concrete
//! provider implementations for Ollama, OpenAI, and Gemini. Provider errors
//! are classified into the shared retryable/permanent taxonomy so the
//! pipeline's backoff can act on them.
//!
//! # Examples
//! ```no_run
//! use gist_common::Result;
//! use gist_llm::{config::LlmConfig, ensure_llm_ready};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let client = ensure_llm_ready(&LlmConfig::default()).await?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
pub mod config;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
pub mod traits;

use config::LlmConfig;
use gist_common::{GistError, Result};
use std::sync::Arc;
use traits::LlmClient;

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Build the configured client, verifying local servers where that is cheap.
pub async fn ensure_llm_ready(config: &LlmConfig) -> Result<Arc<dyn LlmClient + Send + Sync>> {
    match config {
        #[cfg(feature = "ollama")]
        LlmConfig::Ollama {
            endpoint, model, ..
        } => {
            let client = ollama::OllamaClient::new(endpoint.clone(), model.clone()).await?;
            Ok(Arc::new(client))
        }
        #[cfg(feature = "openai")]
        LlmConfig::Openai {
            auth_token,
            model,
            endpoint,
            ..
        } => {
            let client = openai::OpenAiClient::with_endpoint(
                auth_token.clone(),
                model.clone(),
                endpoint,
            )?;
            Ok(Arc::new(client))
        }
        #[cfg(feature = "gemini")]
        LlmConfig::Gemini {
            auth_token,
            model,
            endpoint,
            ..
        } => {
            let client = gemini::GeminiClient::with_endpoint(
                auth_token.clone(),
                model.clone(),
                endpoint,
            )?;
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(GistError::config("No LLM configured")),
    }
}
