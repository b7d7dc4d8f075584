use async_trait::async_trait;
use gist_common::{GistError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// A hosted (or local) text-generation model.
///
/// Implementations classify their own failures: throttling, server errors and
/// network problems come back retryable, everything else does not.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse>;

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// System prompt used for summarization requests.
    fn default_system_prompt(&self) -> &str {
        "You are a careful research assistant. You summarize web pages accurately, \
         keep only information present in the source text, and never invent facts."
    }
}

/// Map an HTTP status from a provider into the pipeline's error taxonomy.
pub(crate) fn classify_status(provider: &str, status: u16, detail: &str) -> GistError {
    let message = format!("{provider} API error ({status}): {detail}");
    if status == 429 || (500..600).contains(&status) {
        GistError::transient(message)
    } else {
        GistError::permanent(message)
    }
}

pub(crate) fn http_to_gist(provider: &str, err: gist_http::HttpError) -> GistError {
    match err.status() {
        Some(status) => classify_status(provider, status.as_u16(), &err.to_string()),
        None if err.is_retryable() => GistError::transient(format!("{provider}: {err}")),
        None => GistError::permanent(format!("{provider}: {err}")),
    }
}
