use crate::traits::{classify_status, LlmClient, LlmResponse};
use async_trait::async_trait;
use gist_common::{GistError, Result};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local model inference.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Create a new client, verify the server is up and pull the model if missing.
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let client = Self::unchecked(base_url, model)?;
        client.probe_server().await?;
        client.ensure_model_available().await?;
        Ok(client)
    }

    /// Create a client without touching the network.
    pub fn unchecked(base_url: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| GistError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    async fn probe_server(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            _ => Err(GistError::config(OLLAMA_CONNECTION_ERROR)),
        }
    }

    async fn ensure_model_available(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;

        if !models.iter().any(|m| m == &self.model) {
            tracing::info!(model = %self.model, "ollama.model.pull");
            self.pull_model().await?;
        }

        Ok(())
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GistError::transient(format!("Failed to fetch models: {e}")))?;

        if !resp.status().is_success() {
            return Ok(Vec::new());
        }

        let val: JsonValue = resp
            .json()
            .await
            .map_err(|e| GistError::permanent(format!("Failed to parse models response: {e}")))?;

        Ok(val
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn pull_model(&self) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "stream": false }))
            .send()
            .await
            .map_err(|e| GistError::transient(format!("Failed to pull model: {e}")))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(GistError::config(format!(
                "Failed to pull model {}: HTTP {}",
                self.model,
                resp.status()
            )))
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let url = format!("{}/api/generate", self.base_url);

        let mut options = serde_json::Map::new();
        if let Some(temp) = temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        let mut payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": options,
        });
        if let Some(system) = system_prompt {
            payload["system"] = json!(system);
        }

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GistError::transient(format!("ollama request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(classify_status("ollama", status.as_u16(), &detail));
        }

        let val: JsonValue = resp
            .json()
            .await
            .map_err(|e| GistError::permanent(format!("Failed to parse ollama response: {e}")))?;

        Ok(LlmResponse {
            text: val
                .get("response")
                .and_then(|r| r.as_str())
                .unwrap_or_default()
                .to_string(),
            model: Some(self.model.clone()),
            tokens_used: val
                .get("eval_count")
                .and_then(|c| c.as_u64())
                .map(|c| c as u32),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.probe_server().await.is_ok())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
