use serde::Deserialize;

/// Provider selection as it appears under `llm:` in `gist.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    #[cfg(feature = "openai")]
    Openai {
        #[serde(default = "default_openai_model")]
        model: String,
        auth_token: String,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
    },
    #[cfg(feature = "ollama")]
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
    },
    #[cfg(feature = "gemini")]
    Gemini {
        #[serde(default = "default_gemini_model")]
        model: String,
        auth_token: String,
        #[serde(default = "default_gemini_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
    },
    None,
}

impl Default for LlmConfig {
    fn default() -> Self {
        #[cfg(feature = "ollama")]
        {
            Self::Ollama {
                model: default_ollama_model(),
                endpoint: default_ollama_endpoint(),
                temperature: None,
            }
        }
        #[cfg(not(feature = "ollama"))]
        {
            Self::None
        }
    }
}

impl LlmConfig {
    /// Sampling temperature requested for this provider, if any.
    pub fn temperature(&self) -> Option<f32> {
        match self {
            #[cfg(feature = "openai")]
            Self::Openai { temperature, .. } => *temperature,
            #[cfg(feature = "ollama")]
            Self::Ollama { temperature, .. } => *temperature,
            #[cfg(feature = "gemini")]
            Self::Gemini { temperature, .. } => *temperature,
            Self::None => None,
        }
    }
}

fn default_openai_model() -> String {
    crate::DEFAULT_OPENAI_MODEL.into()
}
fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1/".into()
}
fn default_ollama_model() -> String {
    crate::DEFAULT_OLLAMA_MODEL.into()
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_gemini_model() -> String {
    crate::DEFAULT_GEMINI_MODEL.into()
}
fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/".into()
}
