use serde::{Deserialize, Serialize};

use crate::error::agent_error::AgentError;
use crate::error::{Error, Result};

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma3:12b";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Which model backend answers prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    Ollama,
    Gemini,
}

impl std::str::FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "gemini" => Ok(LlmProvider::Gemini),
            other => Err(Error::AgentError(AgentError::Config(format!(
                "Unknown LLM provider: {}",
                other
            )))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub gemini_model: String,
    #[serde(skip_serializing)]
    pub google_api_key: Option<String>,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

/// Without `LLM_PROVIDER` the provider is Ollama on localhost, so a fresh
/// checkout starts with no API key. Set `LLM_PROVIDER=gemini` together with
/// `GOOGLE_API_KEY` to use Gemini instead.
impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            google_api_key: None,
            temperature: 0.7,
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Reads `LLM_PROVIDER` (default `ollama`, not `gemini`), `OLLAMA_BASE_URL`,
    /// `OLLAMA_MODEL`, `GEMINI_MODEL` and `GOOGLE_API_KEY`. Choosing `gemini`
    /// without a key is a config error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, validating provider settings.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.provider = provider.parse()?;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            config.ollama_base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            config.ollama_model = model;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            config.gemini_model = model;
        }
        config.google_api_key = lookup("GOOGLE_API_KEY").filter(|key| !key.trim().is_empty());

        if config.provider == LlmProvider::Gemini && config.google_api_key.is_none() {
            return Err(Error::AgentError(AgentError::Config(
                "GOOGLE_API_KEY not found in environment".into(),
            )));
        }

        Ok(config)
    }
}
