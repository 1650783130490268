use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::completion::request::GenerationRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::agent_error::AgentError;
use crate::error::{Error, Result};
use crate::llm::config::{LlmConfig, LlmProvider};

/// Text-completion backend used by the agents.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String>;

    /// Asks the model to analyze a JSON document under `instruction`.
    async fn analyze_json(&self, data: &Value, instruction: &str) -> Result<String> {
        let prompt = format!(
            "{}\n\nData:\n{}",
            instruction,
            serde_json::to_string_pretty(data)?
        );
        self.generate(&prompt, None).await
    }
}

fn combine(prompt: &str, system_prompt: Option<&str>) -> String {
    match system_prompt {
        Some(system) => format!("{}\n\n{}", system, prompt),
        None => prompt.to_string(),
    }
}

const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Ollama through `ollama-rs`, non-streaming.
pub struct OllamaClient {
    ollama: Ollama,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let invalid = || {
            Error::AgentError(AgentError::Config(format!(
                "Invalid OLLAMA_BASE_URL: {}",
                config.ollama_base_url
            )))
        };

        let url = reqwest::Url::parse(&config.ollama_base_url).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?;
        let port = url.port_or_known_default().unwrap_or(DEFAULT_OLLAMA_PORT);

        Ok(Self {
            ollama: Ollama::new(format!("{}://{}", url.scheme(), host), port),
            model: config.ollama_model.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let prompt = combine(prompt, system_prompt);
        debug!("Ollama request for model {} ({} chars)", self.model, prompt.len());

        let request = GenerationRequest::new(self.model.clone(), prompt);
        let response = tokio::time::timeout(self.timeout, self.ollama.generate(request))
            .await
            .map_err(|_| {
                Error::AgentError(AgentError::ModelError(format!(
                    "Ollama did not answer within {} s",
                    self.timeout.as_secs()
                )))
            })?
            .map_err(|e| Error::AgentError(AgentError::ModelError(e.to_string())))?;

        Ok(response.response)
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();
        Some(text)
    }
}

/// Google Gemini `generateContent`. System prompts are folded into the user
/// turn. The API key travels in the `x-goog-api-key` header, never the URL.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl GeminiClient {
    pub const DEFAULT_ENDPOINT: &'static str =
        "https://generativelanguage.googleapis.com/v1beta/models";

    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.google_api_key.clone().ok_or_else(|| {
            Error::AgentError(AgentError::Config(
                "GOOGLE_API_KEY not found in environment".into(),
            ))
        })?;

        Ok(Self {
            http: http_client(config.request_timeout_secs)?,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: config.gemini_model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }
}

/// Drops the request URL from transport errors before they reach logs or
/// responses.
fn without_url(e: reqwest::Error) -> Error {
    Error::Http(e.without_url())
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let prompt = combine(prompt, system_prompt);
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);
        debug!("Gemini request for model {} ({} chars)", self.model, prompt.len());

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GeminiRequest {
                contents: vec![GeminiContent {
                    role: "user",
                    parts: vec![GeminiPart { text: &prompt }],
                }],
                generation_config: GeminiGenerationConfig {
                    temperature: self.temperature,
                },
            })
            .send()
            .await
            .map_err(without_url)?
            .error_for_status()
            .map_err(without_url)?;

        let body: GeminiResponse = response.json().await.map_err(without_url)?;
        body.into_text().ok_or_else(|| {
            Error::AgentError(AgentError::ModelError(
                "Gemini returned no candidates".into(),
            ))
        })
    }
}

/// Instantiates the configured backend.
pub fn build_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    let model: Arc<dyn LanguageModel> = match config.provider {
        LlmProvider::Ollama => Arc::new(OllamaClient::new(config)?),
        LlmProvider::Gemini => Arc::new(GeminiClient::new(config)?),
    };
    Ok(model)
}
