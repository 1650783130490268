use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::a2a::{ExchangeConfig, MessageExchange};
use crate::agents::{DATAFETCHER, DataFetcherAgent, UNDERWRITER, Underwriter, UnderwriterAgent};
use crate::error::agent_error::AgentError;
use crate::error::{Error, Result};
use crate::llm::{LanguageModel, LlmConfig, build_model};
use crate::search::{DuckDuckGoSearch, WebSearch};
use crate::store::DocumentStore;
use crate::store::document_store::EXPECTED_DOCUMENTS;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub exchange: ExchangeConfig,
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            exchange: ExchangeConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            llm: LlmConfig::from_lookup(&lookup)?,
            ..Self::default()
        };

        if let Some(dir) = lookup("LOAN_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("A2A_HANDLER_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::AgentError(AgentError::Config(format!(
                    "A2A_HANDLER_TIMEOUT_SECS must be a whole number of seconds, got {}",
                    secs
                )))
            })?;
            config.exchange.handler_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

/// Runtime information
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self {
            start_time: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Everything one running system shares: config, the exchange with both
/// agents registered, and the document store. Passed around explicitly.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub runtime_info: Arc<RuntimeInfo>,
    pub exchange: Arc<MessageExchange>,
    pub store: DocumentStore,
    pub model: Arc<dyn LanguageModel>,
}

impl AppContext {
    /// Builds the exchange and registers the data fetcher and underwriter.
    pub async fn bootstrap(
        config: AppConfig,
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn WebSearch>,
    ) -> Self {
        let store = DocumentStore::new(config.data_dir.clone());
        let exchange = Arc::new(MessageExchange::new(config.exchange.clone()));

        exchange
            .register(DATAFETCHER, DataFetcherAgent::new(store.clone(), model.clone(), search))
            .await;
        exchange.register(UNDERWRITER, UnderwriterAgent).await;

        info!(
            "Exchange ready with agents {:?}",
            exchange.registry().registered_agents().await
        );

        Self {
            config: Arc::new(config),
            runtime_info: Arc::new(RuntimeInfo::default()),
            exchange,
            store,
            model,
        }
    }

    /// Bootstraps with the configured model backend and DuckDuckGo search.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let model = build_model(&config.llm)?;
        let search: Arc<dyn WebSearch> = Arc::new(DuckDuckGoSearch::new()?);
        Ok(Self::bootstrap(config, model, search).await)
    }

    pub fn underwriter(&self) -> Underwriter {
        Underwriter::new(self.exchange.clone(), self.model.clone())
    }

    /// Warns about expected documents that are not on disk.
    pub async fn check_documents(&self) -> Result<Vec<String>> {
        let missing = self.store.missing(&EXPECTED_DOCUMENTS).await?;
        if !missing.is_empty() {
            warn!(
                "Missing data files in {}: {}",
                self.store.root().display(),
                missing
                    .iter()
                    .map(|doc| format!("{}.json", doc))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(missing)
    }
}
