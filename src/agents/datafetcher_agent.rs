use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::a2a::{Message, MessageHandler, Response};
use crate::error::agent_error::AgentError;
use crate::error::{Error, Result};
use crate::llm::LanguageModel;
use crate::search::WebSearch;
use crate::store::DocumentStore;

pub const DATAFETCHER: &str = "datafetcher";

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a financial analyst. Report key insights, risk indicators, a financial health score (0-100) and recommendations.";

const COMPREHENSIVE_INSTRUCTION: &str = "Based on all the financial data provided, give a comprehensive loan underwriting assessment: overall financial health, combined risk, approval recommendation and any red flags.";

/// Actions the data fetcher answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFetcherAction {
    FetchAndAnalyze,
    SearchBusiness,
    ListAvailable,
}

impl DataFetcherAction {
    pub const ALL: [DataFetcherAction; 3] = [
        DataFetcherAction::FetchAndAnalyze,
        DataFetcherAction::SearchBusiness,
        DataFetcherAction::ListAvailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataFetcherAction::FetchAndAnalyze => "fetch_and_analyze",
            DataFetcherAction::SearchBusiness => "search_business",
            DataFetcherAction::ListAvailable => "list_available",
        }
    }

    pub fn parse(action: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == action)
    }
}

/// How `fetch_and_analyze` treats the requested documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Per-document analysis plus a combined assessment when several load.
    Comprehensive,
    /// Per-document analysis only.
    Individual,
}

impl AnalysisMode {
    fn from_payload(value: Option<&str>) -> Self {
        match value.unwrap_or("comprehensive") {
            "comprehensive" => AnalysisMode::Comprehensive,
            _ => AnalysisMode::Individual,
        }
    }
}

/// Loads documents, runs them past the language model and searches the web
/// on behalf of other agents.
pub struct DataFetcherAgent {
    store: DocumentStore,
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn WebSearch>,
}

impl DataFetcherAgent {
    pub fn new(
        store: DocumentStore,
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            store,
            model,
            search,
        }
    }

    async fn perform(&self, action: DataFetcherAction, message: &Message) -> Result<Response> {
        match action {
            DataFetcherAction::ListAvailable => {
                let available = self.store.list_available().await?;
                Ok(Response::success(&message.id).with_field("available_data_types", available))
            }
            DataFetcherAction::FetchAndAnalyze => {
                let data_types = message.payload_str_list("data_types");
                let mode = AnalysisMode::from_payload(message.payload_str("analysis_type"));
                if let Some(reason) = message.payload_str("reason") {
                    info!("Fetching {:?} at {}'s request: {}", data_types, message.sender, reason);
                }

                let summary = self.summarize(&data_types, mode).await?;
                Ok(Response::success(&message.id)
                    .with_field("summary", summary)
                    .with_field("data_types_processed", data_types))
            }
            DataFetcherAction::SearchBusiness => {
                let business_name = message.payload_str("business_name").unwrap_or("").trim();
                if business_name.is_empty() {
                    return Ok(Response::error(&message.id, "business_name is required"));
                }
                let search_type = message.payload_str("search_type").unwrap_or("general");

                let report = self.search_business(business_name, search_type).await?;
                Ok(Response::success(&message.id).with_field("search_results", report))
            }
        }
    }

    async fn analyze(&self, data: &Value, data_type: &str) -> Result<String> {
        let instruction = format!(
            "{}\n\nAnalyze this {} data for loan underwriting purposes. Focus on creditworthiness, financial stability, and risk factors.",
            ANALYSIS_SYSTEM_PROMPT,
            data_type.to_uppercase()
        );
        self.model.analyze_json(data, &instruction).await
    }

    /// Fetch failures become inline notes so one missing document does not
    /// sink the whole summary. Model failures propagate.
    async fn summarize(&self, data_types: &[String], mode: AnalysisMode) -> Result<String> {
        let mut sections = Vec::with_capacity(data_types.len() + 1);
        let mut loaded = Map::new();

        for data_type in data_types {
            let label = data_type.to_uppercase();
            match self.store.fetch(data_type).await {
                Ok(data) => {
                    let analysis = self.analyze(&data, data_type).await?;
                    match mode {
                        AnalysisMode::Comprehensive => {
                            sections.push(format!("{} Analysis:\n{}", label, analysis))
                        }
                        AnalysisMode::Individual => sections.push(format!("{}:\n{}", label, analysis)),
                    }
                    loaded.insert(data_type.clone(), data);
                }
                Err(Error::AgentError(
                    e @ (AgentError::DocumentNotFound(_) | AgentError::InvalidDocument { .. }),
                )) => {
                    warn!("Skipping {}: {}", data_type, e);
                    sections.push(format!("{}: {}", label, e));
                }
                Err(e) => return Err(e),
            }
        }

        if mode == AnalysisMode::Comprehensive && loaded.len() > 1 {
            let combined = self
                .model
                .analyze_json(&Value::Object(loaded), COMPREHENSIVE_INSTRUCTION)
                .await?;
            sections.push(format!("COMPREHENSIVE ASSESSMENT:\n{}", combined));
        }

        Ok(sections.join("\n\n"))
    }

    async fn search_business(&self, business_name: &str, search_type: &str) -> Result<Value> {
        let mut report = self.search.search(business_name, search_type).await?;

        let summary = if report.results.is_empty() {
            format!(
                "No substantial search results found for {}. This could indicate a very new business, a small local business, or the need for more specific search terms.",
                business_name
            )
        } else {
            let instruction = format!(
                "Analyze these search results for {} and provide a credibility assessment, what was found versus missing, any red flags, and whether more research is needed before underwriting. Focus on {} aspects.",
                business_name, search_type
            );
            self.model
                .analyze_json(&serde_json::to_value(&report)?, &instruction)
                .await?
        };
        report.ai_summary = Some(summary);

        Ok(serde_json::to_value(report)?)
    }
}

#[async_trait]
impl MessageHandler for DataFetcherAgent {
    async fn handle(&self, message: Arc<Message>) -> Result<Response> {
        debug!(
            "DataFetcher received {} from {}",
            message.action, message.sender
        );

        let Some(action) = DataFetcherAction::parse(&message.action) else {
            return Ok(Response::unknown_action(&message.id, &message.action).with_timestamp());
        };

        match self.perform(action, &message).await {
            Ok(response) => Ok(response.with_timestamp()),
            Err(e) => {
                warn!("DataFetcher failed on {}: {}", action.as_str(), e);
                Ok(Response::error(&message.id, e.to_string()).with_timestamp())
            }
        }
    }
}

/// Capability summary for diagnostics.
pub fn supported_actions() -> Value {
    json!(DataFetcherAction::ALL.map(|a| a.as_str()))
}
