use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::a2a::{Message, MessageExchange, MessageHandler, Payload, Response, into_payload};
use crate::agents::datafetcher_agent::{DATAFETCHER, DataFetcherAction};
use crate::error::agent_error::AgentError;
use crate::error::{Error, Result};
use crate::llm::LanguageModel;

pub const UNDERWRITER: &str = "underwriter";

const QUESTION_SYSTEM_PROMPT: &str =
    "You are an expert loan underwriter. Answer the question based on the provided context.";

/// Receiving side of the underwriter. It mostly sends, so every inbound
/// message is simply acknowledged.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnderwriterAgent;

#[async_trait]
impl MessageHandler for UnderwriterAgent {
    async fn handle(&self, message: Arc<Message>) -> Result<Response> {
        debug!(
            "Underwriter received {} from {}",
            message.action, message.sender
        );
        Ok(Response::acknowledged(&message.id).with_timestamp())
    }
}

/// Documents gathered for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialFindings {
    pub requested: Vec<String>,
    pub fetched: Vec<String>,
    pub missing: Vec<String>,
    /// Data fetcher summary, absent when nothing requested was available.
    pub summary: Option<String>,
}

/// Underwriting workflow driven over the exchange.
pub struct Underwriter {
    exchange: Arc<MessageExchange>,
    model: Arc<dyn LanguageModel>,
}

impl Underwriter {
    pub fn new(exchange: Arc<MessageExchange>, model: Arc<dyn LanguageModel>) -> Self {
        Self { exchange, model }
    }

    async fn request(&self, action: DataFetcherAction, payload: Payload) -> Result<Response> {
        let response = self
            .exchange
            .send(UNDERWRITER, DATAFETCHER, action.as_str(), payload, None)
            .await?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(Error::AgentError(AgentError::RemoteAgent {
                agent: DATAFETCHER.to_string(),
                error: response.error_text().to_string(),
            }))
        }
    }

    pub async fn available_documents(&self) -> Result<Vec<String>> {
        let response = self
            .request(DataFetcherAction::ListAvailable, Payload::new())
            .await?;

        Ok(response
            .get("available_data_types")
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Asks which documents exist, then requests a comprehensive analysis of
    /// the required ones that do.
    pub async fn gather_financials(&self, required: &[String]) -> Result<FinancialFindings> {
        let available = self.available_documents().await?;
        let (fetched, missing): (Vec<String>, Vec<String>) = required
            .iter()
            .cloned()
            .partition(|doc| available.contains(doc));

        info!("Fetching required documents: {}", fetched.join(", "));

        let summary = if fetched.is_empty() {
            None
        } else {
            let response = self
                .request(
                    DataFetcherAction::FetchAndAnalyze,
                    into_payload(json!({
                        "data_types": fetched,
                        "analysis_type": "comprehensive",
                    })),
                )
                .await?;
            response.get_str("summary").map(str::to_string)
        };

        Ok(FinancialFindings {
            requested: required.to_vec(),
            fetched,
            missing,
            summary,
        })
    }

    pub async fn request_additional_documents(
        &self,
        document_types: &[String],
        reason: &str,
    ) -> Result<String> {
        let response = self
            .request(
                DataFetcherAction::FetchAndAnalyze,
                into_payload(json!({
                    "data_types": document_types,
                    "analysis_type": "detailed",
                    "reason": reason,
                })),
            )
            .await?;

        Ok(response.get_str("summary").unwrap_or_default().to_string())
    }

    /// Searches on the business name when given, else the applicant name.
    pub async fn search_applicant(
        &self,
        applicant_name: &str,
        business_name: Option<&str>,
    ) -> Result<String> {
        let term = business_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(applicant_name);

        let response = self
            .request(
                DataFetcherAction::SearchBusiness,
                into_payload(json!({
                    "business_name": term,
                    "search_type": "financial",
                })),
            )
            .await?;

        Ok(response
            .get("search_results")
            .and_then(|results| results.get("ai_summary"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Free-form question to the model, answered against whatever has been
    /// gathered so far. Goes straight to the model, not over the exchange.
    pub async fn ask(&self, question: &str, context: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::AgentError(AgentError::ModelError(
                "question is empty".into(),
            )));
        }

        let context = match context.trim() {
            "" => "Nothing gathered yet.",
            context => context,
        };
        let prompt = format!("Context:\n{}\n\nQuestion: {}", context, question);
        debug!("Underwriter question ({} chars of context)", context.len());

        self.model.generate(&prompt, Some(QUESTION_SYSTEM_PROMPT)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::ResponseStatus;
    use std::sync::Mutex;

    /// Echoes back what it was given.
    #[derive(Default)]
    struct EchoModel {
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), system.map(str::to_string)));
            Ok(format!("answer to: {}", prompt.lines().last().unwrap_or_default()))
        }
    }

    fn underwriter(exchange: Arc<MessageExchange>) -> Underwriter {
        Underwriter::new(exchange, Arc::new(EchoModel::default()))
    }

    #[tokio::test]
    async fn test_underwriter_acknowledges() {
        let msg = Arc::new(Message::new("datafetcher", UNDERWRITER, "status_update", Payload::new()));

        let response = UnderwriterAgent.handle(msg.clone()).await.unwrap();
        assert_eq!(response.status, ResponseStatus::Acknowledged);
        assert_eq!(response.message_id.as_deref(), Some(msg.id.as_str()));
    }

    #[tokio::test]
    async fn test_workflow_requires_datafetcher() {
        let exchange = Arc::new(MessageExchange::default());
        let underwriter = underwriter(exchange.clone());

        let err = underwriter.available_documents().await.unwrap_err();
        assert!(err.is_unknown_receiver());
        assert_eq!(exchange.history_len().await, 0);
    }

    #[tokio::test]
    async fn test_remote_error_surfaces() {
        let exchange = Arc::new(MessageExchange::default());
        exchange
            .register(DATAFETCHER, |message: Arc<Message>| async move {
                Ok::<_, Error>(Response::error(&message.id, "storage offline"))
            })
            .await;

        let err = underwriter(exchange)
            .available_documents()
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "agent error: datafetcher reported an error: storage offline"
        );
    }

    #[tokio::test]
    async fn test_ask_uses_context_without_the_exchange() {
        let exchange = Arc::new(MessageExchange::default());
        let model = Arc::new(EchoModel::default());
        let underwriter = Underwriter::new(exchange.clone(), model.clone());

        let answer = underwriter
            .ask("  Is turnover stable?  ", "GST Analysis:\nturnover flat")
            .await
            .unwrap();
        assert_eq!(answer, "answer to: Question: Is turnover stable?");

        let answer = underwriter.ask("Any red flags?", "").await.unwrap();
        assert_eq!(answer, "answer to: Question: Any red flags?");

        assert_eq!(exchange.history_len().await, 0);

        let seen = model.seen.lock().unwrap();
        assert!(seen[0].0.contains("turnover flat"));
        assert!(seen[1].0.contains("Nothing gathered yet."));
        assert_eq!(seen[0].1.as_deref(), Some(QUESTION_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_ask_rejects_blank_question() {
        let model = Arc::new(EchoModel::default());
        let underwriter = Underwriter::new(Arc::new(MessageExchange::default()), model.clone());

        assert!(underwriter.ask("   ", "context").await.is_err());
        assert!(model.seen.lock().unwrap().is_empty());
    }
}
