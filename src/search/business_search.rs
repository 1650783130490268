use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::agent_error::AgentError;
use crate::error::{Error, Result};

const MAX_RELATED_TOPICS: usize = 5;
const MAX_INFOBOX_ENTRIES: usize = 3;
const MIN_RESULTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub business_name: String,
    pub search_type: String,
    pub query: String,
    pub results: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
}

/// Public-information lookup about a business.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, business_name: &str, search_type: &str) -> Result<SearchReport>;
}

/// Query text for a business name and search focus.
pub fn query_for(business_name: &str, search_type: &str) -> String {
    let suffix = match search_type {
        "financial" => "financial reports revenue profit annual report",
        "legal" => "legal issues lawsuit compliance violations",
        "news" => "latest news updates announcements",
        "general" => "company profile overview business",
        "credit" => "credit rating financial stability",
        _ => "company information",
    };
    format!("{} {}", business_name, suffix)
}

/// DuckDuckGo instant-answer API. Needs no API key.
pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.duckduckgo.com/";

    pub fn new() -> Result<Self> {
        Self::with_endpoint(Self::DEFAULT_ENDPOINT, Duration::from_secs(10))
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, business_name: &str, search_type: &str) -> Result<SearchReport> {
        let query = query_for(business_name, search_type);
        debug!("DuckDuckGo query: {}", query);

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "DuckDuckGo took too long to respond".to_string()
                } else {
                    e.to_string()
                };
                search_error(reason)
            })?;

        check_status(response.status())?;
        let body = response
            .text()
            .await
            .map_err(|e| search_error(format!("DuckDuckGo body could not be read: {}", e)))?;
        if body.trim().is_empty() {
            return Err(search_error("DuckDuckGo returned an empty answer".to_string()));
        }
        let answer: Value = serde_json::from_str(&body)
            .map_err(|e| search_error(format!("DuckDuckGo answer is not JSON: {}", e)))?;
        Ok(SearchReport {
            business_name: business_name.to_string(),
            search_type: search_type.to_string(),
            query,
            results: collect_hits(business_name, &answer),
            ai_summary: None,
        })
    }
}

fn search_error(reason: String) -> Error {
    Error::AgentError(AgentError::SearchError(reason))
}

/// DuckDuckGo answers `202 Accepted` with an empty body when it throttles.
fn check_status(status: StatusCode) -> Result<()> {
    if status == StatusCode::ACCEPTED {
        return Err(search_error(
            "DuckDuckGo throttled the request (202 Accepted)".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(search_error(format!("DuckDuckGo answered with status {}", status)));
    }
    Ok(())
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Flattens an instant-answer document into hits.
pub(crate) fn collect_hits(business_name: &str, answer: &Value) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if !text(answer, "Abstract").is_empty() {
        let source = match text(answer, "AbstractSource") {
            "" => "DuckDuckGo",
            source => source,
        };
        hits.push(SearchHit {
            title: format!("{} - Overview", business_name),
            snippet: text(answer, "Abstract").to_string(),
            url: text(answer, "AbstractURL").to_string(),
            source: source.to_string(),
        });
    }

    if !text(answer, "Definition").is_empty() {
        let source = match text(answer, "DefinitionSource") {
            "" => "DuckDuckGo",
            source => source,
        };
        hits.push(SearchHit {
            title: "Definition".to_string(),
            snippet: text(answer, "Definition").to_string(),
            url: text(answer, "DefinitionURL").to_string(),
            source: source.to_string(),
        });
    }

    if !text(answer, "Answer").is_empty() {
        hits.push(SearchHit {
            title: "Quick Answer".to_string(),
            snippet: text(answer, "Answer").to_string(),
            url: text(answer, "AnswerType").to_string(),
            source: "DuckDuckGo".to_string(),
        });
    }

    let topics = answer
        .get("RelatedTopics")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for topic in topics.iter().take(MAX_RELATED_TOPICS) {
        let Some(topic_text) = topic.get("Text").and_then(Value::as_str) else {
            continue;
        };
        let title: String = topic_text
            .split(" - ")
            .next()
            .unwrap_or_default()
            .chars()
            .take(100)
            .collect();
        hits.push(SearchHit {
            title,
            snippet: topic_text.to_string(),
            url: text(topic, "FirstURL").to_string(),
            source: "DuckDuckGo Related".to_string(),
        });
    }

    let infobox = answer
        .get("Infobox")
        .and_then(|infobox| infobox.get("content"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for item in infobox.iter().take(MAX_INFOBOX_ENTRIES) {
        let Some(value) = item.get("value") else {
            continue;
        };
        let snippet = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let title = match text(item, "label") {
            "" => "Info",
            label => label,
        };
        hits.push(SearchHit {
            title: title.to_string(),
            snippet,
            url: String::new(),
            source: "DuckDuckGo Infobox".to_string(),
        });
    }

    if hits.len() < MIN_RESULTS {
        hits.push(SearchHit {
            title: "Limited Results".to_string(),
            snippet: format!(
                "DuckDuckGo returned limited results for '{}'. This might indicate a smaller or newer business, or you may want to search with more specific terms.",
                business_name
            ),
            url: String::new(),
            source: "System Note".to_string(),
        });
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_suffixes() {
        assert_eq!(
            query_for("Acme", "credit"),
            "Acme credit rating financial stability"
        );
        assert_eq!(query_for("Acme", "gossip"), "Acme company information");
    }

    #[test]
    fn test_collect_hits_caps_related_topics() {
        let topics: Vec<Value> = (0..8)
            .map(|i| json!({"Text": format!("Topic {} - details", i), "FirstURL": "u"}))
            .collect();
        let answer = json!({
            "Abstract": "Acme makes anvils",
            "AbstractURL": "https://acme.example",
            "RelatedTopics": topics,
            "Infobox": {"content": [
                {"label": "Founded", "value": "1920"},
                {"label": "Staff", "value": 40},
                {"label": "HQ", "value": "Desert"},
                {"label": "Extra", "value": "dropped"}
            ]}
        });

        let hits = collect_hits("Acme", &answer);
        assert_eq!(hits.len(), 1 + 5 + 3);
        assert_eq!(hits[0].source, "DuckDuckGo");
        assert_eq!(hits[1].title, "Topic 0");
        assert_eq!(hits[7].snippet, "40");
    }

    #[test]
    fn test_sparse_answer_gets_note() {
        let hits = collect_hits("Tiny Co", &json!({"Answer": "42"}));

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Quick Answer");
        assert_eq!(hits[1].source, "System Note");
    }

    #[test]
    fn test_status_check() {
        assert!(check_status(StatusCode::OK).is_ok());
        for status in [
            StatusCode::ACCEPTED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
        ] {
            let err = check_status(status).unwrap_err();
            assert!(matches!(err, Error::AgentError(AgentError::SearchError(_))));
        }
    }

    /// Serves one canned HTTP reply and returns its address.
    async fn canned_server(reply: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_throttled_and_failing_answers_are_search_errors() {
        for reply in [
            "HTTP/1.1 202 Accepted\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\ncontent-length: 9\r\nconnection: close\r\n\r\n<html/>  ",
        ] {
            let endpoint = canned_server(reply).await;
            let search = DuckDuckGoSearch::with_endpoint(endpoint, Duration::from_secs(5)).unwrap();

            let err = search.search("Acme", "general").await.unwrap_err();
            assert!(
                matches!(err, Error::AgentError(AgentError::SearchError(_))),
                "unexpected error {:?}",
                err
            );
        }
    }
}
