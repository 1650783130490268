use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status carried by every response.
///
/// Receivers may report their own variants, which round-trip through
/// [`ResponseStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseStatus {
    Success,
    Error,
    Acknowledged,
    Other(String),
}

impl From<String> for ResponseStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "success" => ResponseStatus::Success,
            "error" => ResponseStatus::Error,
            "acknowledged" => ResponseStatus::Acknowledged,
            _ => ResponseStatus::Other(value),
        }
    }
}

impl From<ResponseStatus> for String {
    fn from(status: ResponseStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Success => write!(f, "success"),
            ResponseStatus::Error => write!(f, "error"),
            ResponseStatus::Acknowledged => write!(f, "acknowledged"),
            ResponseStatus::Other(status) => write!(f, "{}", status),
        }
    }
}

/// Data returned by a handler for one message.
///
/// Serializes as a flat map: `status`, `message_id`, `error` and then every
/// receiver-specific field in `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Response {
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            status,
            message_id: None,
            error: None,
            body: Map::new(),
        }
    }

    pub fn success(message_id: &str) -> Self {
        Self::new(ResponseStatus::Success).with_message_id(message_id)
    }

    pub fn acknowledged(message_id: &str) -> Self {
        Self::new(ResponseStatus::Acknowledged).with_message_id(message_id)
    }

    pub fn error(message_id: &str, description: impl Into<String>) -> Self {
        let mut response = Self::new(ResponseStatus::Error).with_message_id(message_id);
        response.error = Some(description.into());
        response
    }

    /// Conventional reply for an action the receiver does not support.
    pub fn unknown_action(message_id: &str, action: &str) -> Self {
        Self::error(message_id, format!("Unknown action: {}", action))
    }

    pub fn with_message_id(mut self, message_id: &str) -> Self {
        self.message_id = Some(message_id.to_string());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Stamps the response with the current time in RFC 3339 form.
    pub fn with_timestamp(self) -> Self {
        self.with_field("timestamp", Utc::now().to_rfc3339())
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    /// Error text for display, falling back to a generic description.
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("Unknown error")
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// What happened to a dispatched message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The handler returned normally, whatever status it reported.
    Delivered(Response),
    /// The handler failed, panicked or timed out.
    HandlerError {
        message_id: String,
        description: String,
    },
}

impl Outcome {
    pub fn is_handler_error(&self) -> bool {
        matches!(self, Outcome::HandlerError { .. })
    }

    /// Flattens the outcome into the response seen by `send` callers.
    pub fn into_response(self) -> Response {
        match self {
            Outcome::Delivered(response) => response,
            Outcome::HandlerError {
                message_id,
                description,
            } => Response::error(&message_id, description),
        }
    }
}
