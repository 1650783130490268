use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Opaque key/value body carried by a message.
pub type Payload = Map<String, Value>;

/// Converts a JSON object into a payload. Non-object values give an empty
/// payload.
pub fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// One agent-to-agent communication attempt.
///
/// Messages are created by the exchange at send time and shared as
/// `Arc<Message>`, so they are never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id (UUID v4)
    pub id: String,
    /// Sending agent name
    pub sender: String,
    /// Receiving agent name, registered at send time
    pub receiver: String,
    /// Receiver-defined action tag
    pub action: String,
    /// Message body
    pub payload: Payload,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Id of the message this one answers, stored but never validated
    pub response_to: Option<String>,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        action: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self::at(Utc::now(), sender, receiver, action, payload)
    }

    pub(crate) fn at(
        timestamp: DateTime<Utc>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        action: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            receiver: receiver.into(),
            action: action.into(),
            payload,
            timestamp,
            response_to: None,
        }
    }

    pub fn with_response_to(mut self, response_to: Option<String>) -> Self {
        self.response_to = response_to;
        self
    }

    /// Reads a string field from the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Reads a list of strings from the payload, skipping non-string items.
    pub fn payload_str_list(&self, key: &str) -> Vec<String> {
        self.payload
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Selects history entries by sender, receiver or action.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub action: Option<String>,
}

impl MessageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn to_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn matches(&self, message: &Message) -> bool {
        if let Some(ref sender) = self.sender {
            if &message.sender != sender {
                return false;
            }
        }

        if let Some(ref receiver) = self.receiver {
            if &message.receiver != receiver {
                return false;
            }
        }

        if let Some(ref action) = self.action {
            if &message.action != action {
                return false;
            }
        }

        true
    }
}
