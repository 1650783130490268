use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::a2a::handler::{MessageHandler, SharedHandler};
use crate::a2a::message::{Message, MessageFilter, Payload};
use crate::a2a::registry::AgentRegistry;
use crate::a2a::response::{Outcome, Response};
use crate::error::agent_error::AgentError;
use crate::error::{Error, Result};

/// Exchange configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Upper bound on a single handler invocation. `None` waits forever.
    pub handler_timeout: Option<Duration>,
}

/// Point-to-point message exchange between named in-process agents.
///
/// Owns the agent registry and the append-only message history. Each
/// `send` looks up the receiver, records the message, awaits the handler
/// and hands its response back to the caller.
pub struct MessageExchange {
    registry: AgentRegistry,
    history: RwLock<Vec<Arc<Message>>>,
    config: ExchangeConfig,
}

impl MessageExchange {
    pub fn new(config: ExchangeConfig) -> Self {
        Self {
            registry: AgentRegistry::new(),
            history: RwLock::new(Vec::new()),
            config,
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub async fn register<H>(&self, name: impl Into<String>, handler: H)
    where
        H: MessageHandler + 'static,
    {
        self.registry.register(name, handler).await;
    }

    pub async fn register_shared(&self, name: impl Into<String>, handler: SharedHandler) {
        self.registry.register_shared(name, handler).await;
    }

    pub async fn unregister(&self, name: &str) -> Result<()> {
        self.registry.unregister(name).await
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.registry.is_registered(name).await
    }

    /// Sends a message and returns the receiver's response.
    ///
    /// Fails only when `receiver` is not registered, in which case nothing
    /// is recorded. Handler failures come back as a `status: "error"`
    /// response carrying the message id.
    pub async fn send(
        &self,
        sender: &str,
        receiver: &str,
        action: &str,
        payload: Payload,
        response_to: Option<String>,
    ) -> Result<Response> {
        let outcome = self
            .dispatch(sender, receiver, action, payload, response_to)
            .await?;
        Ok(outcome.into_response())
    }

    /// Like [`send`](Self::send) but keeps handler failures distinct from
    /// delivered responses.
    pub async fn dispatch(
        &self,
        sender: &str,
        receiver: &str,
        action: &str,
        payload: Payload,
        response_to: Option<String>,
    ) -> Result<Outcome> {
        let handler = match self.registry.lookup(receiver).await {
            Some(handler) => handler,
            None => {
                warn!("Rejected message from {}: agent {} not registered", sender, receiver);
                return Err(Error::AgentError(AgentError::UnknownReceiver(
                    receiver.to_string(),
                )));
            }
        };

        let message = self
            .record(sender, receiver, action, payload, response_to)
            .await;

        info!("A2A message {}: {} -> {} [{}]", message.id, sender, receiver, action);
        debug!(
            "Payload: {}",
            serde_json::to_string(&message.payload).unwrap_or_default()
        );

        let outcome = self.invoke(handler, message).await;

        match &outcome {
            Outcome::Delivered(response) => {
                debug!("Response: {}", response.to_value());
            }
            Outcome::HandlerError {
                message_id,
                description,
            } => {
                warn!("Handler {} failed on message {}: {}", receiver, message_id, description);
            }
        }

        Ok(outcome)
    }

    /// Builds the message and appends it in one critical section so that
    /// history order, id uniqueness and timestamp order agree.
    async fn record(
        &self,
        sender: &str,
        receiver: &str,
        action: &str,
        payload: Payload,
        response_to: Option<String>,
    ) -> Arc<Message> {
        let mut history = self.history.write().await;

        let mut timestamp = Utc::now();
        if let Some(last) = history.last() {
            if last.timestamp > timestamp {
                timestamp = last.timestamp;
            }
        }

        let message = Arc::new(
            Message::at(timestamp, sender, receiver, action, payload).with_response_to(response_to),
        );
        history.push(message.clone());
        message
    }

    async fn invoke(&self, handler: SharedHandler, message: Arc<Message>) -> Outcome {
        let message_id = message.id.clone();
        let receiver = message.receiver.clone();

        let call = AssertUnwindSafe(async move { handler.handle(message).await }).catch_unwind();

        let result = match self.config.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    let timeout = AgentError::HandlerTimeout {
                        agent: receiver,
                        timeout_ms: limit.as_millis(),
                    };
                    return Outcome::HandlerError {
                        message_id,
                        description: timeout.to_string(),
                    };
                }
            },
            None => call.await,
        };

        match result {
            Ok(Ok(response)) => Outcome::Delivered(response),
            Ok(Err(e)) => Outcome::HandlerError {
                message_id,
                description: e.to_string(),
            },
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!("Handler {} panicked: {}", receiver, reason);
                let failure =
                    AgentError::HandlerFailure(format!("handler {} panicked: {}", receiver, reason));
                Outcome::HandlerError {
                    message_id,
                    description: failure.to_string(),
                }
            }
        }
    }

    /// Full message log in send order.
    pub async fn get_history(&self) -> Vec<Arc<Message>> {
        self.history.read().await.clone()
    }

    pub async fn get_history_filtered(&self, filter: &MessageFilter) -> Vec<Arc<Message>> {
        self.history
            .read()
            .await
            .iter()
            .filter(|msg| filter.matches(msg))
            .cloned()
            .collect()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }
}

impl Default for MessageExchange {
    fn default() -> Self {
        Self::new(ExchangeConfig::default())
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(reason) = panic.downcast_ref::<&str>() {
        reason.to_string()
    } else if let Some(reason) = panic.downcast_ref::<String>() {
        reason.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn echo(message: Arc<Message>) -> Result<Response> {
        Ok(Response::success(&message.id).with_field("echo", message.payload.clone()))
    }

    #[tokio::test]
    async fn test_send_records_before_dispatch() {
        let exchange = MessageExchange::default();
        exchange.register("echo", echo).await;

        let response = exchange
            .send("caller", "echo", "ping", Payload::new(), None)
            .await
            .unwrap();

        let history = exchange.get_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(response.message_id.as_deref(), Some(history[0].id.as_str()));
    }

    #[tokio::test]
    async fn test_dispatch_separates_handler_errors() {
        let exchange = MessageExchange::default();
        exchange
            .register("broken", |_message: Arc<Message>| async move {
                Err::<Response, _>(Error::AgentError(AgentError::HandlerFailure(
                    "disk on fire".into(),
                )))
            })
            .await;

        let outcome = exchange
            .dispatch("caller", "broken", "anything", Payload::new(), None)
            .await
            .unwrap();

        match outcome {
            Outcome::HandlerError { description, .. } => {
                assert!(description.contains("disk on fire"));
            }
            other => panic!("expected handler error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_history_filter() {
        let exchange = MessageExchange::default();
        exchange.register("echo", echo).await;

        let payload = crate::a2a::message::into_payload(json!({"n": 1}));
        exchange.send("a", "echo", "ping", payload.clone(), None).await.unwrap();
        exchange.send("b", "echo", "pong", payload, None).await.unwrap();

        let from_b = exchange
            .get_history_filtered(&MessageFilter::new().from_sender("b"))
            .await;
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_b[0].action, "pong");
    }

    #[test]
    fn test_panic_reason() {
        let boxed: Box<dyn Any + Send> = Box::new("plain");
        assert_eq!(panic_reason(boxed.as_ref()), "plain");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_reason(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_reason(boxed.as_ref()), "unknown panic");
    }
}
