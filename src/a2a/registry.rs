use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::a2a::handler::{MessageHandler, SharedHandler};
use crate::error::agent_error::AgentError;
use crate::error::{Error, Result};

/// Name -> handler bindings owned by one exchange.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    handlers: Arc<RwLock<HashMap<String, SharedHandler>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `handler`, replacing any previous binding.
    pub async fn register<H>(&self, name: impl Into<String>, handler: H)
    where
        H: MessageHandler + 'static,
    {
        self.register_shared(name, Arc::new(handler)).await;
    }

    pub async fn register_shared(&self, name: impl Into<String>, handler: SharedHandler) {
        let name = name.into();
        let replaced = self
            .handlers
            .write()
            .await
            .insert(name.clone(), handler)
            .is_some();

        if replaced {
            info!("Agent {} re-registered, previous handler replaced", name);
        } else {
            info!("Registered agent: {}", name);
        }
    }

    pub async fn unregister(&self, name: &str) -> Result<()> {
        self.handlers
            .write()
            .await
            .remove(name)
            .ok_or_else(|| Error::AgentError(AgentError::AgentNotFound(name.to_string())))?;

        info!("Agent {} unregistered", name);
        Ok(())
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.handlers.read().await.contains_key(name)
    }

    pub async fn lookup(&self, name: &str) -> Option<SharedHandler> {
        self.handlers.read().await.get(name).cloned()
    }

    pub async fn registered_agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
