#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent {0} not registered")]
    UnknownReceiver(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("{0}")]
    HandlerFailure(String),

    #[error("Handler for {agent} timed out after {timeout_ms} ms")]
    HandlerTimeout { agent: String, timeout_ms: u128 },

    #[error("Data file {0}.json not found")]
    DocumentNotFound(String),

    #[error("Invalid document {data_type}: {reason}")]
    InvalidDocument { data_type: String, reason: String },

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("{agent} reported an error: {error}")]
    RemoteAgent { agent: String, error: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
