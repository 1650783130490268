pub mod exchange;
pub mod handler;
pub mod message;
pub mod registry;
pub mod response;

pub use exchange::{ExchangeConfig, MessageExchange};
pub use handler::{MessageHandler, SharedHandler};
pub use message::{Message, MessageFilter, Payload, into_payload};
pub use registry::AgentRegistry;
pub use response::{Outcome, Response, ResponseStatus};
