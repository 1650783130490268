//! In-process agent-to-agent messaging for a loan underwriting assistant.
//!
//! [`a2a::MessageExchange`] routes messages between named agents, contains
//! handler failures and keeps an append-only history. The data fetcher and
//! underwriter agents in [`agents`] are built on top of it.

pub mod a2a;
pub mod agents;
pub mod error;
pub mod llm;
pub mod search;
pub mod shared;
pub mod store;

pub use a2a::{Message, MessageExchange, Outcome, Payload, Response, ResponseStatus};
pub use error::{Error, Result};
