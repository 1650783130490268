use std::{future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{
    a2a::{message::Message, response::Response},
    error::Result,
};

/// Capability every registered agent provides: answer one message.
///
/// Business-level failures (unknown action, missing document) should be
/// returned as a `status: "error"` [`Response`]. An `Err` or a panic is
/// still contained by the exchange and turned into an error response.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Arc<Message>) -> Result<Response>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn handle(&self, message: Arc<Message>) -> Result<Response> {
        (self)(message).await
    }
}

pub type SharedHandler = Arc<dyn MessageHandler>;
