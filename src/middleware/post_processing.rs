//! Acknowledge (delete) a message once it has been handled.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{DispatchError, Middleware, Next};
use crate::subscription::HandleMessageContext;

/// Deletes the message from its source queue when, and only when, the rest of
/// the chain reports success.
///
/// Failure, errors and panics leave the message in place; the transport
/// redelivers it and eventually dead-letters it per the queue's redrive
/// policy. A failed delete is logged and the dispatch still counts as
/// handled, so the message may be seen again.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostProcessingMiddleware;

#[async_trait]
impl Middleware for PostProcessingMiddleware {
    async fn handle(
        &self,
        context: &HandleMessageContext,
        next: Next<'_>,
    ) -> Result<bool, DispatchError> {
        let handled = next.run(context).await?;
        if !handled {
            return Ok(false);
        }

        match context.deleter().delete().await {
            Ok(_) => debug!(
                queue = context.queue(),
                message_id = %context.raw().message_id,
                "Deleted handled message"
            ),
            Err(err) => warn!(
                queue = context.queue(),
                message_id = %context.raw().message_id,
                error = %err,
                "Failed to delete handled message; it will be redelivered"
            ),
        }
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "post-processing"
    }
}
