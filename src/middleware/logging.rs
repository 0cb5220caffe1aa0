use async_trait::async_trait;
use tracing::{debug, debug_span, Instrument};

use super::{DispatchError, Middleware, Next};
use crate::subscription::HandleMessageContext;

/// Runs the rest of the chain inside a `dispatch` span and records the outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(
        &self,
        context: &HandleMessageContext,
        next: Next<'_>,
    ) -> Result<bool, DispatchError> {
        let span = debug_span!(
            "dispatch",
            queue = context.queue(),
            message_type = context.message_type(),
            message_id = %context.raw().message_id,
            receive_count = context.receive_count(),
        );

        async move {
            debug!("Dispatching message");
            let result = next.run(context).await;
            match &result {
                Ok(handled) => debug!(handled = *handled, "Dispatch finished"),
                Err(err) => debug!(error = %err, "Dispatch errored"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}
