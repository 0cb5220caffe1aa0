//! Delay redelivery of messages that failed to dispatch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{DispatchError, Middleware, Next};
use crate::subscription::HandleMessageContext;

/// Chooses how long a failed message stays hidden before redelivery.
pub trait MessageBackoffStrategy: Send + Sync {
    /// Delay for a message that has been received `receive_count` times.
    fn backoff(&self, receive_count: u32) -> Duration;
}

/// `initial * multiplier^(receive_count - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoffStrategy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
}

impl Default for ExponentialBackoffStrategy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(15 * 60),
            multiplier: 2,
        }
    }
}

impl MessageBackoffStrategy for ExponentialBackoffStrategy {
    fn backoff(&self, receive_count: u32) -> Duration {
        let exponent = receive_count.saturating_sub(1);
        let factor = self.multiplier.checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl<F> MessageBackoffStrategy for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn backoff(&self, receive_count: u32) -> Duration {
        self(receive_count)
    }
}

/// On an unsuccessful dispatch, hides the message for the strategy's delay
/// instead of waiting out the queue's default visibility timeout.
///
/// The dispatch result passes through unchanged; panics below are converted
/// to [`DispatchError::Panicked`].
#[derive(Clone)]
pub struct BackoffMiddleware {
    strategy: Arc<dyn MessageBackoffStrategy>,
}

impl BackoffMiddleware {
    pub fn new(strategy: Arc<dyn MessageBackoffStrategy>) -> Self {
        Self { strategy }
    }
}

impl Default for BackoffMiddleware {
    fn default() -> Self {
        Self::new(Arc::new(ExponentialBackoffStrategy::default()))
    }
}

#[async_trait]
impl Middleware for BackoffMiddleware {
    async fn handle(
        &self,
        context: &HandleMessageContext,
        next: Next<'_>,
    ) -> Result<bool, DispatchError> {
        let result = next.run_catching(context).await;
        if matches!(result, Ok(true)) {
            return result;
        }

        let delay = self.strategy.backoff(context.receive_count());
        match context.change_visibility(delay).await {
            Ok(()) => debug!(
                queue = context.queue(),
                message_id = %context.raw().message_id,
                delay_ms = delay.as_millis() as u64,
                "Backing off failed message"
            ),
            Err(err) => warn!(
                queue = context.queue(),
                message_id = %context.raw().message_id,
                error = %err,
                "Failed to change message visibility"
            ),
        }
        result
    }

    fn name(&self) -> &'static str {
        "backoff"
    }
}
