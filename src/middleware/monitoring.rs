//! Stopwatch and outcome reporting.

use async_trait::async_trait;
use tokio::time::Instant;

use super::{DispatchError, Middleware, Next};
use crate::monitor::MonitorGuard;
use crate::subscription::HandleMessageContext;

/// Reports every dispatch below it to the [`MessageMonitor`](crate::MessageMonitor).
///
/// - `handle_time` for every dispatch
/// - `handled` when the rest of the chain reports success
/// - `handle_exception` exactly once when it errors or panics; `handled` is
///   never reported for the same dispatch
///
/// Panics below this middleware are converted to [`DispatchError::Panicked`].
#[derive(Clone, Default)]
pub struct MonitoringMiddleware {
    monitor: MonitorGuard,
}

impl MonitoringMiddleware {
    pub fn new(monitor: MonitorGuard) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl Middleware for MonitoringMiddleware {
    async fn handle(
        &self,
        context: &HandleMessageContext,
        next: Next<'_>,
    ) -> Result<bool, DispatchError> {
        let started = Instant::now();
        let result = next.run_catching(context).await;
        self.monitor.handle_time(started.elapsed());

        match &result {
            Ok(true) => self.monitor.handled(context.message_type()),
            Ok(false) => {}
            Err(_) => self.monitor.handle_exception(context.message_type()),
        }
        result
    }

    fn name(&self) -> &'static str {
        "monitoring"
    }
}
