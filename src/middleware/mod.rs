//! Middleware chain: composable behaviors wrapped around handler invocation.
//!
//! A middleware receives the [`HandleMessageContext`] and a [`Next`]
//! continuation standing for the rest of the chain, ending in the handler
//! resolved from the [`HandlerMap`]. It may call `next` once (consuming it)
//! and pass on or transform the result, short-circuit without calling it, or
//! act after it returns.
//!
//! ```text
//! execute(ctx)
//!   └─ Logging
//!        └─ Monitoring          handled / handle_exception / handle_time
//!             └─ PostProcessing delete on success
//!                  └─ user middleware ...
//!                       └─ HandlerMap::dispatch
//! ```
//!
//! The first registered middleware is outermost.

mod backoff;
mod error;
mod logging;
mod monitoring;
mod post_processing;

pub use backoff::{BackoffMiddleware, ExponentialBackoffStrategy, MessageBackoffStrategy};
pub use error::DispatchError;
pub use logging::LoggingMiddleware;
pub use monitoring::MonitoringMiddleware;
pub use post_processing::PostProcessingMiddleware;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, warn};

use crate::handler::HandlerMap;
use crate::subscription::HandleMessageContext;

/// A behavior wrapped around handler invocation.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        context: &HandleMessageContext,
        next: Next<'_>,
    ) -> Result<bool, DispatchError>;

    /// Name used in logs and interrogation.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The rest of the chain. Consumed when run, so it can be invoked at most once.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    handlers: &'a HandlerMap,
}

impl<'a> Next<'a> {
    /// Run the remaining middleware and then the handler.
    pub async fn run(self, context: &HandleMessageContext) -> Result<bool, DispatchError> {
        match self.middlewares.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    middlewares: rest,
                    handlers: self.handlers,
                };
                head.handle(context, next).await
            }
            None => self
                .handlers
                .dispatch(context.message())
                .await
                .map_err(DispatchError::from),
        }
    }

    /// Run the rest of the chain, turning a panic into [`DispatchError::Panicked`].
    pub async fn run_catching(self, context: &HandleMessageContext) -> Result<bool, DispatchError> {
        match AssertUnwindSafe(self.run(context)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(DispatchError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

/// An ordered middleware pipeline ending in a handler map.
#[derive(Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
    handlers: Arc<HandlerMap>,
}

impl MiddlewareChain {
    /// A chain with no middleware: dispatch goes straight to the handler.
    pub fn new(handlers: Arc<HandlerMap>) -> Self {
        Self {
            middlewares: Vec::new(),
            handlers,
        }
    }

    /// Append a middleware. Earlier registrations wrap later ones.
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn handlers(&self) -> &HandlerMap {
        &self.handlers
    }

    /// Middleware names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Start of the chain.
    pub fn next(&self) -> Next<'_> {
        Next {
            middlewares: &self.middlewares,
            handlers: &self.handlers,
        }
    }

    /// Run the chain to completion and reduce the outcome to success or failure.
    ///
    /// Errors and panics from any middleware or the handler are absorbed here
    /// and reported as `false`; nothing propagates to the dispatch loop.
    pub async fn execute(&self, context: &HandleMessageContext) -> bool {
        match self.next().run_catching(context).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(
                    queue = context.queue(),
                    message_type = context.message_type(),
                    message_id = %context.raw().message_id,
                    "Message was not handled; leaving it for redelivery"
                );
                false
            }
            Err(err) => {
                error!(
                    queue = context.queue(),
                    message_type = context.message_type(),
                    message_id = %context.raw().message_id,
                    error = %err,
                    "Dispatch failed; leaving message for redelivery"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("middlewares", &self.names())
            .field("handlers", &self.handlers)
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
