//! Subscription groups: the read, buffer and dispatch scheduler.
//!
//! ## Architecture
//!
//! ```text
//!  queue A ──► reader A ──┐                      ┌──► worker 1 ──► MiddlewareChain
//!                         ├──► Multiplexer ──────┼──► worker 2 ──► MiddlewareChain
//!  queue B ──► reader B ──┘   (bounded buffer)   └──► worker N ──► MiddlewareChain
//! ```
//!
//! - One reader per source queue polls, decodes through the
//!   [`SerializationRegistry`](crate::SerializationRegistry) and pushes into
//!   the buffer, waiting when it is full.
//! - `concurrency_limit` workers pop items, build a [`HandleMessageContext`]
//!   and run it through the group's middleware chain.
//! - The buffer is the only state readers and workers share.
//!
//! Groups are independent: each owns its buffer, workers and cancellation
//! token.
//!
//! ## Lifecycle
//!
//! `Stopped → Starting → Running → Draining → Stopped`
//!
//! On cancellation readers stop after their current poll and the buffer
//! refuses further pushes. Workers finish the item they hold and exit
//! without taking another; buffered items are left undeleted for the
//! transport to redeliver.

mod buffer;
mod context;
mod group;
mod settings;

pub use buffer::Multiplexer;
pub use context::{HandleMessageContext, MessageDeleter};
pub use group::{GroupState, SubscriptionGroup};
pub use settings::SubscriptionGroupSettings;

use std::sync::Arc;

use thiserror::Error;

use crate::handler::HandlerMap;
use crate::middleware::Middleware;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("subscription group {group} cannot start while {state:?}")]
    AlreadyStarted { group: String, state: GroupState },
}

/// Everything needed to build a subscription group: its settings, the
/// handlers for the message types it consumes and any user middleware.
///
/// User middleware runs inside the built-in logging, monitoring and
/// post-processing middleware, in registration order.
#[derive(Clone)]
pub struct Subscription {
    pub settings: SubscriptionGroupSettings,
    pub handlers: HandlerMap,
    pub middleware: Vec<Arc<dyn Middleware>>,
}

impl Subscription {
    pub fn new(settings: SubscriptionGroupSettings, handlers: HandlerMap) -> Self {
        Self {
            settings,
            handlers,
            middleware: Vec::new(),
        }
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("settings", &self.settings)
            .field("handlers", &self.handlers)
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
