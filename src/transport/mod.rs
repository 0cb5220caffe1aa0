//! Transport: the queue/topic client the bus runs on.
//!
//! The bus never talks to a broker directly; it consumes a [`QueueClient`]
//! passed in at construction. Production deployments implement it over a
//! managed queue service, tests use [`InMemoryTransport`].
//!
//! ```text
//! ┌──────────────┐  poll / delete / change_visibility  ┌─────────────┐
//! │ Subscription │ ──────────────────────────────────▶ │             │
//! │    Group     │                                     │ QueueClient │
//! └──────────────┘                                     │             │
//! ┌──────────────┐  send (queue or topic)              │             │
//! │  Publisher   │ ──────────────────────────────────▶ │             │
//! └──────────────┘                                     └─────────────┘
//! ```

mod in_memory;

pub use in_memory::InMemoryTransport;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the queue attribute holding the redrive policy token.
pub const REDRIVE_POLICY_ATTRIBUTE: &str = "RedrivePolicy";

/// A message as received from a queue, before decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    /// Transport-assigned message id.
    pub message_id: String,
    /// Handle identifying this particular receive, used to delete.
    pub receipt_handle: String,
    pub body: String,
    /// Number of times the message has been received, this receive included.
    pub receive_count: u32,
}

/// Where a message is sent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum Destination {
    /// Point-to-point queue.
    Queue(String),
    /// Fan-out topic.
    Topic(String),
}

impl Destination {
    pub fn name(&self) -> &str {
        match self {
            Destination::Queue(name) | Destination::Topic(name) => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Queue(_) => "queue",
            Destination::Topic(_) => "topic",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

/// Errors from transport calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("message not found in {queue} for receipt {receipt_handle}")]
    MessageNotFound {
        queue: String,
        receipt_handle: String,
    },

    #[error("transport call timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request throttled")]
    Throttled,

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout
                | TransportError::ConnectionFailed(_)
                | TransportError::Throttled
        )
    }
}

/// Client for the underlying queue/topic service.
///
/// Calls are individually idempotent at the transport layer. Timeouts apply
/// to each call, never to handler execution.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive up to `max_messages`, waiting up to `wait_time` for the first.
    async fn poll(
        &self,
        queue: &str,
        max_messages: u32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, TransportError>;

    /// Send a body to a queue or topic, returning the transport message id.
    async fn send(&self, destination: &Destination, body: String)
        -> Result<String, TransportError>;

    /// Delete a received message.
    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<(), TransportError>;

    /// Hide a received message for `timeout` before it becomes visible again.
    async fn change_visibility(
        &self,
        queue: &str,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), TransportError>;
}
