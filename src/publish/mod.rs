//! Publisher path: encode a message and send it with bounded retry.
//!
//! Transient transport failures are retried with a constant delay between
//! attempts. A publisher configured with `publish_failure_reattempts = n`
//! makes at most `n + 1` send attempts before giving up.

mod publisher;

pub use publisher::MessagePublisher;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::Message;
use crate::serialization::SerializationError;
use crate::transport::{Destination, TransportError};

/// Errors surfaced to the caller of `publish`.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No publisher is configured for this message type.
    #[error("no publisher configured for message type {0}")]
    NoPublisher(String),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Every attempt failed with a transient error.
    #[error("publishing to {destination} failed after {attempts} attempts")]
    Failed {
        destination: Destination,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The transport refused the message outright; not retried.
    #[error("{destination} rejected the message")]
    Rejected {
        destination: Destination,
        #[source]
        source: TransportError,
    },
}

/// Sends encoded messages to a destination.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a message, returning the transport-assigned message id.
    async fn publish(&self, message: &dyn Message) -> Result<String, PublishError>;
}
