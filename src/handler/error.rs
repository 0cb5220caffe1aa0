//! Error types for message handlers.

use std::error::Error;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// No handler registered for this message type.
    #[error("no handler registered for message type {0}")]
    NoHandlerRegistered(String),

    /// Business logic rejected the message.
    #[error("rejected: {0}")]
    Rejected(String),

    /// A downstream dependency failed.
    #[error("handler error: {0}")]
    Other(#[source] Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn other(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        HandlerError::Other(err.into())
    }
}
