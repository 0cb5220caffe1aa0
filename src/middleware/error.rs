//! Error type for a single dispatch through the middleware chain.

use thiserror::Error;

use crate::handler::HandlerError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler registered for the message type.
    #[error("no handler registered for message type {0}")]
    NoHandler(String),

    /// The handler returned an error.
    #[error(transparent)]
    Handler(HandlerError),

    /// The handler or a middleware panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// A middleware's transport call failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A middleware refused the message.
    #[error("rejected by middleware: {0}")]
    Rejected(String),
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::NoHandlerRegistered(message_type) => DispatchError::NoHandler(message_type),
            other => DispatchError::Handler(other),
        }
    }
}
