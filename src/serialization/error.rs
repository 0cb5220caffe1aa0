//! Error types for the serialization registry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializationError {
    /// No codec registered for this wire type name.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// A different codec is already registered for this type name.
    #[error("message type {type_name} is already registered with a different codec ({existing})")]
    DuplicateRegistration {
        type_name: String,
        existing: String,
    },

    /// The codec was handed a message of a different concrete type.
    #[error("codec for {expected} cannot encode a {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The body could not be encoded.
    #[error("failed to encode {type_name}: {reason}")]
    EncodeFailed { type_name: String, reason: String },

    /// The body could not be decoded.
    #[error("malformed payload for {type_name}: {reason}")]
    Malformed { type_name: String, reason: String },

    /// The wire envelope itself is unreadable.
    #[error("malformed wire envelope: {0}")]
    MalformedEnvelope(String),
}

impl SerializationError {
    /// The message type involved, when the failure can be attributed to one.
    pub fn message_type(&self) -> Option<&str> {
        match self {
            SerializationError::UnknownMessageType(type_name)
            | SerializationError::DuplicateRegistration { type_name, .. }
            | SerializationError::EncodeFailed { type_name, .. }
            | SerializationError::Malformed { type_name, .. } => Some(type_name.as_str()),
            SerializationError::TypeMismatch { expected, .. } => Some(*expected),
            SerializationError::MalformedEnvelope(_) => None,
        }
    }
}
