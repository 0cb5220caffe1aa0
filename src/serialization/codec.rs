//! Message codecs: encode a type-erased message to a string body and back.

use std::any::TypeId;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::SerializationError;
use crate::message::Message;

/// Encode / decode functions for one message type.
///
/// Codecs are compared by [`MessageCodec::codec_id`] when a type is
/// registered twice; two codecs with the same id are interchangeable.
pub trait MessageCodec: Send + Sync {
    /// Encode a message to its string body.
    fn encode(&self, message: &dyn Message) -> Result<String, SerializationError>;

    /// Decode a string body into a message.
    fn decode(&self, body: &str) -> Result<Box<dyn Message>, SerializationError>;

    /// Identity of this codec: target type plus format.
    fn codec_id(&self) -> (TypeId, &'static str);
}

/// JSON codec backed by `serde_json`.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> MessageCodec for JsonCodec<T>
where
    T: Message + Serialize + DeserializeOwned,
{
    fn encode(&self, message: &dyn Message) -> Result<String, SerializationError> {
        let typed = downcast::<T>(message)?;
        serde_json::to_string(typed).map_err(|e| SerializationError::EncodeFailed {
            type_name: T::type_name().to_string(),
            reason: e.to_string(),
        })
    }

    fn decode(&self, body: &str) -> Result<Box<dyn Message>, SerializationError> {
        let typed: T = serde_json::from_str(body).map_err(|e| SerializationError::Malformed {
            type_name: T::type_name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(typed))
    }

    fn codec_id(&self) -> (TypeId, &'static str) {
        (TypeId::of::<T>(), "json")
    }
}

/// Compact binary codec backed by `bitcode`, carried as base64 text.
#[cfg(feature = "binary")]
pub struct BitcodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

#[cfg(feature = "binary")]
impl<T> Default for BitcodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "binary")]
impl<T> BitcodeCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

#[cfg(feature = "binary")]
impl<T> MessageCodec for BitcodeCodec<T>
where
    T: Message + Serialize + DeserializeOwned,
{
    fn encode(&self, message: &dyn Message) -> Result<String, SerializationError> {
        use base64::Engine;

        let typed = downcast::<T>(message)?;
        let bytes = bitcode::serialize(typed).map_err(|e| SerializationError::EncodeFailed {
            type_name: T::type_name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    fn decode(&self, body: &str) -> Result<Box<dyn Message>, SerializationError> {
        use base64::Engine;

        let malformed = |reason: String| SerializationError::Malformed {
            type_name: T::type_name().to_string(),
            reason,
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|e| malformed(e.to_string()))?;
        let typed: T = bitcode::deserialize(&bytes).map_err(|e| malformed(e.to_string()))?;
        Ok(Box::new(typed))
    }

    fn codec_id(&self) -> (TypeId, &'static str) {
        (TypeId::of::<T>(), "bitcode")
    }
}

fn downcast<T: Message>(message: &dyn Message) -> Result<&T, SerializationError> {
    message
        .downcast_ref::<T>()
        .ok_or(SerializationError::TypeMismatch {
            expected: T::type_name(),
            actual: message.message_type(),
        })
}
