use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::codec::{JsonCodec, MessageCodec};
use super::SerializationError;
use crate::message::Message;

/// Transport body: the type tag plus the codec-encoded message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireEnvelope {
    pub subject: String,
    pub message: String,
}

/// Registry of message codecs keyed by wire type name.
///
/// ## Example
///
/// ```ignore
/// let mut registry = SerializationRegistry::new();
/// registry.register_json::<OrderAccepted>()?;
///
/// let body = registry.serialize(&order)?;
/// let decoded = registry.deserialize(&body)?;
/// assert_eq!(decoded.message_type(), "OrderAccepted");
/// ```
#[derive(Clone, Default)]
pub struct SerializationRegistry {
    codecs: HashMap<String, Arc<dyn MessageCodec>>,
}

impl SerializationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a type name with a codec.
    ///
    /// Registering an equivalent codec twice is a no-op; registering a
    /// different codec under an existing name fails.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        codec: Arc<dyn MessageCodec>,
    ) -> Result<(), SerializationError> {
        let type_name = type_name.into();
        if let Some(existing) = self.codecs.get(&type_name) {
            if Arc::ptr_eq(existing, &codec) || existing.codec_id() == codec.codec_id() {
                return Ok(());
            }
            return Err(SerializationError::DuplicateRegistration {
                type_name,
                existing: existing.codec_id().1.to_string(),
            });
        }
        debug!(message_type = %type_name, format = codec.codec_id().1, "Registered message codec");
        self.codecs.insert(type_name, codec);
        Ok(())
    }

    /// Register the JSON codec for `T` under `T::type_name()`.
    pub fn register_json<T>(&mut self) -> Result<(), SerializationError>
    where
        T: Message + Serialize + DeserializeOwned,
    {
        self.register(T::type_name(), Arc::new(JsonCodec::<T>::new()))
    }

    /// Register the bitcode codec for `T` under `T::type_name()`.
    #[cfg(feature = "binary")]
    pub fn register_bitcode<T>(&mut self) -> Result<(), SerializationError>
    where
        T: Message + Serialize + DeserializeOwned,
    {
        self.register(T::type_name(), Arc::new(super::BitcodeCodec::<T>::new()))
    }

    /// Look up the codec for a wire type name.
    pub fn lookup(&self, type_name: &str) -> Result<&Arc<dyn MessageCodec>, SerializationError> {
        self.codecs
            .get(type_name)
            .ok_or_else(|| SerializationError::UnknownMessageType(type_name.to_string()))
    }

    /// Look up the codec for a message value by its runtime type name.
    pub fn lookup_for(
        &self,
        message: &dyn Message,
    ) -> Result<&Arc<dyn MessageCodec>, SerializationError> {
        self.lookup(message.message_type())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.codecs.contains_key(type_name)
    }

    /// Registered type names.
    pub fn message_types(&self) -> Vec<&str> {
        self.codecs.keys().map(|s| s.as_str()).collect()
    }

    /// Encode a message into a transport body (wire envelope JSON).
    pub fn serialize(&self, message: &dyn Message) -> Result<String, SerializationError> {
        let codec = self.lookup_for(message)?;
        let wire = WireEnvelope {
            subject: message.message_type().to_string(),
            message: codec.encode(message)?,
        };
        serde_json::to_string(&wire).map_err(|e| SerializationError::EncodeFailed {
            type_name: wire.subject.clone(),
            reason: e.to_string(),
        })
    }

    /// Decode a transport body into a message.
    pub fn deserialize(&self, body: &str) -> Result<Box<dyn Message>, SerializationError> {
        let wire: WireEnvelope = serde_json::from_str(body)
            .map_err(|e| SerializationError::MalformedEnvelope(e.to_string()))?;
        self.lookup(&wire.subject)?.decode(&wire.message)
    }
}

impl std::fmt::Debug for SerializationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types = self.message_types();
        types.sort_unstable();
        f.debug_struct("SerializationRegistry")
            .field("message_types", &types)
            .finish()
    }
}
