//! Message model: the envelope every domain message carries.
//!
//! A message is any struct that holds an [`Envelope`] and implements
//! [`Message`]. The trait is deliberately small: identity, type tag and the
//! de-duplication key. Most messages get it from `#[derive(Message)]`.
//!
//! ```ignore
//! use sourced_bus::{Envelope, Message};
//!
//! #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Message)]
//! #[message(unique_key = order_id)]
//! pub struct OrderAccepted {
//!     pub envelope: Envelope,
//!     pub order_id: String,
//! }
//! ```

mod envelope;

pub use envelope::Envelope;

use std::any::Any;

/// Capability interface implemented by every message type.
///
/// `unique_key()` must be stable across redeliveries of a logically identical
/// message so handlers can detect duplicates. It defaults to the envelope id.
pub trait Message: Any + Send + Sync {
    /// Wire type name for this message type.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Wire type name of this value (the runtime counterpart of `type_name`).
    fn message_type(&self) -> &'static str;

    fn envelope(&self) -> &Envelope;

    fn envelope_mut(&mut self) -> &mut Envelope;

    /// Application-level de-duplication identity.
    fn unique_key(&self) -> String {
        self.envelope().id.to_string()
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn Message {
    /// Downcast a type-erased message to its concrete type.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Check whether the message is of concrete type `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl std::fmt::Debug for dyn Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.message_type())
            .field("id", &self.envelope().id)
            .field("unique_key", &self.unique_key())
            .finish()
    }
}
