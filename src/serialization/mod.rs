//! Serialization registry: maps wire type names to codecs.
//!
//! The registry is built once at startup by explicit registration and is
//! read-only afterwards. Outbound messages are looked up by value (their
//! runtime type name), inbound bodies by the type tag in the wire envelope.
//!
//! ## Wire format
//!
//! ```text
//! {"Subject":"OrderAccepted","Message":"<codec-encoded body>"}
//! ```

mod codec;
mod error;
mod registry;

#[cfg(feature = "binary")]
pub use codec::BitcodeCodec;
pub use codec::{JsonCodec, MessageCodec};
pub use error::SerializationError;
pub use registry::{SerializationRegistry, WireEnvelope};
