mod message;

use proc_macro::TokenStream;

/// Derive macro that implements `sourced_bus::Message` for a struct carrying
/// an `Envelope`.
///
/// # Usage
///
/// ```ignore
/// use sourced_bus::{Envelope, Message};
///
/// #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Message)]
/// #[message(name = "OrderAccepted", unique_key = order_id)]
/// pub struct OrderAccepted {
///     pub envelope: Envelope,
///     pub order_id: String,
/// }
/// ```
///
/// - `#[message(name = "...")]` sets the wire type name.
///   If omitted, defaults to the struct name.
/// - `#[message(unique_key = field)]` derives `unique_key()` from a field
///   (via `ToString`). If omitted, the envelope id is used.
/// - `#[message(envelope)]` on a field marks the envelope field.
///   If omitted, defaults to a field named `envelope`.
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    message::derive_message(input)
}
