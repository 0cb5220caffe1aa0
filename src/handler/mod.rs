//! Handler map: routes a decoded message to the handler for its type.
//!
//! Handlers are registered per subscription group by message type. At most
//! one handler exists per type: registering a second one replaces the first
//! (last write wins) and logs a warning, since this is rarely intended.
//!
//! ```ignore
//! struct ShipOrder;
//!
//! #[async_trait]
//! impl Handler<OrderAccepted> for ShipOrder {
//!     async fn handle(&self, message: &OrderAccepted) -> Result<bool, HandlerError> {
//!         // ...
//!         Ok(true)
//!     }
//! }
//!
//! let mut handlers = HandlerMap::new();
//! handlers.register::<OrderAccepted, _>(ShipOrder);
//! ```

mod error;
mod map;

pub use error::HandlerError;
pub use map::{ErasedHandler, HandlerMap};

use async_trait::async_trait;

use crate::message::Message;

/// A handler for messages of type `T`.
///
/// Returning `Ok(true)` means the message was handled and may be deleted.
/// `Ok(false)` or `Err(_)` leaves it on the queue for redelivery.
#[async_trait]
pub trait Handler<T: Message>: Send + Sync + 'static {
    async fn handle(&self, message: &T) -> Result<bool, HandlerError>;
}
