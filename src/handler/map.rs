use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{Handler, HandlerError};
use crate::message::Message;

/// Type-erased handler as stored in the map.
#[async_trait]
pub trait ErasedHandler: Send + Sync {
    /// Handle a decoded message whose runtime type matches this handler.
    async fn handle_erased(&self, message: &dyn Message) -> Result<bool, HandlerError>;

    /// Name of the handler type, for logs and interrogation.
    fn handler_name(&self) -> &'static str;
}

struct TypedHandler<T, H> {
    inner: H,
    _marker: PhantomData<fn(T)>,
}

#[async_trait]
impl<T, H> ErasedHandler for TypedHandler<T, H>
where
    T: Message,
    H: Handler<T>,
{
    async fn handle_erased(&self, message: &dyn Message) -> Result<bool, HandlerError> {
        match message.downcast_ref::<T>() {
            Some(typed) => self.inner.handle(typed).await,
            None => Err(HandlerError::NoHandlerRegistered(
                message.message_type().to_string(),
            )),
        }
    }

    fn handler_name(&self) -> &'static str {
        std::any::type_name::<H>()
    }
}

/// Maps message type names to their handler.
#[derive(Clone, Default)]
pub struct HandlerMap {
    handlers: HashMap<String, Arc<dyn ErasedHandler>>,
}

impl HandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for messages of type `T`.
    ///
    /// Replaces any handler previously registered for `T`.
    pub fn register<T, H>(&mut self, handler: H) -> &mut Self
    where
        T: Message,
        H: Handler<T>,
    {
        let erased: Arc<dyn ErasedHandler> = Arc::new(TypedHandler {
            inner: handler,
            _marker: PhantomData,
        });
        if let Some(previous) = self.handlers.insert(T::type_name().to_string(), erased) {
            warn!(
                message_type = T::type_name(),
                replaced = previous.handler_name(),
                "Handler registration replaced an existing handler"
            );
        }
        self
    }

    /// Builder-style variant of [`HandlerMap::register`].
    pub fn with<T, H>(mut self, handler: H) -> Self
    where
        T: Message,
        H: Handler<T>,
    {
        self.register::<T, H>(handler);
        self
    }

    /// Resolve the handler for a message by its runtime type.
    pub fn get_handler(
        &self,
        message: &dyn Message,
    ) -> Result<Arc<dyn ErasedHandler>, HandlerError> {
        self.handlers
            .get(message.message_type())
            .cloned()
            .ok_or_else(|| HandlerError::NoHandlerRegistered(message.message_type().to_string()))
    }

    /// Resolve and invoke the handler for a message.
    pub async fn dispatch(&self, message: &dyn Message) -> Result<bool, HandlerError> {
        self.get_handler(message)?.handle_erased(message).await
    }

    /// Registered message type names.
    pub fn message_types(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }

    /// `(message type, handler type)` pairs, sorted by message type.
    pub fn registrations(&self) -> Vec<(&str, &'static str)> {
        let mut registrations: Vec<_> = self
            .handlers
            .iter()
            .map(|(message_type, handler)| (message_type.as_str(), handler.handler_name()))
            .collect();
        registrations.sort_unstable();
        registrations
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types = self.message_types();
        types.sort_unstable();
        f.debug_struct("HandlerMap").field("message_types", &types).finish()
    }
}
