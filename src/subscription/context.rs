//! Per-message dispatch context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::message::Message;
use crate::transport::{QueueClient, RawMessage, TransportError};

/// Single-use capability to delete one received message from its queue.
///
/// A second call is a no-op returning `Ok(false)`.
pub struct MessageDeleter {
    client: Arc<dyn QueueClient>,
    queue: String,
    receipt_handle: String,
    used: AtomicBool,
}

impl MessageDeleter {
    pub fn new(
        client: Arc<dyn QueueClient>,
        queue: impl Into<String>,
        receipt_handle: impl Into<String>,
    ) -> Self {
        Self {
            client,
            queue: queue.into(),
            receipt_handle: receipt_handle.into(),
            used: AtomicBool::new(false),
        }
    }

    /// Delete the message. Returns `Ok(true)` if this call performed the delete.
    pub async fn delete(&self) -> Result<bool, TransportError> {
        if self.used.swap(true, Ordering::AcqRel) {
            debug!(queue = %self.queue, "Message already deleted; skipping");
            return Ok(false);
        }
        match self.client.delete(&self.queue, &self.receipt_handle).await {
            Ok(()) => Ok(true),
            Err(err) => {
                self.used.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for MessageDeleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDeleter")
            .field("queue", &self.queue)
            .field("receipt_handle", &self.receipt_handle)
            .field("used", &self.is_used())
            .finish()
    }
}

/// Everything a middleware can see about the message being dispatched.
///
/// Created when an item is taken from the group's buffer and dropped once the
/// middleware chain completes.
pub struct HandleMessageContext {
    message: Box<dyn Message>,
    raw: RawMessage,
    queue: String,
    client: Arc<dyn QueueClient>,
    deleter: MessageDeleter,
    cancellation: CancellationToken,
}

impl HandleMessageContext {
    pub fn new(
        message: Box<dyn Message>,
        raw: RawMessage,
        queue: impl Into<String>,
        client: Arc<dyn QueueClient>,
        cancellation: CancellationToken,
    ) -> Self {
        let queue = queue.into();
        let deleter = MessageDeleter::new(client.clone(), queue.clone(), raw.receipt_handle.clone());
        Self {
            message,
            raw,
            queue,
            client,
            deleter,
            cancellation,
        }
    }

    /// The decoded message.
    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    pub fn message_type(&self) -> &'static str {
        self.message.message_type()
    }

    /// The message as received from the transport.
    pub fn raw(&self) -> &RawMessage {
        &self.raw
    }

    /// Source queue name.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn receive_count(&self) -> u32 {
        self.raw.receive_count
    }

    pub fn deleter(&self) -> &MessageDeleter {
        &self.deleter
    }

    /// Cancellation signal of the owning subscription group.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Hide the message for `timeout` before the transport redelivers it.
    pub async fn change_visibility(&self, timeout: Duration) -> Result<(), TransportError> {
        self.client
            .change_visibility(&self.queue, &self.raw.receipt_handle, timeout)
            .await
    }
}

impl std::fmt::Debug for HandleMessageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleMessageContext")
            .field("queue", &self.queue)
            .field("message", &self.message)
            .field("message_id", &self.raw.message_id)
            .field("receive_count", &self.raw.receive_count)
            .finish()
    }
}
