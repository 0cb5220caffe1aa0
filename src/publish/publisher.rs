use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{PublishError, Publisher};
use crate::config::PublisherConfig;
use crate::message::Message;
use crate::serialization::SerializationRegistry;
use crate::transport::{Destination, QueueClient};

/// Publisher bound to one destination.
///
/// ## Example
///
/// ```ignore
/// let publisher = MessagePublisher::new(
///     &PublisherConfig::new("OrderAccepted", Destination::Topic("order-accepted".into())),
///     client,
///     registry,
/// );
/// let message_id = publisher.publish(&order).await?;
/// ```
#[derive(Clone)]
pub struct MessagePublisher {
    destination: Destination,
    client: Arc<dyn QueueClient>,
    registry: Arc<SerializationRegistry>,
    reattempts: u32,
    backoff: Duration,
}

impl MessagePublisher {
    pub fn new(
        config: &PublisherConfig,
        client: Arc<dyn QueueClient>,
        registry: Arc<SerializationRegistry>,
    ) -> Self {
        Self {
            destination: config.destination.clone(),
            client,
            registry,
            reattempts: config.publish_failure_reattempts,
            backoff: config.publish_failure_backoff,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Maximum number of send attempts per publish.
    pub fn max_attempts(&self) -> u32 {
        self.reattempts.saturating_add(1)
    }

    /// Send an already encoded body, retrying transient failures.
    pub async fn send(&self, body: String) -> Result<String, PublishError> {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match self.client.send(&self.destination, body.clone()).await {
                Ok(message_id) => {
                    debug!(
                        destination = %self.destination,
                        message_id = %message_id,
                        attempt,
                        "Published message"
                    );
                    return Ok(message_id);
                }
                Err(err) if !err.is_transient() => {
                    return Err(PublishError::Rejected {
                        destination: self.destination.clone(),
                        source: err,
                    });
                }
                Err(err) if attempt >= max_attempts => {
                    return Err(PublishError::Failed {
                        destination: self.destination.clone(),
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => {
                    warn!(
                        destination = %self.destination,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Publish failed; retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl Publisher for MessagePublisher {
    async fn publish(&self, message: &dyn Message) -> Result<String, PublishError> {
        let body = self.registry.serialize(message)?;
        self.send(body).await
    }
}

impl std::fmt::Debug for MessagePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePublisher")
            .field("destination", &self.destination)
            .field("reattempts", &self.reattempts)
            .field("backoff", &self.backoff)
            .finish()
    }
}
