use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{BusConfig, ConfigError};
use crate::interrogation::{
    InterrogationResult, PublisherDescriptor, SubscriberDescriptor, SubscriptionGroupDescriptor,
};
use crate::message::Message;
use crate::monitor::{MessageMonitor, MonitorGuard};
use crate::publish::{MessagePublisher, PublishError, Publisher};
use crate::serialization::SerializationRegistry;
use crate::subscription::{
    GroupState, Subscription, SubscriptionError, SubscriptionGroup,
};
use crate::transport::QueueClient;

/// The bus for one service: validated configuration, publishers keyed by
/// message type and independent subscription groups.
///
/// Configuration is checked when the bus is built and when each
/// subscription is added; nothing is started until [`MessageBus::start`].
pub struct MessageBus {
    config: BusConfig,
    client: Arc<dyn QueueClient>,
    registry: Arc<SerializationRegistry>,
    monitor: MonitorGuard,
    publishers: HashMap<String, MessagePublisher>,
    groups: Vec<Arc<SubscriptionGroup>>,
    subscribers: Vec<SubscriberDescriptor>,
}

impl MessageBus {
    /// Validate `config` and build the bus around an injected transport.
    pub fn new(
        config: BusConfig,
        client: Arc<dyn QueueClient>,
        registry: SerializationRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(registry);

        let mut publishers = HashMap::new();
        for publisher in &config.publishers {
            if !registry.contains(&publisher.message_type) {
                return Err(ConfigError::UnregisteredMessageType {
                    context: format!("publisher to {}", publisher.destination),
                    message_type: publisher.message_type.clone(),
                });
            }
            publishers.insert(
                publisher.message_type.clone(),
                MessagePublisher::new(publisher, client.clone(), registry.clone()),
            );
        }

        Ok(Self {
            config,
            client,
            registry,
            monitor: MonitorGuard::default(),
            publishers,
            groups: Vec::new(),
            subscribers: Vec::new(),
        })
    }

    /// Report dispatch outcomes to `monitor`.
    ///
    /// Applies to subscriptions added after this call.
    pub fn with_monitor(mut self, monitor: Arc<dyn MessageMonitor>) -> Self {
        self.monitor = MonitorGuard::new(monitor);
        self
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn registry(&self) -> &SerializationRegistry {
        &self.registry
    }

    /// Validate a subscription and build its group.
    pub fn add_subscription(&mut self, subscription: Subscription) -> Result<(), ConfigError> {
        let settings = &subscription.settings;
        settings.validate()?;
        if self.group(&settings.name).is_some() {
            return Err(ConfigError::DuplicateGroup(settings.name.clone()));
        }

        let mut subscribers = Vec::new();
        for queue in &settings.queues {
            let redrive_policy = self.config.queue_defaults.redrive_policy(queue)?;
            for (message_type, handler) in subscription.handlers.registrations() {
                if !self.registry.contains(message_type) {
                    return Err(ConfigError::UnregisteredMessageType {
                        context: format!("subscription group {}", settings.name),
                        message_type: message_type.to_string(),
                    });
                }
                subscribers.push(SubscriberDescriptor {
                    message_type: message_type.to_string(),
                    queue: queue.clone(),
                    group: settings.name.clone(),
                    handler: handler.to_string(),
                    redrive_policy: redrive_policy.clone(),
                });
            }
        }

        info!(
            group = %settings.name,
            queues = ?settings.queues,
            message_types = subscription.handlers.len(),
            "Added subscription group"
        );
        self.subscribers.extend(subscribers);
        self.groups.push(Arc::new(SubscriptionGroup::new(
            subscription,
            self.client.clone(),
            self.registry.clone(),
            self.monitor.clone(),
        )));
        Ok(())
    }

    pub fn groups(&self) -> &[Arc<SubscriptionGroup>] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Arc<SubscriptionGroup>> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn publisher(&self, message_type: &str) -> Option<&MessagePublisher> {
        self.publishers.get(message_type)
    }

    /// Stamp the envelope and publish through the publisher for the
    /// message's type.
    ///
    /// Fields the message already carries are kept; unset raising component,
    /// tenant and version are filled from the bus configuration.
    pub async fn publish(&self, message: &mut dyn Message) -> Result<String, PublishError> {
        let publisher = self
            .publishers
            .get(message.message_type())
            .ok_or_else(|| PublishError::NoPublisher(message.message_type().to_string()))?;

        let envelope = message.envelope_mut();
        if envelope.raising_component.is_none() {
            envelope.raising_component = Some(self.config.raising_component.clone());
        }
        if envelope.tenant.is_none() {
            envelope.tenant = self.config.tenant.clone();
        }
        if envelope.version.is_none() {
            envelope.version = self.config.version.clone();
        }

        publisher.publish(&*message).await
    }

    /// Start every subscription group. Groups stop when `shutdown` is
    /// cancelled or [`MessageBus::stop`] is called.
    pub fn start(&self, shutdown: &CancellationToken) -> Result<(), SubscriptionError> {
        if let Some(running) = self.groups.iter().find(|g| g.state() != GroupState::Stopped) {
            return Err(SubscriptionError::AlreadyStarted {
                group: running.name().to_string(),
                state: running.state(),
            });
        }
        for group in &self.groups {
            group.start(shutdown)?;
        }
        info!(groups = self.groups.len(), "Message bus started");
        Ok(())
    }

    /// Stop every group, waiting for in-flight dispatches to finish.
    pub async fn stop(&self) {
        futures::future::join_all(self.groups.iter().map(|group| group.stop())).await;
        info!("Message bus stopped");
    }

    /// Point-in-time snapshot of the bus topology.
    pub fn interrogate(&self) -> InterrogationResult {
        let mut publishers: Vec<_> = self
            .config
            .publishers
            .iter()
            .map(|p| PublisherDescriptor {
                message_type: p.message_type.clone(),
                destination: p.destination.clone(),
                publish_failure_reattempts: p.publish_failure_reattempts,
                publish_failure_backoff_ms: u64::try_from(p.publish_failure_backoff.as_millis())
                    .unwrap_or(u64::MAX),
            })
            .collect();
        publishers.sort_by(|a, b| a.message_type.cmp(&b.message_type));

        InterrogationResult {
            regions: self.config.regions.clone(),
            subscribers: self.subscribers.clone(),
            publishers,
            subscription_groups: self
                .groups
                .iter()
                .map(|group| SubscriptionGroupDescriptor {
                    settings: group.settings().clone(),
                    state: group.state(),
                    middleware: group
                        .chain()
                        .names()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("groups", &self.groups)
            .finish()
    }
}
