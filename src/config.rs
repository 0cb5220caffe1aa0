//! Bus configuration.
//!
//! Plain serde structs, validated eagerly. [`MessageBus::new`](crate::MessageBus::new)
//! refuses to build a bus from a configuration that fails [`BusConfig::validate`],
//! so no partially configured bus is ever started.
//!
//! ```ignore
//! let config: BusConfig = serde_json::from_str(r#"{
//!     "regions": ["eu-west-1"],
//!     "raising_component": "orders",
//!     "publishers": [
//!         { "message_type": "OrderAccepted",
//!           "destination": { "kind": "topic", "name": "order-accepted" } }
//!     ]
//! }"#)?;
//! config.validate()?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::redrive::{RedriveError, RedrivePolicy};
use crate::transport::Destination;

pub const MIN_RETENTION: Duration = Duration::from_secs(60);
pub const MAX_RETENTION: Duration = Duration::from_secs(14 * 24 * 60 * 60);
pub const MAX_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

/// Suffix of the dead-letter queue derived for a subscribed queue.
pub const ERROR_QUEUE_SUFFIX: &str = "_error";

/// Errors detected while validating configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one region is required")]
    MissingRegion,

    #[error("region names must not be blank")]
    BlankRegion,

    #[error("raising component is required")]
    MissingRaisingComponent,

    #[error("message retention {actual:?} is outside {min:?}..={max:?}")]
    InvalidRetention {
        actual: Duration,
        min: Duration,
        max: Duration,
    },

    #[error("visibility timeout {0:?} exceeds 12 hours")]
    InvalidVisibilityTimeout(Duration),

    #[error(transparent)]
    Redrive(#[from] RedriveError),

    #[error("publisher for {0} has no destination")]
    MissingDestination(String),

    #[error("more than one publisher configured for {0}")]
    DuplicatePublisher(String),

    #[error("{context}: message type {message_type} has no registered serializer")]
    UnregisteredMessageType {
        context: String,
        message_type: String,
    },

    #[error("subscription group {0} has no queues")]
    MissingQueue(String),

    #[error("subscription group {0} has a blank queue name")]
    BlankQueueName(String),

    #[error("subscription group name must not be blank")]
    BlankGroupName,

    #[error("subscription group {0} is already configured")]
    DuplicateGroup(String),

    #[error("subscription group {group}: {setting} {reason}")]
    InvalidSetting {
        group: String,
        setting: &'static str,
        reason: String,
    },
}

/// Defaults applied to every subscribed queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueDefaults {
    pub message_retention: Duration,
    pub visibility_timeout: Duration,
    /// Receives before a message is moved to the error queue.
    pub max_receives: u32,
    /// Skip the `<queue>_error` dead-letter queue entirely.
    pub error_queue_opt_out: bool,
}

impl Default for QueueDefaults {
    fn default() -> Self {
        Self {
            message_retention: Duration::from_secs(4 * 24 * 60 * 60),
            visibility_timeout: Duration::from_secs(30),
            max_receives: 5,
            error_queue_opt_out: false,
        }
    }
}

impl QueueDefaults {
    pub fn with_message_retention(mut self, retention: Duration) -> Self {
        self.message_retention = retention;
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_max_receives(mut self, max_receives: u32) -> Self {
        self.max_receives = max_receives;
        self
    }

    pub fn with_error_queue_opt_out(mut self, opt_out: bool) -> Self {
        self.error_queue_opt_out = opt_out;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.message_retention < MIN_RETENTION || self.message_retention > MAX_RETENTION {
            return Err(ConfigError::InvalidRetention {
                actual: self.message_retention,
                min: MIN_RETENTION,
                max: MAX_RETENTION,
            });
        }
        if self.visibility_timeout > MAX_VISIBILITY_TIMEOUT {
            return Err(ConfigError::InvalidVisibilityTimeout(self.visibility_timeout));
        }
        if self.max_receives < 1 {
            return Err(RedriveError::InvalidMaximumReceives.into());
        }
        Ok(())
    }

    /// Redrive policy for `queue`, or `None` when error queues are opted out.
    pub fn redrive_policy(&self, queue: &str) -> Result<Option<RedrivePolicy>, ConfigError> {
        if self.error_queue_opt_out {
            return Ok(None);
        }
        let policy = RedrivePolicy::new(self.max_receives, format!("{queue}{ERROR_QUEUE_SUFFIX}"))?;
        Ok(Some(policy))
    }
}

/// Where messages of one type are published, and how hard to try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub message_type: String,
    pub destination: Destination,
    /// Retries after the first failed send; total attempts are this plus one.
    #[serde(default = "PublisherConfig::default_reattempts")]
    pub publish_failure_reattempts: u32,
    /// Constant delay between attempts.
    #[serde(default = "PublisherConfig::default_backoff")]
    pub publish_failure_backoff: Duration,
}

impl PublisherConfig {
    pub const DEFAULT_REATTEMPTS: u32 = 3;
    pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

    pub fn new(message_type: impl Into<String>, destination: Destination) -> Self {
        Self {
            message_type: message_type.into(),
            destination,
            publish_failure_reattempts: Self::DEFAULT_REATTEMPTS,
            publish_failure_backoff: Self::DEFAULT_BACKOFF,
        }
    }

    fn default_reattempts() -> u32 {
        Self::DEFAULT_REATTEMPTS
    }

    fn default_backoff() -> Duration {
        Self::DEFAULT_BACKOFF
    }

    pub fn with_reattempts(mut self, reattempts: u32) -> Self {
        self.publish_failure_reattempts = reattempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.publish_failure_backoff = backoff;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination.name().trim().is_empty() {
            return Err(ConfigError::MissingDestination(self.message_type.clone()));
        }
        Ok(())
    }
}

/// Top-level bus configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub regions: Vec<String>,
    /// Stamped on outgoing messages that do not name their producer.
    pub raising_component: String,
    pub tenant: Option<String>,
    pub version: Option<String>,
    pub queue_defaults: QueueDefaults,
    pub publishers: Vec<PublisherConfig>,
}

impl BusConfig {
    pub fn new(region: impl Into<String>, raising_component: impl Into<String>) -> Self {
        Self {
            regions: vec![region.into()],
            raising_component: raising_component.into(),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(region.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_queue_defaults(mut self, defaults: QueueDefaults) -> Self {
        self.queue_defaults = defaults;
        self
    }

    pub fn with_publisher(mut self, publisher: PublisherConfig) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::MissingRegion);
        }
        if self.regions.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::BlankRegion);
        }
        if self.raising_component.trim().is_empty() {
            return Err(ConfigError::MissingRaisingComponent);
        }
        self.queue_defaults.validate()?;

        for (index, publisher) in self.publishers.iter().enumerate() {
            publisher.validate()?;
            if self.publishers[..index]
                .iter()
                .any(|p| p.message_type == publisher.message_type)
            {
                return Err(ConfigError::DuplicatePublisher(publisher.message_type.clone()));
            }
        }
        Ok(())
    }
}
