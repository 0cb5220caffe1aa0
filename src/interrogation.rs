//! Read-only topology snapshot of a bus.
//!
//! Produced on demand by [`MessageBus::interrogate`](crate::MessageBus::interrogate)
//! for documentation and diagnostics. Serializes to JSON:
//!
//! ```text
//! {
//!   "regions": ["eu-west-1"],
//!   "subscribers": [{ "message_type": "OrderAccepted", "queue": "billing", ... }],
//!   "publishers": [{ "message_type": "OrderAccepted", "destination": { ... } }],
//!   "subscription_groups": [{ "settings": { ... }, "state": "Running", ... }]
//! }
//! ```

use serde::Serialize;

use crate::redrive::RedrivePolicy;
use crate::subscription::{GroupState, SubscriptionGroupSettings};
use crate::transport::Destination;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterrogationResult {
    pub regions: Vec<String>,
    pub subscribers: Vec<SubscriberDescriptor>,
    pub publishers: Vec<PublisherDescriptor>,
    pub subscription_groups: Vec<SubscriptionGroupDescriptor>,
}

/// One handled message type on one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberDescriptor {
    pub message_type: String,
    pub queue: String,
    pub group: String,
    pub handler: String,
    /// `None` when error queues are opted out.
    pub redrive_policy: Option<RedrivePolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublisherDescriptor {
    pub message_type: String,
    pub destination: Destination,
    pub publish_failure_reattempts: u32,
    pub publish_failure_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionGroupDescriptor {
    pub settings: SubscriptionGroupSettings,
    pub state: GroupState,
    /// Middleware names, outermost first.
    pub middleware: Vec<String>,
}
