//! Envelope fields shared by every message.

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity, timing and provenance carried by every message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    /// Globally unique identifier, generated at construction.
    pub id: Uuid,
    /// Creation instant (UTC).
    pub time_stamp: DateTime<Utc>,
    /// Creation instant with the producer's local offset.
    pub time_stamp_with_offset: DateTime<FixedOffset>,
    /// Name of the producing service.
    pub raising_component: Option<String>,
    pub version: Option<String>,
    pub source_ip: Option<String>,
    pub tenant: Option<String>,
    /// Correlation / grouping key.
    pub conversation: Option<String>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    /// Create an envelope with a fresh id and the current time.
    pub fn new() -> Self {
        let now = Local::now();
        Self {
            id: Uuid::new_v4(),
            time_stamp: now.with_timezone(&Utc),
            time_stamp_with_offset: now.fixed_offset(),
            raising_component: None,
            version: None,
            source_ip: None,
            tenant: None,
            conversation: None,
        }
    }

    pub fn with_conversation(mut self, conversation: impl Into<String>) -> Self {
        self.conversation = Some(conversation.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_raising_component(mut self, component: impl Into<String>) -> Self {
        self.raising_component = Some(component.into());
        self
    }

    pub fn with_source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = Some(ip.into());
        self
    }
}
