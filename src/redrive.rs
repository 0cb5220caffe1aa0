//! Redrive policy: how many receives precede dead-lettering.
//!
//! The policy travels as a single string token, the JSON object queues store
//! as an attribute:
//!
//! ```text
//! {"maxReceiveCount":5,"deadLetterTargetArn":"orders_error"}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RedriveError {
    #[error("malformed redrive policy: {0}")]
    Malformed(String),

    #[error("maximum receives must be at least 1")]
    InvalidMaximumReceives,

    #[error("dead letter queue must not be empty")]
    MissingDeadLetterQueue,
}

/// Rule for moving repeatedly failing messages to a dead-letter destination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RedrivePolicy {
    #[serde(rename = "maxReceiveCount")]
    pub maximum_receives: u32,
    #[serde(rename = "deadLetterTargetArn")]
    pub dead_letter_queue: String,
}

impl RedrivePolicy {
    pub fn new(
        maximum_receives: u32,
        dead_letter_queue: impl Into<String>,
    ) -> Result<Self, RedriveError> {
        let policy = Self {
            maximum_receives,
            dead_letter_queue: dead_letter_queue.into(),
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), RedriveError> {
        if self.maximum_receives < 1 {
            return Err(RedriveError::InvalidMaximumReceives);
        }
        if self.dead_letter_queue.trim().is_empty() {
            return Err(RedriveError::MissingDeadLetterQueue);
        }
        Ok(())
    }

    /// Serialize to the wire token.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            serde_json::json!({
                "maxReceiveCount": self.maximum_receives,
                "deadLetterTargetArn": self.dead_letter_queue,
            })
            .to_string()
        })
    }

    /// Parse the wire token.
    pub fn parse(token: &str) -> Result<Self, RedriveError> {
        let policy: RedrivePolicy =
            serde_json::from_str(token).map_err(|e| RedriveError::Malformed(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Whether a message received `receive_count` times is exhausted.
    pub fn is_exhausted(&self, receive_count: u32) -> bool {
        receive_count > self.maximum_receives
    }
}

impl fmt::Display for RedrivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl FromStr for RedrivePolicy {
    type Err = RedriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
