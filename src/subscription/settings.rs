use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Largest batch a single poll may request.
pub const MAX_PREFETCH: u32 = 10;
/// Longest long-poll wait a transport accepts.
pub const MAX_RECEIVE_WAIT_TIME: Duration = Duration::from_secs(20);

/// Throughput policy and source queues of one subscription group.
///
/// Fixed once the group is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionGroupSettings {
    pub name: String,
    pub queues: Vec<String>,
    /// Dispatch workers, i.e. the bound on in-flight handler invocations.
    pub concurrency_limit: usize,
    /// Decoded messages held between readers and workers.
    pub buffer_capacity: usize,
    /// Messages requested per poll.
    pub prefetch: u32,
    /// Long-poll wait per poll.
    pub receive_wait_time: Duration,
    /// Pause after a failed poll before polling again.
    pub poll_error_backoff: Duration,
}

impl Default for SubscriptionGroupSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            queues: Vec::new(),
            concurrency_limit: 8,
            buffer_capacity: 10,
            prefetch: 10,
            receive_wait_time: MAX_RECEIVE_WAIT_TIME,
            poll_error_backoff: Duration::from_secs(1),
        }
    }
}

impl SubscriptionGroupSettings {
    /// Settings for a group reading from a single queue of the same name.
    pub fn for_queue(queue: impl Into<String>) -> Self {
        let queue = queue.into();
        Self {
            name: queue.clone(),
            queues: vec![queue],
            ..Self::default()
        }
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queues.push(queue.into());
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_prefetch(mut self, prefetch: u32) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn with_receive_wait_time(mut self, wait: Duration) -> Self {
        self.receive_wait_time = wait;
        self
    }

    pub fn with_poll_error_backoff(mut self, backoff: Duration) -> Self {
        self.poll_error_backoff = backoff;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::BlankGroupName);
        }
        if self.queues.is_empty() {
            return Err(ConfigError::MissingQueue(self.name.clone()));
        }
        if self.queues.iter().any(|q| q.trim().is_empty()) {
            return Err(ConfigError::BlankQueueName(self.name.clone()));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.queues.iter().find(|q| !seen.insert(q.as_str())) {
            return Err(self.invalid("queues", format!("lists {duplicate} more than once")));
        }
        if self.concurrency_limit < 1 {
            return Err(self.invalid("concurrency_limit", "must be at least 1"));
        }
        if self.buffer_capacity < 1 {
            return Err(self.invalid("buffer_capacity", "must be at least 1"));
        }
        if !(1..=MAX_PREFETCH).contains(&self.prefetch) {
            return Err(self.invalid("prefetch", format!("must be in 1..={MAX_PREFETCH}")));
        }
        if self.receive_wait_time > MAX_RECEIVE_WAIT_TIME {
            return Err(self.invalid("receive_wait_time", "must not exceed 20s"));
        }
        Ok(())
    }

    fn invalid(&self, setting: &'static str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidSetting {
            group: self.name.clone(),
            setting,
            reason: reason.into(),
        }
    }
}
