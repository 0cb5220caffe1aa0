//! In-memory transport for testing and single-process scenarios.
//!
//! Behaves like a managed queue service closely enough to exercise the bus:
//! - Received messages stay on the queue, invisible, until deleted or until
//!   their visibility timeout lapses
//! - Each receive gets a fresh receipt handle and bumps the receive count
//! - Queues carrying a redrive policy move exhausted messages to their
//!   dead-letter queue on receive
//! - Topics fan out to every subscribed queue
//!
//! ## Example
//!
//! ```ignore
//! use sourced_bus::transport::{Destination, InMemoryTransport, QueueClient};
//!
//! let transport = InMemoryTransport::new();
//! transport.create_queue("orders");
//!
//! transport.send(&Destination::Queue("orders".into()), "{}".into()).await?;
//! let received = transport.poll("orders", 10, Duration::ZERO).await?;
//! transport.delete("orders", &received[0].receipt_handle).await?;
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    Destination, QueueClient, RawMessage, TransportError, REDRIVE_POLICY_ATTRIBUTE,
};
use crate::redrive::RedrivePolicy;

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug)]
struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
    visible_at: Instant,
    receipt_handle: Option<String>,
}

#[derive(Debug)]
struct QueueState {
    messages: VecDeque<StoredMessage>,
    visibility_timeout: Duration,
    attributes: HashMap<String, String>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            attributes: HashMap::new(),
        }
    }

    fn push(&mut self, message_id: String, body: String) {
        self.messages.push_back(StoredMessage {
            message_id,
            body,
            receive_count: 0,
            visible_at: Instant::now(),
            receipt_handle: None,
        });
    }

    fn redrive_policy(&self, queue: &str) -> Option<RedrivePolicy> {
        let token = self.attributes.get(REDRIVE_POLICY_ATTRIBUTE)?;
        match RedrivePolicy::parse(token) {
            Ok(policy) => Some(policy),
            Err(err) => {
                warn!(queue, error = %err, "Ignoring unreadable redrive policy");
                None
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    queues: HashMap<String, QueueState>,
    topics: HashMap<String, Vec<String>>,
    deleted: Vec<String>,
    send_attempts: usize,
    injected_send_failures: VecDeque<TransportError>,
    injected_poll_failures: VecDeque<TransportError>,
}

/// In-memory queue/topic service.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<State>>,
}

impl InMemoryTransport {
    /// Create an empty transport with no queues or topics.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a queue (no-op if it already exists).
    pub fn create_queue(&self, name: &str) {
        self.state()
            .queues
            .entry(name.to_string())
            .or_insert_with(QueueState::new);
    }

    /// Create a queue with a redrive policy, creating its dead-letter queue too.
    pub fn create_queue_with_redrive(&self, name: &str, policy: &RedrivePolicy) {
        let mut state = self.state();
        state
            .queues
            .entry(policy.dead_letter_queue.clone())
            .or_insert_with(QueueState::new);
        state
            .queues
            .entry(name.to_string())
            .or_insert_with(QueueState::new)
            .attributes
            .insert(REDRIVE_POLICY_ATTRIBUTE.to_string(), policy.to_wire());
    }

    /// Set how long received messages stay invisible.
    pub fn set_visibility_timeout(&self, queue: &str, timeout: Duration) {
        if let Some(q) = self.state().queues.get_mut(queue) {
            q.visibility_timeout = timeout;
        }
    }

    /// Read a queue attribute.
    pub fn queue_attribute(&self, queue: &str, key: &str) -> Option<String> {
        self.state()
            .queues
            .get(queue)
            .and_then(|q| q.attributes.get(key).cloned())
    }

    /// Create a topic (no-op if it already exists).
    pub fn create_topic(&self, name: &str) {
        self.state().topics.entry(name.to_string()).or_default();
    }

    /// Subscribe a queue to a topic, creating both if needed.
    pub fn subscribe(&self, topic: &str, queue: &str) {
        self.create_queue(queue);
        let mut state = self.state();
        let subscribers = state.topics.entry(topic.to_string()).or_default();
        if !subscribers.iter().any(|q| q == queue) {
            subscribers.push(queue.to_string());
        }
    }

    /// Make the next `count` sends fail with `error`.
    pub fn fail_next_sends(&self, count: usize, error: TransportError) {
        let mut state = self.state();
        for _ in 0..count {
            state.injected_send_failures.push_back(error.clone());
        }
    }

    /// Make the next `count` polls fail with `error`.
    pub fn fail_next_polls(&self, count: usize, error: TransportError) {
        let mut state = self.state();
        for _ in 0..count {
            state.injected_poll_failures.push_back(error.clone());
        }
    }

    /// Total number of send calls, failed ones included.
    pub fn send_attempts(&self) -> usize {
        self.state().send_attempts
    }

    /// Total messages on a queue, visible or not.
    pub fn len(&self, queue: &str) -> usize {
        self.state()
            .queues
            .get(queue)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Messages currently available to receive.
    pub fn visible_len(&self, queue: &str) -> usize {
        let now = Instant::now();
        self.state()
            .queues
            .get(queue)
            .map(|q| q.messages.iter().filter(|m| m.visible_at <= now).count())
            .unwrap_or(0)
    }

    /// Messages received and not yet deleted or made visible again.
    pub fn in_flight_len(&self, queue: &str) -> usize {
        self.len(queue) - self.visible_len(queue)
    }

    /// Bodies of all messages on a queue, in order.
    pub fn bodies(&self, queue: &str) -> Vec<String> {
        self.state()
            .queues
            .get(queue)
            .map(|q| q.messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Ids of deleted messages, in deletion order.
    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    /// Make every message on a queue visible immediately.
    pub fn expire_visibility(&self, queue: &str) {
        let now = Instant::now();
        if let Some(q) = self.state().queues.get_mut(queue) {
            for message in q.messages.iter_mut() {
                message.visible_at = now;
                message.receipt_handle = None;
            }
        }
    }

    fn try_receive(&self, queue: &str, max_messages: u32) -> Result<Vec<RawMessage>, TransportError> {
        let mut state = self.state();
        let now = Instant::now();

        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;
        let policy = q.redrive_policy(queue);
        let visibility_timeout = q.visibility_timeout;

        let mut received = Vec::new();
        let mut dead_lettered = Vec::new();
        let mut index = 0;
        while index < q.messages.len() && received.len() < max_messages as usize {
            let message = &mut q.messages[index];
            if message.visible_at > now {
                index += 1;
                continue;
            }

            message.receive_count += 1;
            if let Some(policy) = &policy {
                if policy.is_exhausted(message.receive_count) {
                    if let Some(message) = q.messages.remove(index) {
                        dead_lettered.push(message);
                    }
                    continue;
                }
            }

            let receipt_handle = Uuid::new_v4().to_string();
            message.receipt_handle = Some(receipt_handle.clone());
            message.visible_at = now + visibility_timeout;
            received.push(RawMessage {
                message_id: message.message_id.clone(),
                receipt_handle,
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
            index += 1;
        }

        if let Some(policy) = policy {
            if !dead_lettered.is_empty() {
                let dlq = state
                    .queues
                    .entry(policy.dead_letter_queue.clone())
                    .or_insert_with(QueueState::new);
                for message in dead_lettered {
                    debug!(
                        queue,
                        dead_letter_queue = %policy.dead_letter_queue,
                        message_id = %message.message_id,
                        receive_count = message.receive_count,
                        "Moved message to dead letter queue"
                    );
                    dlq.push(message.message_id, message.body);
                }
            }
        }

        Ok(received)
    }
}

#[async_trait]
impl QueueClient for InMemoryTransport {
    async fn poll(
        &self,
        queue: &str,
        max_messages: u32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let injected = self.state().injected_poll_failures.pop_front();
        if let Some(err) = injected {
            return Err(err);
        }

        let deadline = Instant::now() + wait_time;
        loop {
            let received = self.try_receive(queue, max_messages)?;
            if !received.is_empty() || Instant::now() >= deadline {
                return Ok(received);
            }
            // Small sleep to avoid busy-waiting
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn send(
        &self,
        destination: &Destination,
        body: String,
    ) -> Result<String, TransportError> {
        let mut state = self.state();
        state.send_attempts += 1;
        if let Some(err) = state.injected_send_failures.pop_front() {
            return Err(err);
        }

        let message_id = Uuid::new_v4().to_string();
        match destination {
            Destination::Queue(name) => {
                state
                    .queues
                    .get_mut(name)
                    .ok_or_else(|| TransportError::QueueNotFound(name.clone()))?
                    .push(message_id.clone(), body);
            }
            Destination::Topic(name) => {
                let subscribers = state
                    .topics
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TransportError::TopicNotFound(name.clone()))?;
                for queue in subscribers {
                    if let Some(q) = state.queues.get_mut(&queue) {
                        q.push(message_id.clone(), body.clone());
                    }
                }
            }
        }
        Ok(message_id)
    }

    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<(), TransportError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;
        let position = q
            .messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| TransportError::MessageNotFound {
                queue: queue.to_string(),
                receipt_handle: receipt_handle.to_string(),
            })?;
        if let Some(message) = q.messages.remove(position) {
            state.deleted.push(message.message_id);
        }
        Ok(())
    }

    async fn change_visibility(
        &self,
        queue: &str,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let mut state = self.state();
        let message = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?
            .messages
            .iter_mut()
            .find(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| TransportError::MessageNotFound {
                queue: queue.to_string(),
                receipt_handle: receipt_handle.to_string(),
            })?;
        message.visible_at = Instant::now() + timeout;
        Ok(())
    }
}
