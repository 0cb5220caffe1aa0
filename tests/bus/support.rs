//! Test domain and instrumented handlers shared by the bus tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sourced_bus::{
    async_trait, BusConfig, CancellationToken, Destination, Envelope, Handler, HandlerError,
    InMemoryTransport, Message, MessageBus, MessageMonitor, PublisherConfig, QueueClient,
    SerializationRegistry, Subscription, SubscriptionGroupSettings,
};
use tokio::sync::Semaphore;

pub const BILLING: &str = "billing";
pub const SHIPPING: &str = "shipping";
pub const ORDER_TOPIC: &str = "order-accepted";

#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[message(unique_key = order_id)]
pub struct OrderAccepted {
    pub envelope: Envelope,
    pub order_id: String,
}

impl OrderAccepted {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            envelope: Envelope::new(),
            order_id: order_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Message)]
pub struct PaymentFailed {
    pub envelope: Envelope,
    pub reason: String,
}

pub fn registry() -> SerializationRegistry {
    let mut registry = SerializationRegistry::new();
    registry.register_json::<OrderAccepted>().unwrap();
    registry.register_json::<PaymentFailed>().unwrap();
    registry
}

pub fn config() -> BusConfig {
    BusConfig::new("eu-west-1", "checkout")
        .with_tenant("acme")
        .with_publisher(PublisherConfig::new(
            "OrderAccepted",
            Destination::Topic(ORDER_TOPIC.into()),
        ))
}

/// Settings for a group on the billing queue with a short long-poll.
pub fn billing_settings() -> SubscriptionGroupSettings {
    SubscriptionGroupSettings::for_queue(BILLING).with_receive_wait_time(Duration::from_millis(10))
}

/// Create the subscribed queues, build the bus and start it.
pub fn start_bus(
    transport: &InMemoryTransport,
    monitor: Arc<CountingMonitor>,
    subscriptions: Vec<Subscription>,
) -> (MessageBus, CancellationToken) {
    let mut bus = MessageBus::new(config(), Arc::new(transport.clone()), registry())
        .unwrap()
        .with_monitor(monitor);
    for subscription in subscriptions {
        for queue in &subscription.settings.queues {
            transport.create_queue(queue);
        }
        bus.add_subscription(subscription).unwrap();
    }

    let shutdown = CancellationToken::new();
    bus.start(&shutdown).unwrap();
    (bus, shutdown)
}

/// Encode and enqueue messages directly, bypassing any publisher.
pub async fn enqueue(transport: &InMemoryTransport, queue: &str, messages: &[&dyn Message]) {
    let registry = registry();
    transport.create_queue(queue);
    for message in messages {
        let body = registry.serialize(*message).unwrap();
        transport
            .send(&Destination::Queue(queue.to_string()), body)
            .await
            .unwrap();
    }
}

pub async fn enqueue_orders(transport: &InMemoryTransport, queue: &str, count: usize) {
    for i in 0..count {
        enqueue(transport, queue, &[&OrderAccepted::new(format!("order-{i}"))]).await;
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    Error,
    Panic,
}

/// Handler with a fixed outcome that records what it saw.
#[derive(Clone)]
pub struct Scripted {
    behavior: Behavior,
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<OrderAccepted>>>,
}

impl Scripted {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<OrderAccepted> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler<OrderAccepted> for Scripted {
    async fn handle(&self, message: &OrderAccepted) -> Result<bool, HandlerError> {
        self.seen.lock().unwrap().push(message.clone());
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(true),
            Behavior::Fail => Ok(false),
            Behavior::Error => Err(HandlerError::Rejected(format!(
                "cannot bill {}",
                message.order_id
            ))),
            Behavior::Panic => panic!("billing handler crashed on {}", message.order_id),
        }
    }
}

/// Handler that blocks until released, tracking concurrency.
pub struct Gated {
    pub started: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub completed: AtomicUsize,
    release: Semaphore,
}

impl Gated {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            release: Semaphore::new(0),
        })
    }

    /// Let `count` blocked or future invocations finish.
    pub fn release(&self, count: usize) {
        self.release.add_permits(count);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler<OrderAccepted> for Arc<Gated> {
    async fn handle(&self, _message: &OrderAccepted) -> Result<bool, HandlerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.release
            .acquire()
            .await
            .map_err(HandlerError::other)?
            .forget();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// Monitor counting each hook.
#[derive(Default)]
pub struct CountingMonitor {
    pub handled: AtomicUsize,
    pub exceptions: AtomicUsize,
    pub timings: AtomicUsize,
}

impl CountingMonitor {
    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }

    pub fn exceptions(&self) -> usize {
        self.exceptions.load(Ordering::SeqCst)
    }

    pub fn timings(&self) -> usize {
        self.timings.load(Ordering::SeqCst)
    }
}

impl MessageMonitor for CountingMonitor {
    fn handled(&self, _message_type: &str) {
        self.handled.fetch_add(1, Ordering::SeqCst);
    }

    fn handle_exception(&self, _message_type: &str) {
        self.exceptions.fetch_add(1, Ordering::SeqCst);
    }

    fn handle_time(&self, _duration: Duration) {
        self.timings.fetch_add(1, Ordering::SeqCst);
    }
}
