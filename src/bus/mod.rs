//! Message bus: publishers and subscription groups for one service.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  MessageBus (per service)                    │
//! │  - publish() / start() / stop() / interrogate()             │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                      │
//!          ▼                                      ▼
//! ┌──────────────────────┐          ┌──────────────────────────────┐
//! │  MessagePublisher    │          │  SubscriptionGroup (1..n)    │
//! │  one per msg type    │          │  readers → buffer → workers  │
//! │  retry on transient  │          │  → MiddlewareChain → handler │
//! └──────────────────────┘          └──────────────────────────────┘
//!          │                                      │
//!          ▼                                      ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              QueueClient (injected transport)                │
//! │   InMemoryTransport (included) / managed queue service      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = SerializationRegistry::new();
//! registry.register_json::<OrderAccepted>()?;
//!
//! let config = BusConfig::new("eu-west-1", "orders").with_publisher(PublisherConfig::new(
//!     "OrderAccepted",
//!     Destination::Topic("order-accepted".into()),
//! ));
//! let mut bus = MessageBus::new(config, Arc::new(transport), registry)?
//!     .with_monitor(Arc::new(metrics));
//!
//! bus.add_subscription(Subscription::new(
//!     SubscriptionGroupSettings::for_queue("billing"),
//!     HandlerMap::new().with::<OrderAccepted, _>(RaiseInvoice),
//! ))?;
//!
//! let shutdown = CancellationToken::new();
//! bus.start(&shutdown)?;
//! bus.publish(&mut OrderAccepted::new(order_id)).await?;
//! // ...
//! bus.stop().await;
//! ```

mod message_bus;

pub use message_bus::MessageBus;
