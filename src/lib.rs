//! Client-side message bus over managed queues and topics.
//!
//! - [`Message`] / [`Envelope`]: the message model, usually via `#[derive(Message)]`
//! - [`SerializationRegistry`]: wire type name → codec
//! - [`HandlerMap`]: message type → handler
//! - [`MiddlewareChain`]: behaviors wrapped around handler invocation
//! - [`SubscriptionGroup`]: read → buffer → dispatch scheduler with backpressure
//! - [`MessagePublisher`]: send with constant-backoff retry
//! - [`MessageBus`]: ties the above together over an injected [`QueueClient`]

// Lets `#[derive(Message)]` expand to `sourced_bus::...` paths inside this crate.
extern crate self as sourced_bus;

pub mod bus;
pub mod config;
pub mod handler;
pub mod interrogation;
pub mod logging;
pub mod message;
pub mod middleware;
pub mod monitor;
pub mod publish;
pub mod redrive;
pub mod serialization;
pub mod subscription;
pub mod transport;

pub use bus::MessageBus;
pub use config::{BusConfig, ConfigError, PublisherConfig, QueueDefaults};
pub use handler::{Handler, HandlerError, HandlerMap};
pub use interrogation::{
    InterrogationResult, PublisherDescriptor, SubscriberDescriptor, SubscriptionGroupDescriptor,
};
pub use logging::init_tracing;
pub use message::{Envelope, Message};
pub use middleware::{
    BackoffMiddleware, DispatchError, ExponentialBackoffStrategy, LoggingMiddleware,
    MessageBackoffStrategy, Middleware, MiddlewareChain, MonitoringMiddleware, Next,
    PostProcessingMiddleware,
};
pub use monitor::{MessageMonitor, MonitorGuard, NullMonitor};
pub use publish::{MessagePublisher, PublishError, Publisher};
pub use redrive::{RedriveError, RedrivePolicy};
pub use serialization::{JsonCodec, MessageCodec, SerializationError, SerializationRegistry};
pub use subscription::{
    GroupState, HandleMessageContext, MessageDeleter, Multiplexer, Subscription,
    SubscriptionError, SubscriptionGroup, SubscriptionGroupSettings,
};
pub use transport::{Destination, InMemoryTransport, QueueClient, RawMessage, TransportError};

pub use sourced_bus_macros::Message;

// Re-exported for handler and middleware implementations.
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
