use std::sync::Arc;

use sourced_bus::{
    BackoffMiddleware, Destination, GroupState, HandlerMap, InMemoryTransport, MessageBus,
    RedrivePolicy, Subscription,
};

use crate::support::*;

fn bus(transport: &InMemoryTransport) -> MessageBus {
    let mut bus = MessageBus::new(config(), Arc::new(transport.clone()), registry()).unwrap();
    bus.add_subscription(
        Subscription::new(
            billing_settings(),
            HandlerMap::new().with::<OrderAccepted, _>(Scripted::new(Behavior::Succeed)),
        )
        .with_middleware(Arc::new(BackoffMiddleware::default())),
    )
    .unwrap();
    bus
}

#[tokio::test]
async fn snapshot_describes_the_topology() {
    let transport = InMemoryTransport::new();
    transport.create_queue(BILLING);
    let bus = bus(&transport);

    let snapshot = bus.interrogate();
    assert_eq!(snapshot.regions, vec!["eu-west-1".to_string()]);

    assert_eq!(snapshot.publishers.len(), 1);
    assert_eq!(snapshot.publishers[0].message_type, "OrderAccepted");
    assert_eq!(
        snapshot.publishers[0].destination,
        Destination::Topic(ORDER_TOPIC.into())
    );

    assert_eq!(snapshot.subscribers.len(), 1);
    let subscriber = &snapshot.subscribers[0];
    assert_eq!(subscriber.message_type, "OrderAccepted");
    assert_eq!(subscriber.queue, BILLING);
    assert_eq!(subscriber.group, BILLING);
    assert!(subscriber.handler.ends_with("Scripted"));
    assert_eq!(
        subscriber.redrive_policy,
        Some(RedrivePolicy::new(5, "billing_error").unwrap())
    );

    let group = &snapshot.subscription_groups[0];
    assert_eq!(group.settings, billing_settings());
    assert_eq!(group.state, GroupState::Stopped);
    assert_eq!(
        group.middleware,
        vec!["logging", "monitoring", "post-processing", "backoff"]
    );

    bus.start(&sourced_bus::CancellationToken::new()).unwrap();
    assert_eq!(
        bus.interrogate().subscription_groups[0].state,
        GroupState::Running
    );
    bus.stop().await;
}

#[test]
fn snapshot_serializes_to_json() {
    let transport = InMemoryTransport::new();
    let json = serde_json::to_value(bus(&transport).interrogate()).unwrap();

    assert_eq!(json["regions"][0], "eu-west-1");
    assert_eq!(json["publishers"][0]["destination"]["kind"], "topic");
    assert_eq!(
        json["subscribers"][0]["redrive_policy"]["deadLetterTargetArn"],
        "billing_error"
    );
    assert_eq!(json["subscription_groups"][0]["state"], "Stopped");
    assert_eq!(json["subscription_groups"][0]["settings"]["queues"][0], BILLING);
}

#[test]
fn opting_out_of_error_queues_removes_the_policy() {
    let transport = InMemoryTransport::new();
    let config = config().with_queue_defaults(
        sourced_bus::QueueDefaults::default().with_error_queue_opt_out(true),
    );
    let mut bus = MessageBus::new(config, Arc::new(transport), registry()).unwrap();
    bus.add_subscription(Subscription::new(
        billing_settings(),
        HandlerMap::new().with::<OrderAccepted, _>(Scripted::new(Behavior::Succeed)),
    ))
    .unwrap();

    assert_eq!(bus.interrogate().subscribers[0].redrive_policy, None);
}
