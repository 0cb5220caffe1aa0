use std::sync::Arc;
use std::time::Duration;

use sourced_bus::{
    BusConfig, Destination, HandlerMap, InMemoryTransport, Message, MessageBus, PublishError,
    PublisherConfig, Subscription, SubscriptionGroupSettings, TransportError,
};
use tokio::time::Instant;

use crate::support::*;

#[tokio::test]
async fn published_messages_fan_out_to_every_subscribed_queue() {
    let transport = InMemoryTransport::new();
    transport.subscribe(ORDER_TOPIC, BILLING);
    transport.subscribe(ORDER_TOPIC, SHIPPING);

    let billing = Scripted::new(Behavior::Succeed);
    let shipping = Scripted::new(Behavior::Succeed);
    let (bus, _shutdown) = start_bus(
        &transport,
        Arc::new(CountingMonitor::default()),
        vec![
            Subscription::new(
                billing_settings(),
                HandlerMap::new().with::<OrderAccepted, _>(billing.clone()),
            ),
            Subscription::new(
                SubscriptionGroupSettings::for_queue(SHIPPING)
                    .with_receive_wait_time(Duration::from_millis(10)),
                HandlerMap::new().with::<OrderAccepted, _>(shipping.clone()),
            ),
        ],
    );

    let mut order = OrderAccepted::new("order-7");
    bus.publish(&mut order).await.unwrap();

    eventually(|| billing.calls() == 1 && shipping.calls() == 1).await;
    eventually(|| transport.deleted().len() == 2).await;
    bus.stop().await;

    for seen in [billing.seen(), shipping.seen()] {
        assert_eq!(seen[0].envelope.id, order.envelope.id);
        assert_eq!(seen[0].unique_key(), "order-7");
        assert_eq!(seen[0].envelope.raising_component.as_deref(), Some("checkout"));
        assert_eq!(seen[0].envelope.tenant.as_deref(), Some("acme"));
    }
}

fn retrying_bus(transport: &InMemoryTransport, reattempts: u32) -> MessageBus {
    transport.create_queue(BILLING);
    let config = BusConfig::new("eu-west-1", "checkout").with_publisher(
        PublisherConfig::new("OrderAccepted", Destination::Queue(BILLING.into()))
            .with_reattempts(reattempts)
            .with_backoff(Duration::from_millis(100)),
    );
    MessageBus::new(config, Arc::new(transport.clone()), registry()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_success() {
    let transport = InMemoryTransport::new();
    let bus = retrying_bus(&transport, 5);
    transport.fail_next_sends(3, TransportError::ConnectionFailed("reset".into()));

    let started = Instant::now();
    bus.publish(&mut OrderAccepted::new("order-1")).await.unwrap();

    assert_eq!(transport.send_attempts(), 4);
    assert_eq!(started.elapsed(), Duration::from_millis(300));
    assert_eq!(transport.len(BILLING), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_to_the_caller() {
    let transport = InMemoryTransport::new();
    let bus = retrying_bus(&transport, 2);
    transport.fail_next_sends(100, TransportError::Throttled);

    let err = bus
        .publish(&mut OrderAccepted::new("order-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Failed { attempts: 3, .. }));
    assert_eq!(transport.send_attempts(), 3);
    assert_eq!(transport.len(BILLING), 0);
}

#[tokio::test]
async fn publishing_an_unconfigured_type_fails() {
    let transport = InMemoryTransport::new();
    let bus = retrying_bus(&transport, 0);

    let mut payment = PaymentFailed {
        envelope: sourced_bus::Envelope::new(),
        reason: "card declined".into(),
    };
    assert!(matches!(
        bus.publish(&mut payment).await,
        Err(PublishError::NoPublisher(_))
    ));
    assert_eq!(transport.send_attempts(), 0);
}
