use std::sync::Arc;
use std::time::Duration;

use sourced_bus::{GroupState, HandlerMap, InMemoryTransport, QueueClient, Subscription};

use crate::support::*;

fn billing(handler: Scripted) -> Subscription {
    Subscription::new(
        billing_settings(),
        HandlerMap::new().with::<OrderAccepted, _>(handler),
    )
}

#[tokio::test]
async fn handled_messages_are_deleted_exactly_once() {
    let transport = InMemoryTransport::new();
    let monitor = Arc::new(CountingMonitor::default());
    let handler = Scripted::new(Behavior::Succeed);
    enqueue_orders(&transport, BILLING, 3).await;

    let (bus, _shutdown) = start_bus(&transport, monitor.clone(), vec![billing(handler.clone())]);
    eventually(|| transport.deleted().len() == 3).await;
    bus.stop().await;

    assert_eq!(handler.calls(), 3);
    assert_eq!(transport.len(BILLING), 0);
    assert_eq!(monitor.handled(), 3);
    assert_eq!(monitor.exceptions(), 0);
    assert_eq!(monitor.timings(), 3);

    let mut deleted = transport.deleted();
    deleted.sort();
    deleted.dedup();
    assert_eq!(deleted.len(), 3);
}

#[tokio::test]
async fn unsuccessful_messages_stay_on_the_queue() {
    let transport = InMemoryTransport::new();
    let monitor = Arc::new(CountingMonitor::default());
    let handler = Scripted::new(Behavior::Fail);
    enqueue_orders(&transport, BILLING, 1).await;

    let (bus, _shutdown) = start_bus(&transport, monitor.clone(), vec![billing(handler.clone())]);
    eventually(|| handler.calls() == 1).await;
    eventually(|| monitor.timings() == 1).await;
    bus.stop().await;

    assert!(transport.deleted().is_empty());
    assert_eq!(transport.len(BILLING), 1);
    assert_eq!(monitor.handled(), 0);
    assert_eq!(monitor.exceptions(), 0);
}

#[tokio::test]
async fn handler_errors_and_panics_are_contained() {
    for behavior in [Behavior::Error, Behavior::Panic] {
        let transport = InMemoryTransport::new();
        let monitor = Arc::new(CountingMonitor::default());
        let handler = Scripted::new(behavior);
        enqueue_orders(&transport, BILLING, 2).await;

        let (bus, _shutdown) =
            start_bus(&transport, monitor.clone(), vec![billing(handler.clone())]);
        eventually(|| monitor.exceptions() == 2).await;

        assert_eq!(bus.group(BILLING).unwrap().state(), GroupState::Running);
        bus.stop().await;

        assert_eq!(handler.calls(), 2, "{behavior:?}");
        assert_eq!(monitor.exceptions(), 2, "{behavior:?}");
        assert_eq!(monitor.handled(), 0, "{behavior:?}");
        assert!(transport.deleted().is_empty(), "{behavior:?}");
        assert_eq!(transport.len(BILLING), 2);
    }
}

#[tokio::test]
async fn messages_without_a_handler_are_left_for_redrive() {
    let transport = InMemoryTransport::new();
    let monitor = Arc::new(CountingMonitor::default());
    let handler = Scripted::new(Behavior::Succeed);
    enqueue(
        &transport,
        BILLING,
        &[
            &PaymentFailed {
                envelope: sourced_bus::Envelope::new(),
                reason: "card declined".into(),
            },
            &OrderAccepted::new("order-1"),
        ],
    )
    .await;

    let (bus, _shutdown) = start_bus(&transport, monitor.clone(), vec![billing(handler.clone())]);
    eventually(|| transport.deleted().len() == 1 && monitor.exceptions() == 1).await;
    bus.stop().await;

    assert_eq!(handler.calls(), 1);
    assert_eq!(transport.len(BILLING), 1);
    assert!(transport.bodies(BILLING)[0].contains("PaymentFailed"));
}

#[tokio::test]
async fn undecodable_bodies_are_left_for_redrive() {
    let transport = InMemoryTransport::new();
    let monitor = Arc::new(CountingMonitor::default());
    let handler = Scripted::new(Behavior::Succeed);
    transport.create_queue(BILLING);
    transport
        .send(
            &sourced_bus::Destination::Queue(BILLING.into()),
            "not a wire envelope".into(),
        )
        .await
        .unwrap();
    transport
        .send(
            &sourced_bus::Destination::Queue(BILLING.into()),
            r#"{"Subject":"InvoiceVoided","Message":"{}"}"#.into(),
        )
        .await
        .unwrap();
    enqueue_orders(&transport, BILLING, 1).await;

    let (bus, _shutdown) = start_bus(&transport, monitor.clone(), vec![billing(handler.clone())]);
    eventually(|| transport.deleted().len() == 1 && monitor.exceptions() == 2).await;
    bus.stop().await;

    assert_eq!(handler.calls(), 1);
    assert_eq!(transport.len(BILLING), 2);
    // Decode failures never reach the chain, so no dispatch was timed for them.
    assert_eq!(monitor.timings(), 1);
}

#[tokio::test]
async fn later_handler_registration_wins() {
    let transport = InMemoryTransport::new();
    let monitor = Arc::new(CountingMonitor::default());
    let first = Scripted::new(Behavior::Succeed);
    let second = Scripted::new(Behavior::Succeed);
    enqueue_orders(&transport, BILLING, 1).await;

    let mut handlers = HandlerMap::new();
    handlers.register::<OrderAccepted, _>(first.clone());
    handlers.register::<OrderAccepted, _>(second.clone());
    assert_eq!(handlers.len(), 1);

    let (bus, _shutdown) = start_bus(
        &transport,
        monitor,
        vec![Subscription::new(billing_settings(), handlers)],
    );
    eventually(|| transport.deleted().len() == 1).await;
    bus.stop().await;

    assert_eq!(first.calls(), 0);
    assert_eq!(second.calls(), 1);
}

#[tokio::test]
async fn one_group_reads_from_several_queues() {
    let transport = InMemoryTransport::new();
    let monitor = Arc::new(CountingMonitor::default());
    let handler = Scripted::new(Behavior::Succeed);
    enqueue_orders(&transport, BILLING, 2).await;
    enqueue_orders(&transport, SHIPPING, 2).await;

    let settings = billing_settings()
        .with_queue(SHIPPING)
        .with_poll_error_backoff(Duration::from_millis(10));
    let (bus, _shutdown) = start_bus(
        &transport,
        monitor,
        vec![Subscription::new(
            settings,
            HandlerMap::new().with::<OrderAccepted, _>(handler.clone()),
        )],
    );
    eventually(|| transport.deleted().len() == 4).await;
    bus.stop().await;

    assert_eq!(handler.calls(), 4);
    assert_eq!(transport.len(BILLING), 0);
    assert_eq!(transport.len(SHIPPING), 0);
}

#[tokio::test]
async fn handlers_see_the_decoded_message() {
    let transport = InMemoryTransport::new();
    let handler = Scripted::new(Behavior::Succeed);
    let order = OrderAccepted::new("order-42");
    enqueue(&transport, BILLING, &[&order]).await;

    let (bus, _shutdown) = start_bus(
        &transport,
        Arc::new(CountingMonitor::default()),
        vec![billing(handler.clone())],
    );
    eventually(|| handler.calls() == 1).await;
    bus.stop().await;

    let seen = handler.seen();
    assert_eq!(seen[0].envelope.id, order.envelope.id);
    assert_eq!(seen[0].order_id, "order-42");
    assert_eq!(sourced_bus::Message::unique_key(&seen[0]), "order-42");
}
