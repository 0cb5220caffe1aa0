use std::sync::Arc;
use std::time::Duration;

use sourced_bus::{GroupState, HandlerMap, InMemoryTransport, Subscription};

use crate::support::*;

#[tokio::test]
async fn stop_drains_in_flight_work_and_takes_nothing_new() {
    let transport = InMemoryTransport::new();
    let handler = Gated::new();
    enqueue_orders(&transport, BILLING, 6).await;

    let (bus, _shutdown) = start_bus(
        &transport,
        Arc::new(CountingMonitor::default()),
        vec![Subscription::new(
            billing_settings()
                .with_concurrency_limit(2)
                .with_buffer_capacity(4),
            HandlerMap::new().with::<OrderAccepted, _>(handler.clone()),
        )],
    );
    let bus = Arc::new(bus);
    eventually(|| handler.started() == 2).await;

    let stopping = tokio::spawn({
        let bus = bus.clone();
        async move { bus.stop().await }
    });
    let group = bus.group(BILLING).unwrap().clone();
    tokio::time::timeout(Duration::from_secs(5), group.wait_for_state(GroupState::Draining))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!stopping.is_finished());
    assert_eq!(group.state(), GroupState::Draining);

    handler.release(6);
    tokio::time::timeout(Duration::from_secs(5), stopping)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(group.state(), GroupState::Stopped);
    // The two dispatches in progress finished and were acknowledged.
    assert_eq!(handler.completed(), 2);
    assert_eq!(transport.deleted().len(), 2);
    // Nothing else was dequeued after the stop signal.
    assert_eq!(handler.started(), 2);
    assert_eq!(transport.len(BILLING), 4);
}

#[tokio::test]
async fn cancelling_the_shutdown_token_stops_every_group() {
    let transport = InMemoryTransport::new();
    let handler = Scripted::new(Behavior::Succeed);

    let shipping = Subscription::new(
        sourced_bus::SubscriptionGroupSettings::for_queue(SHIPPING)
            .with_receive_wait_time(Duration::from_millis(10)),
        HandlerMap::new().with::<OrderAccepted, _>(handler.clone()),
    );
    let billing = Subscription::new(
        billing_settings(),
        HandlerMap::new().with::<OrderAccepted, _>(handler.clone()),
    );
    let (bus, shutdown) = start_bus(
        &transport,
        Arc::new(CountingMonitor::default()),
        vec![billing, shipping],
    );
    assert!(bus.groups().iter().all(|g| g.state() == GroupState::Running));

    shutdown.cancel();
    for group in bus.groups() {
        tokio::time::timeout(Duration::from_secs(5), group.wait_for_state(GroupState::Stopped))
            .await
            .unwrap();
    }

    // Messages sent after shutdown are not consumed.
    enqueue_orders(&transport, BILLING, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handler.calls(), 0);
    assert_eq!(transport.len(BILLING), 1);
}

#[tokio::test]
async fn failed_dispatch_during_drain_is_not_acknowledged() {
    let transport = InMemoryTransport::new();
    let handler = Scripted::new(Behavior::Fail);
    enqueue_orders(&transport, BILLING, 1).await;

    let (bus, shutdown) = start_bus(
        &transport,
        Arc::new(CountingMonitor::default()),
        vec![Subscription::new(
            billing_settings(),
            HandlerMap::new().with::<OrderAccepted, _>(handler.clone()),
        )],
    );
    eventually(|| handler.calls() == 1).await;
    shutdown.cancel();
    bus.stop().await;

    assert!(transport.deleted().is_empty());
    assert_eq!(transport.len(BILLING), 1);
}

#[tokio::test]
async fn starting_twice_is_rejected() {
    let transport = InMemoryTransport::new();
    let (bus, shutdown) = start_bus(
        &transport,
        Arc::new(CountingMonitor::default()),
        vec![Subscription::new(
            billing_settings(),
            HandlerMap::new().with::<OrderAccepted, _>(Scripted::new(Behavior::Succeed)),
        )],
    );

    assert!(matches!(
        bus.start(&shutdown),
        Err(sourced_bus::SubscriptionError::AlreadyStarted { .. })
    ));
    bus.stop().await;
    bus.start(&shutdown).unwrap();
    bus.stop().await;
}
