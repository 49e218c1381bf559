//! Integration Tests for the Router API
//!
//! Drives a spawned core task through the public `Router` surface the way a
//! transport would: submit protocol events, use a snapshot as a barrier, then
//! drain connection work and check what the transport was asked to send.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use switchyard_runtime::testing::{HandlerCall, RecordingHandlers};
use switchyard_runtime::{
    ConnectionOptions, ConnectionState, DetachType, Direction, Router, RouterBuilder,
    RouterConfig, RouterError, RouterRuntime, RoutingEvent, RoutingEventReceiver, Semantics,
    Terminus,
};
use tokio::time::timeout;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

struct TestRouter {
    runtime: RouterRuntime,
    router: Router,
    recorder: Arc<RecordingHandlers>,
    events: RoutingEventReceiver,
}

fn start_router() -> TestRouter {
    let recorder = RecordingHandlers::new();
    let mut runtime = RouterBuilder::new(RouterConfig::testing())
        .with_handlers(recorder.clone())
        .start()
        .expect("router should start");
    let events = runtime
        .take_routing_events()
        .expect("routing events available");
    TestRouter {
        router: runtime.router(),
        runtime,
        recorder,
        events,
    }
}

async fn next_event(events: &mut RoutingEventReceiver) -> RoutingEvent {
    timeout(Duration::from_millis(500), events.recv())
        .await
        .expect("routing event within timeout")
        .expect("routing channel open")
}

// ----------------------------------------------------------------------------
// Attach Flow
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_producer_attach_is_accepted_with_credit() {
    let mut t = start_router();
    let conn = t
        .router
        .connection_opened(ConnectionOptions::normal("client-1"))
        .unwrap();
    let link = t
        .router
        .link_first_attach(
            &conn,
            Direction::Incoming,
            Terminus::anonymous(),
            Terminus::with_address("service.orders"),
            "producer-1",
        )
        .unwrap();

    let snapshot = t.router.snapshot().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Open);
    let addr = snapshot.address("Mservice.orders").expect("address created");
    assert_eq!(addr.semantics, Semantics::AnycastBalanced);
    assert_eq!(addr.inlinks, vec![link.id()]);
    assert_eq!(t.recorder.activations(conn.id()), 1);

    t.recorder.take();
    assert_eq!(conn.process(), 2);
    let calls = t.recorder.calls_for(link.id());
    assert!(matches!(calls[0], HandlerCall::SecondAttach { .. }));
    assert!(matches!(calls[1], HandlerCall::Flow { credit: 32, .. }));

    t.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_consumer_lifecycle_notifies_route_layer() {
    let mut t = start_router();
    let conn = t
        .router
        .connection_opened(ConnectionOptions::normal("client-1"))
        .unwrap();
    let link = t
        .router
        .link_first_attach(
            &conn,
            Direction::Outgoing,
            Terminus::with_address("telemetry"),
            Terminus::anonymous(),
            "consumer-1",
        )
        .unwrap();

    let event = next_event(&mut t.events).await;
    assert!(matches!(event, RoutingEvent::MobileAdded { ref key } if key.as_str() == "Mtelemetry"));

    t.router.deliveries_ready(&link).unwrap();
    t.router.snapshot().await.unwrap();
    t.recorder.take();
    conn.process();
    assert_eq!(
        t.recorder.take().last(),
        Some(&HandlerCall::Push { link: link.id() })
    );

    t.router
        .link_detach(&link, DetachType::Detached, None)
        .unwrap();
    let event = next_event(&mut t.events).await;
    assert!(matches!(event, RoutingEvent::MobileRemoved { ref key } if key.as_str() == "Mtelemetry"));
    assert!(link.is_detached());

    t.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dynamic_receiver_learns_generated_address() {
    let mut t = start_router();
    let conn = t
        .router
        .connection_opened(ConnectionOptions::normal("client-1"))
        .unwrap();
    let link = t
        .router
        .link_first_attach(
            &conn,
            Direction::Outgoing,
            Terminus::dynamic(),
            Terminus::anonymous(),
            "reply-to",
        )
        .unwrap();
    t.router.snapshot().await.unwrap();

    conn.process();
    let calls = t.recorder.calls_for(link.id());
    let Some(HandlerCall::SecondAttach { source, .. }) = calls.first() else {
        panic!("expected second attach, got {calls:?}");
    };
    let address = source.address().expect("dynamic address assigned");
    assert!(address.starts_with("amqp:/_topo/0/Router.Test/temp."));

    t.runtime.shutdown().await.unwrap();
}

// ----------------------------------------------------------------------------
// Connections
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_inter_router_close_releases_mask_bit() {
    let mut t = start_router();
    let conn = t
        .router
        .connection_opened(ConnectionOptions::inter_router("peer-router", false))
        .unwrap();

    let snapshot = t.router.snapshot().await.unwrap();
    assert_eq!(snapshot.links_on(conn.id()).count(), 4);
    assert_eq!(snapshot.free_mask_bits, 63);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["connections"][0]["mask_bit"], 0);
    assert_eq!(json["connections"][0]["options"]["role"], "InterRouter");
    assert_eq!(json["links"][0]["state"], "AttachPending");

    t.router.connection_closed(&conn).unwrap();
    let snapshot = t.router.snapshot().await.unwrap();
    assert!(snapshot.links.is_empty());
    assert_eq!(snapshot.free_mask_bits, 64);
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.process(), 0);

    let stats = t.runtime.shutdown().await.unwrap();
    assert_eq!(stats.connections_opened, 1);
    assert_eq!(stats.connections_closed, 1);
}

#[tokio::test]
async fn test_concurrent_submitters_are_serialized() {
    let mut t = start_router();

    let tasks = (0..8).map(|i| {
        let router = t.router.clone();
        tokio::spawn(async move {
            let conn = router
                .connection_opened(ConnectionOptions::normal(format!("client-{i}")))
                .unwrap();
            for j in 0..4 {
                router
                    .link_first_attach(
                        &conn,
                        Direction::Incoming,
                        Terminus::anonymous(),
                        Terminus::with_address(format!("queue.{j}")),
                        format!("producer-{i}-{j}"),
                    )
                    .unwrap();
            }
            conn
        })
    });
    let conns: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let snapshot = t.router.snapshot().await.unwrap();
    assert_eq!(snapshot.connections.len(), 8);
    assert_eq!(snapshot.links.len(), 32);
    for j in 0..4 {
        let addr = snapshot.address(&format!("Mqueue.{j}")).unwrap();
        assert_eq!(addr.inlinks.len(), 8);
    }
    for conn in &conns {
        assert_eq!(conn.process(), 8);
    }

    t.runtime.shutdown().await.unwrap();
}

// ----------------------------------------------------------------------------
// Control Surface
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_invalid_destination_key_is_refused() {
    let mut t = start_router();
    let result = t.router.map_destination("Xservice", 0);
    assert!(matches!(result, Err(RouterError::InvalidAddressKey { .. })));

    t.router.map_destination("Mservice", 2).unwrap();
    let snapshot = t.router.snapshot().await.unwrap();
    assert_eq!(snapshot.address("Mservice").unwrap().rnodes, vec![2]);

    t.runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_actions_after_shutdown_are_discarded() {
    let recorder = RecordingHandlers::new();
    let (router, task, _events) = RouterBuilder::new(RouterConfig::testing())
        .with_handlers(recorder.clone())
        .build()
        .unwrap();

    let before = router
        .connection_opened(ConnectionOptions::normal("early"))
        .unwrap();
    router.shutdown().unwrap();
    let after = router
        .connection_opened(ConnectionOptions::inter_router("late", false))
        .unwrap();

    let stats = task.run().await;
    assert_eq!(stats.actions_processed, 1);
    assert_eq!(stats.actions_discarded, 1);
    assert_eq!(before.state(), ConnectionState::Open);
    assert_eq!(after.state(), ConnectionState::Opening);
    assert_eq!(after.pending_work(), 0);

    assert!(!router.is_running());
    assert!(matches!(
        router.snapshot().await,
        Err(RouterError::CoreStopped { .. })
    ));
}
