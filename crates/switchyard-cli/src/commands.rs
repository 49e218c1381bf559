//! Command handlers for the Switchyard CLI

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::transport::TracingTransport;
use switchyard_runtime::{
    ConnectionOptions, CoreSnapshot, DetachType, Direction, LinkType, RouterBuilder, RoutingEvent,
    RoutingEventReceiver, Terminus,
};
use tokio::task::JoinHandle;
use tracing::info;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Demo { seed, compact } => {
                let mut config = config;
                if seed.is_some() {
                    config.router.discriminator_seed = seed;
                }
                let report = run_demo(config).await?;
                let text = if compact {
                    serde_json::to_string(&report)?
                } else {
                    serde_json::to_string_pretty(&report)?
                };
                println!("{text}");
                Ok(())
            }
            Commands::Config => {
                print!("{}", config.to_toml_string()?);
                Ok(())
            }
        }
    }
}

/// Log routing events the way a route-computation layer would consume them
fn spawn_route_layer(mut events: RoutingEventReceiver) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut seen = 0usize;
        while let Some(event) = events.recv().await {
            seen += 1;
            match &event {
                RoutingEvent::MobileAdded { key } => info!(key = %key, "route layer: mobile address added"),
                RoutingEvent::MobileRemoved { key } => info!(key = %key, "route layer: mobile address removed"),
                RoutingEvent::LinkLost { mask_bit } => info!(mask_bit, "route layer: control link lost"),
                RoutingEvent::ForwardAttach { link, key, .. } => {
                    info!(link = %link.name(), key = %key, "route layer: attach to forward")
                }
            }
        }
        seen
    })
}

/// Run the scripted scenario and return the final snapshot with counters
pub async fn run_demo(config: AppConfig) -> Result<serde_json::Value> {
    let demo = config.demo.clone();
    let (transport, drain_task) = TracingTransport::spawn();
    let counters = transport.counters();

    let mut runtime = RouterBuilder::new(config.router)
        .with_handlers(transport.clone())
        .start()?;
    let router = runtime.router();
    let events = runtime
        .take_routing_events()
        .ok_or_else(|| CliError::Demo("routing events already taken".to_string()))?;
    let route_layer = spawn_route_layer(events);

    info!(clients = demo.clients, address = %demo.address, "Starting demo");

    router.add_link_route(demo.link_route_prefix.as_str(), Direction::Outgoing)?;

    let mut clients = Vec::with_capacity(demo.clients);
    for i in 0..demo.clients {
        let conn = router.connection_opened(ConnectionOptions::normal(format!("client-{i}")))?;
        router.link_first_attach(
            &conn,
            Direction::Incoming,
            Terminus::anonymous(),
            Terminus::with_address(demo.address.as_str()),
            format!("producer-{i}"),
        )?;
        clients.push(conn);
    }

    let consumer_conn = router.connection_opened(ConnectionOptions::normal("consumer"))?;
    let consumer = router.link_first_attach(
        &consumer_conn,
        Direction::Outgoing,
        Terminus::with_address(demo.address.as_str()),
        Terminus::anonymous(),
        "consumer",
    )?;
    router.link_first_attach(
        &consumer_conn,
        Direction::Outgoing,
        Terminus::dynamic(),
        Terminus::anonymous(),
        "reply-to",
    )?;
    router.link_first_attach(
        &consumer_conn,
        Direction::Outgoing,
        Terminus::with_address(format!("{}.queue", demo.link_route_prefix)),
        Terminus::anonymous(),
        "routed",
    )?;

    let mut peers = Vec::with_capacity(demo.peer_routers);
    for i in 0..demo.peer_routers {
        peers.push(router.connection_opened(ConnectionOptions::inter_router(format!("peer-{i}"), false))?);
    }

    // Answer the core's own attaches as the peer router would
    router.snapshot().await?;
    transport.flush().await;
    for link in transport.take_initiated() {
        let terminus = match link.link_type() {
            Some(LinkType::Control) => Terminus::router_control(),
            _ => Terminus::router_data(),
        };
        router.link_second_attach(&link, terminus.clone(), terminus)?;
    }

    router.deliveries_ready(&consumer)?;
    router.snapshot().await?;
    transport.flush().await;

    // Tear part of it down again
    router.link_detach(&consumer, DetachType::Detached, None)?;
    if let Some(first) = clients.first() {
        router.connection_closed(first)?;
    }
    if let Some(peer) = peers.first() {
        router.connection_closed(peer)?;
    }

    let snapshot: CoreSnapshot = router.snapshot().await?;
    transport.flush().await;

    let stats = runtime.shutdown().await?;
    let routing_events = route_layer
        .await
        .map_err(|e| CliError::Demo(format!("route layer task failed: {e}")))?;
    transport.stop();
    let callbacks = drain_task
        .await
        .map_err(|e| CliError::Demo(format!("drain task failed: {e}")))?;

    info!(callbacks, routing_events, "Demo finished");

    Ok(serde_json::json!({
        "snapshot": snapshot,
        "stats": stats,
        "transport": counters.summary(),
        "routing_events": routing_events,
    }))
}
