//! Switchyard Runtime
//!
//! The serialized router-state engine:
//! - `CoreTask`: the single task that owns and mutates all routing state
//! - `Router`: cloneable API turning inbound protocol events into actions
//! - `ConnectionHandle`: per-connection work queue drained by the transport
//! - `RoutingEvent`: notifications for the route-computation layer
//!
//! Transports call `Router` methods from any thread, are told through
//! `ConnectionHandlers::activate` when a connection has work, and call
//! `ConnectionHandle::process` on their own thread to receive it.

pub mod action;
pub mod builder;
pub mod connection;
pub mod handlers;
pub mod link;
pub mod logic;
pub mod router;
pub mod routing;
pub mod testing;
pub mod work;

pub use action::{Action, ActionSender};
pub use builder::{RouterBuilder, RouterRuntime};
pub use connection::{ConnectionHandle, ConnectionOptions, ConnectionState};
pub use handlers::ConnectionHandlers;
pub use link::LinkHandle;
pub use logic::{
    AddressSnapshot, ConnectionSnapshot, CoreSnapshot, CoreStats, CoreTask, LinkSnapshot,
    SlotSnapshot,
};
pub use router::Router;
pub use routing::{RoutingEvent, RoutingEventReceiver};
pub use work::ConnectionWork;

// Re-export core types for convenience
pub use switchyard_core::{
    AddressKey, Condition, ConnectionId, ConnectionRole, DetachType, Direction, LinkError, LinkId,
    LinkType, RouterConfig, RouterError, RouterResult, Semantics, SubscriptionId, Terminus,
};
