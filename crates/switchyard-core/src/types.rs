//! Core types for the Switchyard router core
//!
//! This module defines the identifiers and closed enumerations shared by the
//! address table, the attach policy and the runtime, using newtype patterns
//! so that connection, link and address identifiers cannot be mixed up.

use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Identifiers
// ----------------------------------------------------------------------------

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Create an identifier from its raw value
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw value
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $tag, self.0)
            }
        }
    };
}

define_id!(
    /// Stable identifier of a connection, assigned when the transport reports it
    ConnectionId,
    "conn-"
);
define_id!(
    /// Stable identifier of a link, valid from first attach until detach
    LinkId,
    "link-"
);
define_id!(
    /// Stable identifier of an address record; ids grow with insertion order
    AddressId,
    "addr-"
);
define_id!(
    /// Identifier of an in-process subscription bound to an address
    SubscriptionId,
    "sub-"
);

/// Index identifying an inter-router connection in the per-peer link tables
pub type MaskBit = usize;

// ----------------------------------------------------------------------------
// Direction and Roles
// ----------------------------------------------------------------------------

/// Direction of a link or connection, from the router's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Messages flow from the peer into the router
    Incoming,
    /// Messages flow from the router to the peer
    Outgoing,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => write!(f, "incoming"),
            Direction::Outgoing => write!(f, "outgoing"),
        }
    }
}

/// Role a connection plays for the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionRole {
    /// Client or broker connection carrying endpoint links
    Normal,
    /// Connection to a peer router carrying control and data links
    InterRouter,
    /// Connection opened on demand for waypoints and link-route destinations
    OnDemand,
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionRole::Normal => write!(f, "normal"),
            ConnectionRole::InterRouter => write!(f, "inter-router"),
            ConnectionRole::OnDemand => write!(f, "on-demand"),
        }
    }
}

/// Kind of link, derived from the capabilities of its local terminus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// Link to a client endpoint
    Endpoint,
    /// Router-internal store-and-forward interception link
    Waypoint,
    /// Inter-router control link
    Control,
    /// Inter-router routed-message transfer link
    RouterData,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Endpoint => write!(f, "endpoint"),
            LinkType::Waypoint => write!(f, "waypoint"),
            LinkType::Control => write!(f, "router-control"),
            LinkType::RouterData => write!(f, "router-data"),
        }
    }
}

/// Lifecycle of a link inside the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkState {
    /// Created by the core; first attach sent, waiting for the peer
    AttachPending,
    /// First attach received from the peer; reply not yet sent
    HalfAttached,
    /// Both attaches exchanged
    Attached,
    /// Torn down; no address linkage remains
    Detached,
}

/// Why a link detach was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetachType {
    /// Peer sent a detach frame
    Detached,
    /// Peer sent a detach frame with `closed = true`
    Closed,
    /// The link disappeared with its connection; no frame can be sent back
    Lost,
}

/// Distribution treatment of messages sent to an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semantics {
    /// Every consumer receives a copy, flooded to every router
    MulticastFlood,
    /// Every consumer receives a copy, sent once along the route tree
    MulticastOnce,
    /// One consumer receives the message, preferring the closest
    AnycastClosest,
    /// One consumer receives the message, balanced across consumers
    AnycastBalanced,
    /// Attaches are routed hop-by-hop, balanced across destinations
    LinkBalanced,
}

impl Default for Semantics {
    fn default() -> Self {
        Semantics::AnycastBalanced
    }
}

impl fmt::Display for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Semantics::MulticastFlood => write!(f, "multicast-flood"),
            Semantics::MulticastOnce => write!(f, "multicast-once"),
            Semantics::AnycastClosest => write!(f, "anycast-closest"),
            Semantics::AnycastBalanced => write!(f, "anycast-balanced"),
            Semantics::LinkBalanced => write!(f, "link-balanced"),
        }
    }
}
