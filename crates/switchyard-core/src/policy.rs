//! First-attach policy
//!
//! Which handling a peer-initiated attach gets is a pure function of the
//! link type, its direction and whether the connection may carry
//! inter-router links. Keeping it as data means the decision table is
//! exhaustively matched in one place.

use crate::errors::Condition;
use crate::terminus::{Terminus, CAPABILITY_ROUTER_CONTROL, CAPABILITY_ROUTER_DATA};
use crate::types::{Direction, LinkType};

/// Handling chosen for a first attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachPolicy {
    /// Refuse the link with this condition
    Reject(Condition),
    /// Producer link: resolve the target, bind into `inlinks`, grant credit
    EndpointIncoming,
    /// Consumer link: resolve the source, bind into `rlinks`
    EndpointOutgoing,
    /// Peer's control link toward us: accept and grant credit
    ControlIncoming,
    /// Our control link toward the peer: bind to hello, fill the control slot
    ControlOutgoing,
    /// Peer's data link toward us: accept and grant credit
    DataIncoming,
    /// Our data link toward the peer: fill the data slot
    DataOutgoing,
}

impl AttachPolicy {
    /// Decide how to handle a first attach
    ///
    /// `inter_router_capable` is true only for an inter-router connection
    /// that holds a mask bit.
    pub fn for_first_attach(
        link_type: LinkType,
        direction: Direction,
        inter_router_capable: bool,
    ) -> Self {
        match (link_type, direction) {
            (LinkType::Waypoint, _) => AttachPolicy::Reject(Condition::Forbidden),
            (LinkType::Control | LinkType::RouterData, _) if !inter_router_capable => {
                AttachPolicy::Reject(Condition::Forbidden)
            }
            (LinkType::Endpoint, Direction::Incoming) => AttachPolicy::EndpointIncoming,
            (LinkType::Endpoint, Direction::Outgoing) => AttachPolicy::EndpointOutgoing,
            (LinkType::Control, Direction::Incoming) => AttachPolicy::ControlIncoming,
            (LinkType::Control, Direction::Outgoing) => AttachPolicy::ControlOutgoing,
            (LinkType::RouterData, Direction::Incoming) => AttachPolicy::DataIncoming,
            (LinkType::RouterData, Direction::Outgoing) => AttachPolicy::DataOutgoing,
        }
    }

    pub fn is_reject(self) -> bool {
        matches!(self, AttachPolicy::Reject(_))
    }
}

/// Link type from the local terminus (target of an incoming link, source of
/// an outgoing one). Waypoints are never peer-initiated, so they are not
/// derived here.
pub fn link_type_for(local: &Terminus) -> LinkType {
    if local.has_capability(CAPABILITY_ROUTER_CONTROL) {
        LinkType::Control
    } else if local.has_capability(CAPABILITY_ROUTER_DATA) {
        LinkType::RouterData
    } else {
        LinkType::Endpoint
    }
}

/// The terminus that describes our end of a link
pub fn local_terminus<'a>(
    direction: Direction,
    source: &'a Terminus,
    target: &'a Terminus,
) -> &'a Terminus {
    match direction {
        Direction::Incoming => target,
        Direction::Outgoing => source,
    }
}
