//! Notifications for the route-computation layer

use crate::link::LinkHandle;
use switchyard_core::{AddressKey, MaskBit, Terminus};
use tokio::sync::mpsc;
use tracing::trace;

/// Event raised by the core for the route layer
#[derive(Debug)]
pub enum RoutingEvent {
    /// A mobile address gained its first local consumer
    MobileAdded { key: AddressKey },
    /// A mobile address lost its last local consumer
    MobileRemoved { key: AddressKey },
    /// The outgoing control link for a peer router went away
    LinkLost { mask_bit: MaskBit },
    /// A first attach matched a link route and must be forwarded
    ForwardAttach {
        link: LinkHandle,
        key: AddressKey,
        source: Terminus,
        target: Terminus,
    },
}

impl RoutingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RoutingEvent::MobileAdded { .. } => "mobile-added",
            RoutingEvent::MobileRemoved { .. } => "mobile-removed",
            RoutingEvent::LinkLost { .. } => "link-lost",
            RoutingEvent::ForwardAttach { .. } => "forward-attach",
        }
    }
}

pub type RoutingEventReceiver = mpsc::UnboundedReceiver<RoutingEvent>;

/// Sending side held by the core; a missing route layer is not an error
#[derive(Debug, Clone)]
pub(crate) struct RoutingEventSender {
    sender: mpsc::UnboundedSender<RoutingEvent>,
}

impl RoutingEventSender {
    pub(crate) fn channel() -> (Self, RoutingEventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub(crate) fn emit(&self, event: RoutingEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            trace!(event = name, "No route layer listening, event dropped");
        }
    }
}
