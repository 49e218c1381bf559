//! Actions and the action queue
//!
//! Every inbound call becomes an `Action` on an unbounded MPSC channel read
//! by the core task alone. Submission never blocks and keeps per-sender
//! FIFO order.

use crate::connection::ConnectionHandle;
use crate::link::LinkHandle;
use crate::logic::CoreSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use switchyard_core::{
    AddressKey, ConnectionId, DetachType, Direction, LinkError, LinkId, MaskBit, RouterError,
    RouterResult, Semantics, SubscriptionId, Terminus,
};
use tokio::sync::{mpsc, oneshot};

/// Unit of work for the core task
#[derive(Debug)]
pub enum Action {
    ConnectionOpened {
        conn: ConnectionHandle,
    },
    ConnectionClosed {
        conn: ConnectionId,
    },
    LinkFirstAttach {
        conn: ConnectionId,
        link: LinkHandle,
        source: Terminus,
        target: Terminus,
    },
    LinkSecondAttach {
        link: LinkId,
        source: Terminus,
        target: Terminus,
    },
    LinkDetach {
        link: LinkId,
        detach_type: DetachType,
        error: Option<LinkError>,
    },
    DeliveriesReady {
        link: LinkId,
    },
    AddLinkRoute {
        prefix: String,
        direction: Direction,
    },
    RemoveLinkRoute {
        prefix: String,
        direction: Direction,
    },
    Subscribe {
        id: SubscriptionId,
        address: String,
        semantics: Semantics,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    MapDestination {
        key: AddressKey,
        mask_bit: MaskBit,
    },
    UnmapDestination {
        key: AddressKey,
        mask_bit: MaskBit,
    },
    Inspect {
        reply: oneshot::Sender<CoreSnapshot>,
    },
    Shutdown,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::ConnectionOpened { .. } => "connection-opened",
            Action::ConnectionClosed { .. } => "connection-closed",
            Action::LinkFirstAttach { .. } => "link-first-attach",
            Action::LinkSecondAttach { .. } => "link-second-attach",
            Action::LinkDetach { .. } => "link-detach",
            Action::DeliveriesReady { .. } => "deliveries-ready",
            Action::AddLinkRoute { .. } => "add-link-route",
            Action::RemoveLinkRoute { .. } => "remove-link-route",
            Action::Subscribe { .. } => "subscribe",
            Action::Unsubscribe { .. } => "unsubscribe",
            Action::MapDestination { .. } => "map-destination",
            Action::UnmapDestination { .. } => "unmap-destination",
            Action::Inspect { .. } => "inspect",
            Action::Shutdown => "shutdown",
        }
    }
}

pub type ActionReceiver = mpsc::UnboundedReceiver<Action>;

/// Cloneable submitter for the action queue
#[derive(Debug, Clone)]
pub struct ActionSender {
    sender: mpsc::UnboundedSender<Action>,
}

impl ActionSender {
    pub fn channel() -> (Self, ActionReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue an action; fails once the core task has stopped
    pub fn submit(&self, action: Action) -> RouterResult<()> {
        self.sender.send(action).map_err(|rejected| {
            RouterError::core_stopped(format!("{} not queued", rejected.0.name()))
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ----------------------------------------------------------------------------
// Identifier Allocation
// ----------------------------------------------------------------------------

/// Allocates identifiers on the caller's thread so inbound calls can return
/// handles before the core has run
#[derive(Debug, Default)]
pub struct IdAllocator {
    connections: AtomicU64,
    links: AtomicU64,
    subscriptions: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_connection(&self) -> ConnectionId {
        ConnectionId::new(self.connections.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_link(&self) -> LinkId {
        LinkId::new(self.links.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_subscription(&self) -> SubscriptionId {
        SubscriptionId::new(self.subscriptions.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_after_receiver_dropped() {
        let (sender, receiver) = ActionSender::channel();
        assert!(sender.submit(Action::Shutdown).is_ok());
        drop(receiver);

        let err = sender.submit(Action::Shutdown).unwrap_err();
        assert!(matches!(err, RouterError::CoreStopped { .. }));
        assert!(sender.is_closed());
    }

    #[test]
    fn test_ids_are_unique_per_kind() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_link(), LinkId::new(0));
        assert_eq!(ids.next_link(), LinkId::new(1));
        assert_eq!(ids.next_connection(), ConnectionId::new(0));
        assert_eq!(ids.next_subscription(), SubscriptionId::new(0));
    }
}
