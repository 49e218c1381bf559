//! Router API
//!
//! `Router` is the cloneable front door used by transports and the route
//! layer. Every method turns its call into an action and returns without
//! waiting for the core task; handles are returned synchronously.

use crate::action::{Action, ActionSender, IdAllocator};
use crate::connection::{ConnectionHandle, ConnectionOptions};
use crate::handlers::ConnectionHandlers;
use crate::link::LinkHandle;
use crate::logic::CoreSnapshot;
use std::sync::Arc;
use switchyard_core::{
    AddressKey, DetachType, Direction, LinkError, MaskBit, RouterError, RouterResult, Semantics,
    SubscriptionId, Terminus,
};
use tokio::sync::oneshot;

/// Handle for submitting work to the router core
#[derive(Clone)]
pub struct Router {
    actions: ActionSender,
    ids: Arc<IdAllocator>,
    handlers: Arc<dyn ConnectionHandlers>,
}

impl Router {
    pub(crate) fn new(
        actions: ActionSender,
        ids: Arc<IdAllocator>,
        handlers: Arc<dyn ConnectionHandlers>,
    ) -> Self {
        Self {
            actions,
            ids,
            handlers,
        }
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    /// Report a new connection; the handle is usable immediately
    pub fn connection_opened(&self, options: ConnectionOptions) -> RouterResult<ConnectionHandle> {
        let conn = ConnectionHandle::new(self.ids.next_connection(), options, self.handlers.clone());
        self.actions
            .submit(Action::ConnectionOpened { conn: conn.clone() })?;
        Ok(conn)
    }

    pub fn connection_closed(&self, conn: &ConnectionHandle) -> RouterResult<()> {
        self.actions
            .submit(Action::ConnectionClosed { conn: conn.id() })
    }

    // ------------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------------

    /// Report a peer's first attach; the link handle is usable immediately
    pub fn link_first_attach<N: Into<String>>(
        &self,
        conn: &ConnectionHandle,
        direction: Direction,
        source: Terminus,
        target: Terminus,
        name: N,
    ) -> RouterResult<LinkHandle> {
        let options = conn.options();
        let link = LinkHandle::new(
            self.ids.next_link(),
            conn.id(),
            name.into(),
            direction,
            (options.strip_annotations_in, options.strip_annotations_out),
        );
        self.actions.submit(Action::LinkFirstAttach {
            conn: conn.id(),
            link: link.clone(),
            source,
            target,
        })?;
        Ok(link)
    }

    /// Report the peer's reply to a core-initiated attach
    pub fn link_second_attach(
        &self,
        link: &LinkHandle,
        source: Terminus,
        target: Terminus,
    ) -> RouterResult<()> {
        self.actions.submit(Action::LinkSecondAttach {
            link: link.id(),
            source,
            target,
        })
    }

    pub fn link_detach(
        &self,
        link: &LinkHandle,
        detach_type: DetachType,
        error: Option<LinkError>,
    ) -> RouterResult<()> {
        self.actions.submit(Action::LinkDetach {
            link: link.id(),
            detach_type,
            error,
        })
    }

    /// Deliveries are waiting on an outgoing link; schedules a push
    pub fn deliveries_ready(&self, link: &LinkHandle) -> RouterResult<()> {
        self.actions
            .submit(Action::DeliveriesReady { link: link.id() })
    }

    // ------------------------------------------------------------------------
    // Route-table hooks
    // ------------------------------------------------------------------------

    /// Configure a link-route prefix for one direction
    pub fn add_link_route<P: Into<String>>(&self, prefix: P, direction: Direction) -> RouterResult<()> {
        self.actions.submit(Action::AddLinkRoute {
            prefix: prefix.into(),
            direction,
        })
    }

    pub fn remove_link_route<P: Into<String>>(
        &self,
        prefix: P,
        direction: Direction,
    ) -> RouterResult<()> {
        self.actions.submit(Action::RemoveLinkRoute {
            prefix: prefix.into(),
            direction,
        })
    }

    /// Register an in-process consumer of `address`
    pub fn subscribe<A: Into<String>>(
        &self,
        address: A,
        semantics: Semantics,
    ) -> RouterResult<SubscriptionId> {
        let id = self.ids.next_subscription();
        self.actions.submit(Action::Subscribe {
            id,
            address: address.into(),
            semantics,
        })?;
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> RouterResult<()> {
        self.actions.submit(Action::Unsubscribe { id })
    }

    /// Record that the router behind `mask_bit` can reach the address with
    /// the raw `key` (e.g. `"Mservice.orders"`)
    pub fn map_destination(&self, key: &str, mask_bit: MaskBit) -> RouterResult<()> {
        let key = AddressKey::parse(key)?;
        self.actions
            .submit(Action::MapDestination { key, mask_bit })
    }

    pub fn unmap_destination(&self, key: &str, mask_bit: MaskBit) -> RouterResult<()> {
        let key = AddressKey::parse(key)?;
        self.actions
            .submit(Action::UnmapDestination { key, mask_bit })
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// Snapshot of the routing state after everything submitted before it
    pub async fn snapshot(&self) -> RouterResult<CoreSnapshot> {
        let (reply, response) = oneshot::channel();
        self.actions.submit(Action::Inspect { reply })?;
        response
            .await
            .map_err(|_| RouterError::core_stopped("inspect was discarded"))
    }

    /// Ask the core task to stop after the actions already queued
    pub fn shutdown(&self) -> RouterResult<()> {
        self.actions.submit(Action::Shutdown)
    }

    pub fn is_running(&self) -> bool {
        !self.actions.is_closed()
    }
}
