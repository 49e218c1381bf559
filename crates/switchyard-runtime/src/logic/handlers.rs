//! Action Handlers
//!
//! One handler per action kind. Handlers run on the core task only and are
//! the sole mutators of `CoreState`.

use super::state::{Connection, CoreState, Link};
use crate::action::Action;
use crate::connection::{ConnectionHandle, ConnectionState};
use crate::link::LinkHandle;
use crate::routing::RoutingEvent;
use crate::work::ConnectionWork;
use switchyard_core::{
    link_type_for, local_terminus, resolve_terminus, AddressKey, AttachPolicy, Condition,
    ConnectionId, ConnectionRole, DetachType, Direction, LinkError, LinkId, LinkState, LinkType,
    MaskBit, Resolution, ResolveOptions, Semantics, SubscriptionId, Terminus,
};
use tracing::{debug, error, info, trace, warn};

/// Resolution flags for a peer's incoming endpoint link (our target)
const RESOLVE_INCOMING: ResolveOptions = ResolveOptions::new(true, false);

/// Resolution flags for a peer's outgoing endpoint link (our source)
const RESOLVE_OUTGOING: ResolveOptions = ResolveOptions::new(true, true);

impl CoreState {
    /// Execute one action; under `discard` only release what it owns
    pub fn execute(&mut self, action: Action, discard: bool) {
        if discard {
            trace!(action = action.name(), "Discarding action");
            self.stats.actions_discarded += 1;
            return;
        }

        self.stats.actions_processed += 1;
        trace!(action = action.name(), "Executing action");

        match action {
            Action::ConnectionOpened { conn } => self.handle_connection_opened(conn),
            Action::ConnectionClosed { conn } => self.handle_connection_closed(conn),
            Action::LinkFirstAttach {
                conn,
                link,
                source,
                target,
            } => self.handle_first_attach(conn, link, source, target),
            Action::LinkSecondAttach { link, source, target } => {
                self.handle_second_attach(link, source, target)
            }
            Action::LinkDetach {
                link,
                detach_type,
                error,
            } => self.handle_detach(link, detach_type, error),
            Action::DeliveriesReady { link } => self.handle_deliveries_ready(link),
            Action::AddLinkRoute { prefix, direction } => self.handle_add_link_route(&prefix, direction),
            Action::RemoveLinkRoute { prefix, direction } => {
                self.handle_remove_link_route(&prefix, direction)
            }
            Action::Subscribe {
                id,
                address,
                semantics,
            } => self.handle_subscribe(id, &address, semantics),
            Action::Unsubscribe { id } => self.handle_unsubscribe(id),
            Action::MapDestination { key, mask_bit } => self.handle_map_destination(key, mask_bit),
            Action::UnmapDestination { key, mask_bit } => {
                self.handle_unmap_destination(&key, mask_bit)
            }
            Action::Inspect { reply } => {
                if reply.send(self.snapshot()).is_err() {
                    trace!("Inspect requester went away");
                }
            }
            // Handled by the task loop
            Action::Shutdown => {}
        }
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    fn handle_connection_opened(&mut self, handle: ConnectionHandle) {
        let conn = handle.id();
        let role = handle.role();

        let mut mask_bit = None;
        if role == ConnectionRole::InterRouter {
            match self.mask_bits.claim() {
                Some(bit) => {
                    info!(conn = %conn, mask_bit = bit, "Mask bit assigned");
                    mask_bit = Some(bit);
                }
                None => {
                    self.stats.mask_bit_exhaustions += 1;
                    error!(
                        conn = %conn,
                        label = %handle.label(),
                        capacity = self.mask_bits.capacity(),
                        "Mask-bit pool exhausted; inter-router connection has no routing capability"
                    );
                }
            }
        }

        handle.set_state(ConnectionState::Open);
        info!(
            conn = %conn,
            label = %handle.label(),
            role = %role,
            incoming = handle.is_incoming(),
            "Connection opened"
        );

        let dialed = !handle.is_incoming();
        self.connections.insert(conn, Connection::new(handle, mask_bit));
        self.open_order.push(conn);
        self.stats.connections_opened += 1;

        match role {
            ConnectionRole::InterRouter if mask_bit.is_some() && dialed => {
                for (link_type, direction) in [
                    (LinkType::Control, Direction::Incoming),
                    (LinkType::Control, Direction::Outgoing),
                    (LinkType::RouterData, Direction::Incoming),
                    (LinkType::RouterData, Direction::Outgoing),
                ] {
                    let terminus = match link_type {
                        LinkType::Control => Terminus::router_control(),
                        _ => Terminus::router_data(),
                    };
                    self.create_link(conn, link_type, direction, terminus.clone(), terminus);
                }
            }
            ConnectionRole::OnDemand => {
                debug!(conn = %conn, "On-demand connection opened; no waypoints to activate");
            }
            _ => {}
        }
    }

    fn handle_connection_closed(&mut self, conn: ConnectionId) {
        let Some(connection) = self.connections.remove(&conn) else {
            warn!(conn = %conn, "Close for unknown connection ignored");
            return;
        };
        self.open_order.retain(|id| *id != conn);

        for link in &connection.links {
            if let Some(record) = self.links.remove(link) {
                self.teardown_link(record, DetachType::Lost);
            }
        }

        if let Some(bit) = connection.mask_bit {
            for slots in [&mut self.control_links, &mut self.data_links] {
                if let Some(slot) = slots.get_mut(bit) {
                    *slot = None;
                }
            }
            match self.mask_bits.release(bit) {
                Ok(()) => info!(conn = %conn, mask_bit = bit, "Mask bit released"),
                Err(err) => error!(conn = %conn, error = %err, "Mask bit release failed"),
            }
        }

        let discarded = connection.handle.close_work_queue();
        self.stats.work_discarded += discarded as u64;
        self.stats.connections_closed += 1;
        info!(
            conn = %conn,
            links = connection.links.len(),
            discarded,
            "Connection closed"
        );
    }

    // ------------------------------------------------------------------------
    // Attach
    // ------------------------------------------------------------------------

    fn handle_first_attach(
        &mut self,
        conn: ConnectionId,
        handle: LinkHandle,
        mut source: Terminus,
        mut target: Terminus,
    ) {
        let Some(connection) = self.connections.get_mut(&conn) else {
            warn!(conn = %conn, link = %handle.name(), "First attach on unknown connection dropped");
            return;
        };

        let id = handle.id();
        let direction = handle.direction();
        let link_type = link_type_for(local_terminus(direction, &source, &target));
        handle.set_link_type(link_type);

        let capable = connection.inter_router_capable();
        let mask_bit = connection.mask_bit;
        connection.links.push(id);
        self.links.insert(
            id,
            Link::new(handle.clone(), link_type, LinkState::HalfAttached, self.config.links.capacity),
        );
        debug!(
            conn = %conn,
            link = %handle.name(),
            link_type = %link_type,
            direction = %direction,
            "First attach"
        );

        match AttachPolicy::for_first_attach(link_type, direction, capable) {
            AttachPolicy::Reject(condition) => self.reject_link(id, condition),

            AttachPolicy::EndpointIncoming => {
                match resolve_terminus(
                    &mut self.addresses,
                    &mut self.generator,
                    &self.config.identity,
                    Direction::Incoming,
                    &mut target,
                    RESOLVE_INCOMING,
                ) {
                    Resolution::Anonymous => self.accept_link(id, source, target, true),
                    Resolution::NoRoute => self.reject_link(id, Condition::NoRouteToDestination),
                    Resolution::LinkRoute { key, .. } => self.forward_link(id, key, source, target),
                    Resolution::Local { addr, .. } => {
                        self.bind_inlink(id, addr);
                        self.accept_link(id, source, target, true);
                    }
                }
            }

            AttachPolicy::EndpointOutgoing => {
                match resolve_terminus(
                    &mut self.addresses,
                    &mut self.generator,
                    &self.config.identity,
                    Direction::Outgoing,
                    &mut source,
                    RESOLVE_OUTGOING,
                ) {
                    Resolution::Anonymous | Resolution::NoRoute => {
                        self.reject_link(id, Condition::NoRouteToDestination)
                    }
                    Resolution::LinkRoute { key, .. } => self.forward_link(id, key, source, target),
                    Resolution::Local { addr, .. } => {
                        self.bind_rlink(id, addr);
                        self.accept_link(id, source, target, false);
                    }
                }
            }

            AttachPolicy::ControlIncoming | AttachPolicy::DataIncoming => {
                self.accept_link(id, source, target, true)
            }

            AttachPolicy::ControlOutgoing => {
                if let Some(bit) = mask_bit {
                    self.bind_control_link(id, bit);
                }
                self.accept_link(id, source, target, false);
            }

            AttachPolicy::DataOutgoing => {
                if let Some(bit) = mask_bit {
                    self.bind_data_link(id, bit);
                }
                self.accept_link(id, source, target, false);
            }
        }
    }

    /// Reply with a second attach, granting credit to incoming links
    fn accept_link(&mut self, id: LinkId, source: Terminus, target: Terminus, grant_credit: bool) {
        let Some(link) = self.links.get_mut(&id) else {
            return;
        };
        link.state = LinkState::Attached;
        let handle = link.handle.clone();
        let capacity = link.capacity;
        let conn = link.connection_id();
        self.stats.links_attached += 1;

        self.post_work(
            conn,
            ConnectionWork::SecondAttach {
                link: handle.clone(),
                source,
                target,
            },
        );
        if grant_credit {
            self.post_credit(conn, &handle, capacity);
        }
    }

    /// Refuse a first attach: the link is forgotten and a detach carrying
    /// the condition goes back to the peer
    fn reject_link(&mut self, id: LinkId, condition: Condition) {
        let Some(link) = self.links.remove(&id) else {
            return;
        };
        let conn = link.connection_id();
        if let Some(connection) = self.connections.get_mut(&conn) {
            connection.remove_link(id);
        }
        self.forget_queued(&link.handle);
        link.handle.mark_detached();
        self.stats.links_rejected += 1;
        debug!(
            conn = %conn,
            link = %link.handle.name(),
            condition = %condition,
            "Attach rejected"
        );

        self.post_work(
            conn,
            ConnectionWork::Detach {
                link: link.handle,
                error: Some(LinkError::from(condition)),
            },
        );
    }

    /// Hand a link-routed attach to the route layer
    fn forward_link(&mut self, id: LinkId, key: AddressKey, source: Terminus, target: Terminus) {
        let Some(link) = self.links.get_mut(&id) else {
            return;
        };
        link.routed = true;
        let handle = link.handle.clone();
        self.stats.links_forwarded += 1;
        debug!(link = %handle.name(), key = %key, "Attach matched link route, forwarding");

        self.emit(RoutingEvent::ForwardAttach {
            link: handle,
            key,
            source,
            target,
        });
    }

    fn handle_second_attach(&mut self, id: LinkId, _source: Terminus, _target: Terminus) {
        let Some(link) = self.links.get_mut(&id) else {
            warn!(link = %id, "Second attach for unknown link ignored");
            return;
        };
        if link.state != LinkState::AttachPending {
            debug!(link = %link.handle.name(), state = ?link.state, "Unexpected second attach ignored");
            return;
        }

        link.state = LinkState::Attached;
        let handle = link.handle.clone();
        let link_type = link.link_type;
        let capacity = link.capacity;
        let conn = link.connection_id();
        self.stats.links_attached += 1;
        debug!(link = %handle.name(), link_type = %link_type, "Second attach");

        let mask_bit = self.connections.get(&conn).and_then(|c| c.mask_bit);
        match (link_type, handle.direction()) {
            (_, Direction::Incoming) => self.post_credit(conn, &handle, capacity),
            (LinkType::Control, Direction::Outgoing) => {
                if let Some(bit) = mask_bit {
                    self.bind_control_link(id, bit);
                }
            }
            (LinkType::RouterData, Direction::Outgoing) => {
                if let Some(bit) = mask_bit {
                    self.bind_data_link(id, bit);
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // Detach
    // ------------------------------------------------------------------------

    fn handle_detach(&mut self, id: LinkId, detach_type: DetachType, error: Option<LinkError>) {
        let Some(link) = self.links.remove(&id) else {
            debug!(link = %id, "Detach for unknown link ignored");
            return;
        };
        if let Some(error) = &error {
            debug!(link = %link.handle.name(), error = %error, "Peer detached with error");
        }
        if let Some(connection) = self.connections.get_mut(&link.connection_id()) {
            connection.remove_link(id);
        }
        self.teardown_link(link, detach_type);
    }

    /// Unbind a link that has already left the arena, then run the GC check
    fn teardown_link(&mut self, link: Link, detach_type: DetachType) {
        let id = link.handle.id();
        let direction = link.handle.direction();

        let mut was_local = false;
        if let Some(addr) = link.owning_addr.and_then(|addr| self.addresses.get_mut(addr)) {
            match direction {
                Direction::Incoming => {
                    addr.remove_inlink(id);
                }
                Direction::Outgoing => was_local = addr.remove_rlink(id),
            }
        }

        match (link.link_type, direction) {
            (LinkType::Control, Direction::Outgoing) => {
                if let Some(bit) = take_slot(&mut self.control_links, id) {
                    debug!(link = %link.handle.name(), mask_bit = bit, "Control link lost");
                    self.emit(RoutingEvent::LinkLost { mask_bit: bit });
                }
            }
            (LinkType::RouterData, Direction::Outgoing) => {
                take_slot(&mut self.data_links, id);
            }
            _ => {}
        }

        self.forget_queued(&link.handle);
        if detach_type != DetachType::Lost {
            self.post_work(
                link.connection_id(),
                ConnectionWork::Detach {
                    link: link.handle.clone(),
                    error: None,
                },
            );
        }

        link.handle.mark_detached();
        self.stats.links_detached += 1;
        debug!(
            link = %link.handle.name(),
            detach_type = ?detach_type,
            "Link detached"
        );

        if let Some(addr) = link.owning_addr {
            let outcome = self.addresses.check(addr, was_local);
            self.report_gc(outcome);
        }
    }

    fn handle_deliveries_ready(&mut self, id: LinkId) {
        let Some(link) = self.links.get(&id) else {
            debug!(link = %id, "Deliveries ready on unknown link ignored");
            return;
        };
        if link.state != LinkState::Attached || link.handle.direction() != Direction::Outgoing {
            debug!(link = %link.handle.name(), "Deliveries ready on link that cannot push ignored");
            return;
        }
        let handle = link.handle.clone();
        self.post_push(handle.connection_id(), &handle);
    }

    // ------------------------------------------------------------------------
    // Route-table hooks
    // ------------------------------------------------------------------------

    fn handle_add_link_route(&mut self, prefix: &str, direction: Direction) {
        let key = AddressKey::link_route(prefix, direction);
        let (addr, created) = self.addresses.lookup_or_insert(key, Semantics::LinkBalanced);
        if let Some(address) = self.addresses.get_mut(addr) {
            address.set_block_deletion(true);
        }
        info!(prefix, direction = %direction, created, "Link route configured");
    }

    fn handle_remove_link_route(&mut self, prefix: &str, direction: Direction) {
        let key = AddressKey::link_route(prefix, direction);
        let Some(addr) = self.addresses.lookup(&key) else {
            warn!(prefix, direction = %direction, "Removal of unknown link route ignored");
            return;
        };
        if let Some(address) = self.addresses.get_mut(addr) {
            address.set_block_deletion(false);
        }
        let outcome = self.addresses.check(addr, false);
        info!(prefix, direction = %direction, "Link route removed");
        self.report_gc(outcome);
    }

    fn handle_subscribe(&mut self, id: SubscriptionId, address: &str, semantics: Semantics) {
        let key = AddressKey::for_address(address, &self.config.identity);
        let (addr, _) = self.addresses.lookup_or_insert(key, semantics);
        if let Some(record) = self.addresses.get_mut(addr) {
            record.add_subscription(id);
        }
        self.subscriptions.insert(id, addr);
        debug!(subscription = %id, address, "Subscribed");
    }

    fn handle_unsubscribe(&mut self, id: SubscriptionId) {
        let Some(addr) = self.subscriptions.remove(&id) else {
            warn!(subscription = %id, "Unsubscribe for unknown subscription ignored");
            return;
        };
        if let Some(record) = self.addresses.get_mut(addr) {
            record.remove_subscription(id);
        }
        let outcome = self.addresses.check(addr, false);
        debug!(subscription = %id, "Unsubscribed");
        self.report_gc(outcome);
    }

    fn handle_map_destination(&mut self, key: AddressKey, mask_bit: MaskBit) {
        if mask_bit >= self.mask_bits.capacity() {
            warn!(key = %key, mask_bit, "Destination mapped to out-of-range mask bit ignored");
            return;
        }
        let (addr, _) = self.addresses.lookup_or_insert(key, Semantics::default());
        if let Some(record) = self.addresses.get_mut(addr) {
            record.add_rnode(mask_bit);
            debug!(key = %record.key(), mask_bit, "Destination mapped");
        }
    }

    fn handle_unmap_destination(&mut self, key: &AddressKey, mask_bit: MaskBit) {
        let Some(addr) = self.addresses.lookup(key) else {
            warn!(key = %key, mask_bit, "Unmap for unknown address ignored");
            return;
        };
        if let Some(record) = self.addresses.get_mut(addr) {
            record.remove_rnode(mask_bit);
        }
        let outcome = self.addresses.check(addr, false);
        debug!(key = %key, mask_bit, "Destination unmapped");
        self.report_gc(outcome);
    }
}

/// Clear the slot holding `link`, returning its mask bit
fn take_slot(slots: &mut [Option<LinkId>], link: LinkId) -> Option<MaskBit> {
    let bit = slots.iter().position(|slot| *slot == Some(link))?;
    slots[bit] = None;
    Some(bit)
}
