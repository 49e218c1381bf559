//! Core State
//!
//! Everything the core task owns: the address table, the connection
//! registry, the link arena, mask-bit wiring and statistics. Only the core
//! task touches it, so nothing here is locked.

use crate::action::IdAllocator;
use crate::connection::ConnectionHandle;
use crate::link::LinkHandle;
use crate::routing::{RoutingEvent, RoutingEventSender};
use crate::work::ConnectionWork;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;
use switchyard_core::{
    AddressId, AddressKey, AddressTable, ConnectionId, ConnectionRole, Direction, DiscriminatorGenerator,
    GcOutcome, LinkId, LinkState, LinkType, MaskBit, MaskBitPool, RouterConfig, Semantics,
    SubscriptionId, Terminus, HELLO_ADDRESS,
};
use tracing::{debug, trace};

// ----------------------------------------------------------------------------
// Records
// ----------------------------------------------------------------------------

/// Core-side record of an open connection
pub(crate) struct Connection {
    pub(crate) handle: ConnectionHandle,
    pub(crate) mask_bit: Option<MaskBit>,
    pub(crate) links: SmallVec<[LinkId; 4]>,
}

impl Connection {
    pub(crate) fn new(handle: ConnectionHandle, mask_bit: Option<MaskBit>) -> Self {
        Self {
            handle,
            mask_bit,
            links: SmallVec::new(),
        }
    }

    /// Inter-router role with a mask bit actually assigned
    pub(crate) fn inter_router_capable(&self) -> bool {
        self.handle.role() == ConnectionRole::InterRouter && self.mask_bit.is_some()
    }

    pub(crate) fn remove_link(&mut self, link: LinkId) {
        self.links.retain(|id| *id != link);
    }
}

/// Core-side record of a link
pub(crate) struct Link {
    pub(crate) handle: LinkHandle,
    pub(crate) link_type: LinkType,
    pub(crate) state: LinkState,
    pub(crate) owning_addr: Option<AddressId>,
    pub(crate) capacity: u32,
    pub(crate) routed: bool,
}

impl Link {
    pub(crate) fn new(handle: LinkHandle, link_type: LinkType, state: LinkState, capacity: u32) -> Self {
        Self {
            handle,
            link_type,
            state,
            owning_addr: None,
            capacity,
            routed: false,
        }
    }

    pub(crate) fn connection_id(&self) -> ConnectionId {
        self.handle.connection_id()
    }
}

/// Counters kept by the core task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreStats {
    pub actions_processed: u64,
    pub actions_discarded: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub mask_bit_exhaustions: u64,
    pub links_created: u64,
    pub links_attached: u64,
    pub links_rejected: u64,
    pub links_forwarded: u64,
    pub links_detached: u64,
    pub activations: u64,
    pub work_discarded: u64,
}

// ----------------------------------------------------------------------------
// Core State
// ----------------------------------------------------------------------------

/// Routing state owned by the core task
pub struct CoreState {
    pub(crate) config: RouterConfig,
    pub(crate) addresses: AddressTable,
    pub(crate) connections: HashMap<ConnectionId, Connection>,
    /// Connection ids in the order their open was processed
    pub(crate) open_order: Vec<ConnectionId>,
    pub(crate) links: HashMap<LinkId, Link>,
    pub(crate) mask_bits: MaskBitPool,
    pub(crate) control_links: Vec<Option<LinkId>>,
    pub(crate) data_links: Vec<Option<LinkId>>,
    pub(crate) hello: AddressId,
    pub(crate) generator: DiscriminatorGenerator,
    pub(crate) subscriptions: HashMap<SubscriptionId, AddressId>,
    pub(crate) ids: Arc<IdAllocator>,
    pub(crate) routing: RoutingEventSender,
    pub(crate) stats: CoreStats,
}

impl CoreState {
    pub(crate) fn new(config: RouterConfig, ids: Arc<IdAllocator>, routing: RoutingEventSender) -> Self {
        let mut addresses = AddressTable::new();
        let (hello, _) =
            addresses.lookup_or_insert(AddressKey::local(HELLO_ADDRESS), Semantics::MulticastFlood);
        if let Some(addr) = addresses.get_mut(hello) {
            addr.set_block_deletion(true);
        }

        let mask_bits = MaskBitPool::new(config.inter_router.max_connections);
        let slots = mask_bits.capacity();
        let generator = DiscriminatorGenerator::new(config.discriminator_seed);

        Self {
            config,
            addresses,
            connections: HashMap::new(),
            open_order: Vec::new(),
            links: HashMap::new(),
            mask_bits,
            control_links: vec![None; slots],
            data_links: vec![None; slots],
            hello,
            generator,
            subscriptions: HashMap::new(),
            ids,
            routing,
            stats: CoreStats::default(),
        }
    }

    pub fn stats(&self) -> &CoreStats {
        &self.stats
    }

    pub(crate) fn into_stats(self) -> CoreStats {
        self.stats
    }

    // ------------------------------------------------------------------------
    // Work queue posting
    // ------------------------------------------------------------------------

    /// Run `post` against a connection's queue and activate on the empty to
    /// non-empty edge
    fn with_work_queue<F>(&mut self, conn: ConnectionId, post: F)
    where
        F: FnOnce(&ConnectionHandle) -> bool,
    {
        let Some(connection) = self.connections.get(&conn) else {
            trace!(conn = %conn, "Work for closed connection dropped");
            return;
        };
        if post(&connection.handle) {
            self.stats.activations += 1;
            connection.handle.activate();
        }
    }

    pub(crate) fn post_work(&mut self, conn: ConnectionId, work: ConnectionWork) {
        self.with_work_queue(conn, |handle| handle.enqueue(work));
    }

    pub(crate) fn post_credit(&mut self, conn: ConnectionId, link: &LinkHandle, credit: u32) {
        self.with_work_queue(conn, |handle| handle.add_credit(link, credit));
    }

    pub(crate) fn post_push(&mut self, conn: ConnectionId, link: &LinkHandle) {
        self.with_work_queue(conn, |handle| handle.add_push(link));
    }

    /// Drop undrained credit and pushes for a link leaving the arena
    pub(crate) fn forget_queued(&mut self, link: &LinkHandle) {
        let Some(connection) = self.connections.get(&link.connection_id()) else {
            return;
        };
        let dropped = connection.handle.forget_link(link);
        if dropped > 0 {
            trace!(link = %link.name(), dropped, "Queued credit and pushes dropped");
            self.stats.work_discarded += dropped as u64;
        }
    }

    pub(crate) fn emit(&self, event: RoutingEvent) {
        trace!(event = event.name(), "Routing event");
        self.routing.emit(event);
    }

    /// Forward what a GC check did to the route layer
    pub(crate) fn report_gc(&self, outcome: GcOutcome) {
        if let Some(key) = outcome.mobile_removed {
            debug!(key = %key, "Last local consumer of mobile address gone");
            self.emit(RoutingEvent::MobileRemoved { key });
        }
    }

    // ------------------------------------------------------------------------
    // Core-initiated links
    // ------------------------------------------------------------------------

    /// Create a link on `conn` and queue its first attach
    pub(crate) fn create_link(
        &mut self,
        conn: ConnectionId,
        link_type: LinkType,
        direction: Direction,
        source: Terminus,
        target: Terminus,
    ) -> Option<LinkId> {
        let connection = self.connections.get_mut(&conn)?;
        let id = self.ids.next_link();
        let name = self.generator.link_name(&self.config.links.name_label);
        let options = connection.handle.options();
        let handle = LinkHandle::new(
            id,
            conn,
            name,
            direction,
            (options.strip_annotations_in, options.strip_annotations_out),
        )
        .with_type(link_type);

        connection.links.push(id);
        self.links.insert(
            id,
            Link::new(
                handle.clone(),
                link_type,
                LinkState::AttachPending,
                self.config.links.capacity,
            ),
        );
        self.stats.links_created += 1;
        debug!(
            conn = %conn,
            link = %handle.name(),
            link_type = %link_type,
            direction = %direction,
            "Link created"
        );

        self.post_work(
            conn,
            ConnectionWork::FirstAttach {
                link: handle,
                source,
                target,
            },
        );
        Some(id)
    }

    // ------------------------------------------------------------------------
    // Address bindings
    // ------------------------------------------------------------------------

    pub(crate) fn bind_inlink(&mut self, link: LinkId, addr: AddressId) {
        if let Some(address) = self.addresses.get_mut(addr) {
            address.add_inlink(link);
        }
        if let Some(record) = self.links.get_mut(&link) {
            record.owning_addr = Some(addr);
        }
    }

    /// Bind a local consumer, announcing the first one of a mobile address
    pub(crate) fn bind_rlink(&mut self, link: LinkId, addr: AddressId) {
        let mut added = None;
        if let Some(address) = self.addresses.get_mut(addr) {
            if address.add_rlink(link) && address.key().is_mobile() {
                added = Some(address.key().clone());
            }
        }
        if let Some(record) = self.links.get_mut(&link) {
            record.owning_addr = Some(addr);
        }
        if let Some(key) = added {
            debug!(key = %key, "First local consumer of mobile address");
            self.emit(RoutingEvent::MobileAdded { key });
        }
    }

    /// Outgoing control link: consumer of hello and owner of the control slot
    pub(crate) fn bind_control_link(&mut self, link: LinkId, mask_bit: MaskBit) {
        let hello = self.hello;
        self.bind_rlink(link, hello);
        if let Some(slot) = self.control_links.get_mut(mask_bit) {
            *slot = Some(link);
        }
    }

    pub(crate) fn bind_data_link(&mut self, link: LinkId, mask_bit: MaskBit) {
        if let Some(slot) = self.data_links.get_mut(mask_bit) {
            *slot = Some(link);
        }
    }
}
