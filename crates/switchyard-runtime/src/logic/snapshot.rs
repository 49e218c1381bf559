//! Serializable view of the core state, produced by the inspect action

use super::state::{CoreState, CoreStats};
use crate::connection::ConnectionOptions;
use serde::Serialize;
use switchyard_core::{
    Address, AddressKey, ConnectionId, Direction, LinkId, LinkState, LinkType, MaskBit,
    RouterIdentity, Semantics, SubscriptionId,
};

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub options: ConnectionOptions,
    pub mask_bit: Option<MaskBit>,
    pub links: Vec<LinkId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkSnapshot {
    pub id: LinkId,
    pub connection: ConnectionId,
    pub name: String,
    pub direction: Direction,
    pub link_type: LinkType,
    pub state: LinkState,
    pub address: Option<AddressKey>,
    pub capacity: u32,
    pub routed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressSnapshot {
    pub key: AddressKey,
    pub semantics: Semantics,
    pub rlinks: Vec<LinkId>,
    pub inlinks: Vec<LinkId>,
    pub subscriptions: Vec<SubscriptionId>,
    pub rnodes: Vec<MaskBit>,
    pub waypoint: bool,
    pub block_deletion: bool,
}

impl From<&Address> for AddressSnapshot {
    fn from(addr: &Address) -> Self {
        Self {
            key: addr.key().clone(),
            semantics: addr.semantics(),
            rlinks: addr.rlinks().to_vec(),
            inlinks: addr.inlinks().to_vec(),
            subscriptions: addr.subscriptions().to_vec(),
            rnodes: addr.rnodes().to_vec(),
            waypoint: addr.is_waypoint(),
            block_deletion: addr.is_deletion_blocked(),
        }
    }
}

/// Which link holds a per-router slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotSnapshot {
    pub mask_bit: MaskBit,
    pub link: LinkId,
}

/// Point-in-time copy of the routing state
#[derive(Debug, Clone, Serialize)]
pub struct CoreSnapshot {
    pub identity: RouterIdentity,
    /// In open order
    pub connections: Vec<ConnectionSnapshot>,
    /// By link id
    pub links: Vec<LinkSnapshot>,
    /// In insertion order
    pub addresses: Vec<AddressSnapshot>,
    pub control_links: Vec<SlotSnapshot>,
    pub data_links: Vec<SlotSnapshot>,
    pub free_mask_bits: usize,
    pub stats: CoreStats,
}

impl CoreSnapshot {
    /// Address by its raw key, e.g. `"Mservice.orders"`
    pub fn address(&self, key: &str) -> Option<&AddressSnapshot> {
        self.addresses.iter().find(|a| a.key.as_str() == key)
    }

    pub fn link(&self, id: LinkId) -> Option<&LinkSnapshot> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionSnapshot> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn links_on(&self, conn: ConnectionId) -> impl Iterator<Item = &LinkSnapshot> {
        self.links.iter().filter(move |l| l.connection == conn)
    }
}

fn slots(links: &[Option<LinkId>]) -> Vec<SlotSnapshot> {
    links
        .iter()
        .enumerate()
        .filter_map(|(mask_bit, link)| link.map(|link| SlotSnapshot { mask_bit, link }))
        .collect()
}

impl CoreState {
    pub(crate) fn snapshot(&self) -> CoreSnapshot {
        let connections = self
            .open_order
            .iter()
            .filter_map(|id| self.connections.get(id))
            .map(|conn| ConnectionSnapshot {
                id: conn.handle.id(),
                options: conn.handle.options().clone(),
                mask_bit: conn.mask_bit,
                links: conn.links.to_vec(),
            })
            .collect();

        let mut links: Vec<_> = self
            .links
            .values()
            .map(|link| LinkSnapshot {
                id: link.handle.id(),
                connection: link.connection_id(),
                name: link.handle.name().to_string(),
                direction: link.handle.direction(),
                link_type: link.link_type,
                state: link.state,
                address: link
                    .owning_addr
                    .and_then(|addr| self.addresses.get(addr))
                    .map(|addr| addr.key().clone()),
                capacity: link.capacity,
                routed: link.routed,
            })
            .collect();
        links.sort_by_key(|link| link.id);

        CoreSnapshot {
            identity: self.config.identity.clone(),
            connections,
            links,
            addresses: self.addresses.iter().map(AddressSnapshot::from).collect(),
            control_links: slots(&self.control_links),
            data_links: slots(&self.data_links),
            free_mask_bits: self.mask_bits.free_count(),
            stats: self.stats.clone(),
        }
    }
}
