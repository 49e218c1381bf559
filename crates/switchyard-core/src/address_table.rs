//! Address table
//!
//! Owns every `Address` record. Records are stored in an arena keyed by
//! `AddressId` (ids grow monotonically, so iteration follows insertion
//! order) with a hash index from `AddressKey` to id for exact and prefix
//! lookups. Membership lists hold ids only; nothing outside the table holds
//! a reference into a record.

use crate::address_key::AddressKey;
use crate::types::{AddressId, LinkId, MaskBit, Semantics, SubscriptionId};
use core::borrow::Borrow;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use tracing::debug;

impl Borrow<str> for AddressKey {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

// ----------------------------------------------------------------------------
// Address Record
// ----------------------------------------------------------------------------

/// One routable destination
#[derive(Debug, Clone)]
pub struct Address {
    id: AddressId,
    key: AddressKey,
    semantics: Semantics,
    /// Outgoing endpoint links: local consumers
    rlinks: SmallVec<[LinkId; 4]>,
    /// Incoming endpoint links: local producers
    inlinks: SmallVec<[LinkId; 4]>,
    /// In-process consumers
    subscriptions: SmallVec<[SubscriptionId; 2]>,
    /// Remote routers with a presence for this address
    rnodes: SmallVec<[MaskBit; 4]>,
    waypoint: bool,
    block_deletion: bool,
}

impl Address {
    fn new(id: AddressId, key: AddressKey, semantics: Semantics) -> Self {
        Self {
            id,
            key,
            semantics,
            rlinks: SmallVec::new(),
            inlinks: SmallVec::new(),
            subscriptions: SmallVec::new(),
            rnodes: SmallVec::new(),
            waypoint: false,
            block_deletion: false,
        }
    }

    pub fn id(&self) -> AddressId {
        self.id
    }

    pub fn key(&self) -> &AddressKey {
        &self.key
    }

    pub fn semantics(&self) -> Semantics {
        self.semantics
    }

    pub fn rlinks(&self) -> &[LinkId] {
        &self.rlinks
    }

    pub fn inlinks(&self) -> &[LinkId] {
        &self.inlinks
    }

    pub fn subscriptions(&self) -> &[SubscriptionId] {
        &self.subscriptions
    }

    pub fn rnodes(&self) -> &[MaskBit] {
        &self.rnodes
    }

    pub fn is_waypoint(&self) -> bool {
        self.waypoint
    }

    pub fn is_deletion_blocked(&self) -> bool {
        self.block_deletion
    }

    pub fn set_waypoint(&mut self, waypoint: bool) {
        self.waypoint = waypoint;
    }

    pub fn set_block_deletion(&mut self, block: bool) {
        self.block_deletion = block;
    }

    /// Add a local consumer; returns true when it is the first one
    pub fn add_rlink(&mut self, link: LinkId) -> bool {
        push_unique(&mut self.rlinks, link);
        self.rlinks.len() == 1
    }

    /// Remove a local consumer; returns true if it was present
    pub fn remove_rlink(&mut self, link: LinkId) -> bool {
        remove_item(&mut self.rlinks, link)
    }

    pub fn add_inlink(&mut self, link: LinkId) {
        push_unique(&mut self.inlinks, link);
    }

    pub fn remove_inlink(&mut self, link: LinkId) -> bool {
        remove_item(&mut self.inlinks, link)
    }

    pub fn add_subscription(&mut self, subscription: SubscriptionId) {
        push_unique(&mut self.subscriptions, subscription);
    }

    pub fn remove_subscription(&mut self, subscription: SubscriptionId) -> bool {
        remove_item(&mut self.subscriptions, subscription)
    }

    pub fn add_rnode(&mut self, mask_bit: MaskBit) {
        push_unique(&mut self.rnodes, mask_bit);
    }

    pub fn remove_rnode(&mut self, mask_bit: MaskBit) -> bool {
        remove_item(&mut self.rnodes, mask_bit)
    }

    /// No destinations, no producers, and nothing vetoing deletion
    pub fn is_collectable(&self) -> bool {
        self.rlinks.is_empty()
            && self.inlinks.is_empty()
            && self.subscriptions.is_empty()
            && self.rnodes.is_empty()
            && !self.waypoint
            && !self.block_deletion
    }
}

fn push_unique<A>(list: &mut SmallVec<A>, item: A::Item)
where
    A: smallvec::Array,
    A::Item: PartialEq,
{
    if !list.contains(&item) {
        list.push(item);
    }
}

fn remove_item<A>(list: &mut SmallVec<A>, item: A::Item) -> bool
where
    A: smallvec::Array,
    A::Item: PartialEq,
{
    match list.iter().position(|existing| *existing == item) {
        Some(idx) => {
            list.remove(idx);
            true
        }
        None => false,
    }
}

// ----------------------------------------------------------------------------
// Garbage Collection Outcome
// ----------------------------------------------------------------------------

/// What a GC check did to an address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcOutcome {
    /// Set when the last local consumer of a mobile address went away
    pub mobile_removed: Option<AddressKey>,
    /// The address was dropped from the table
    pub removed: Option<AddressKey>,
}

// ----------------------------------------------------------------------------
// Address Table
// ----------------------------------------------------------------------------

/// Arena of addresses with key index
#[derive(Debug, Default)]
pub struct AddressTable {
    index: HashMap<AddressKey, AddressId>,
    addresses: BTreeMap<AddressId, Address>,
    next_id: u64,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn get(&self, id: AddressId) -> Option<&Address> {
        self.addresses.get(&id)
    }

    pub fn get_mut(&mut self, id: AddressId) -> Option<&mut Address> {
        self.addresses.get_mut(&id)
    }

    /// Exact key lookup
    pub fn lookup(&self, key: &AddressKey) -> Option<AddressId> {
        self.index.get(key.as_str()).copied()
    }

    pub fn contains_key(&self, key: &AddressKey) -> bool {
        self.index.contains_key(key.as_str())
    }

    /// Longest entry that equals the key or prefixes it at a `.` or `/`
    /// segment boundary. The prefix character always takes part in the match.
    pub fn lookup_prefix(&self, key: &AddressKey) -> Option<AddressId> {
        let raw = key.as_str();
        let mut end = raw.len();
        loop {
            if let Some(id) = self.index.get(&raw[..end]) {
                return Some(*id);
            }
            match raw[1..end].rfind(|c| c == '.' || c == '/') {
                Some(pos) => end = pos + 1,
                None => return None,
            }
        }
    }

    /// Insert a new address; `None` if the key is already present
    pub fn insert(&mut self, key: AddressKey, semantics: Semantics) -> Option<AddressId> {
        if self.index.contains_key(key.as_str()) {
            return None;
        }
        Some(self.allocate(key, semantics))
    }

    /// Exact lookup, creating the address when it is missing
    pub fn lookup_or_insert(&mut self, key: AddressKey, semantics: Semantics) -> (AddressId, bool) {
        match self.lookup(&key) {
            Some(id) => (id, false),
            None => (self.allocate(key, semantics), true),
        }
    }

    fn allocate(&mut self, key: AddressKey, semantics: Semantics) -> AddressId {
        let id = AddressId::new(self.next_id);
        self.next_id += 1;
        self.index.insert(key.clone(), id);
        debug!(addr = %id, key = %key, semantics = %semantics, "Address created");
        self.addresses.insert(id, Address::new(id, key, semantics));
        id
    }

    /// Addresses in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.addresses.values()
    }

    /// Run the GC check after a membership change
    ///
    /// `was_local` says the change removed an `rlinks` member. Returns what
    /// the caller has to report to the routing layer.
    pub fn check(&mut self, id: AddressId, was_local: bool) -> GcOutcome {
        let mut outcome = GcOutcome::default();
        let Some(addr) = self.addresses.get(&id) else {
            return outcome;
        };

        if was_local && addr.rlinks.is_empty() && addr.key.is_mobile() {
            outcome.mobile_removed = Some(addr.key.clone());
        }

        if addr.is_collectable() {
            if let Some(addr) = self.remove(id) {
                debug!(addr = %id, key = %addr.key, "Address removed");
                outcome.removed = Some(addr.key);
            }
        }

        outcome
    }

    fn remove(&mut self, id: AddressId) -> Option<Address> {
        let addr = self.addresses.remove(&id)?;
        self.index.remove(addr.key.as_str());
        Some(addr)
    }
}
