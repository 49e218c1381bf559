//! Property-based tests for the address table and mask-bit pool
//!
//! Random sequences of membership changes are applied to a small key space
//! and checked against a simple model: an address exists exactly while one
//! of its lists is non-empty or deletion is blocked, and a mobile-removed
//! notice fires once per emptying of `rlinks`.

use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use switchyard_core::{
    AddressKey, AddressTable, KeyPrefix, LinkId, MaskBitPool, Semantics, SubscriptionId,
};

const KEYS: [&str; 3] = ["orders", "billing", "audit"];

#[derive(Debug, Clone, Copy)]
enum List {
    Rlinks,
    Inlinks,
    Subscriptions,
    Rnodes,
}

#[derive(Debug, Clone)]
enum Op {
    Add(usize, List, u64),
    Remove(usize, List, u64),
    Block(usize, bool),
}

#[derive(Debug, Default)]
struct ModelAddress {
    lists: [BTreeSet<u64>; 4],
    blocked: bool,
}

impl ModelAddress {
    fn collectable(&self) -> bool {
        self.lists.iter().all(BTreeSet::is_empty) && !self.blocked
    }
}

fn arb_list() -> impl Strategy<Value = List> {
    prop_oneof![
        Just(List::Rlinks),
        Just(List::Inlinks),
        Just(List::Subscriptions),
        Just(List::Rnodes),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..KEYS.len(), arb_list(), 0u64..4).prop_map(|(k, l, m)| Op::Add(k, l, m)),
        (0..KEYS.len(), arb_list(), 0u64..4).prop_map(|(k, l, m)| Op::Remove(k, l, m)),
        (0..KEYS.len(), any::<bool>()).prop_map(|(k, b)| Op::Block(k, b)),
    ]
}

fn key(idx: usize) -> AddressKey {
    AddressKey::new(KeyPrefix::Mobile, KEYS[idx])
}

fn list_index(list: List) -> usize {
    match list {
        List::Rlinks => 0,
        List::Inlinks => 1,
        List::Subscriptions => 2,
        List::Rnodes => 3,
    }
}

proptest! {
    /// Property: the table agrees with the model after every operation
    #[test]
    fn gc_invariant_holds(ops in prop::collection::vec(arb_op(), 1..80)) {
        let mut table = AddressTable::new();
        let mut model: HashMap<usize, ModelAddress> = HashMap::new();
        let mut expected_notices = 0usize;
        let mut notices = 0usize;

        for op in ops {
            match op {
                Op::Add(k, list, member) => {
                    let (id, _) = table.lookup_or_insert(key(k), Semantics::AnycastBalanced);
                    let addr = table.get_mut(id).unwrap();
                    match list {
                        List::Rlinks => { addr.add_rlink(LinkId::new(member)); }
                        List::Inlinks => addr.add_inlink(LinkId::new(member)),
                        List::Subscriptions => addr.add_subscription(SubscriptionId::new(member)),
                        List::Rnodes => addr.add_rnode(member as usize),
                    }
                    model.entry(k).or_default().lists[list_index(list)].insert(member);
                }
                Op::Remove(k, list, member) => {
                    let Some(id) = table.lookup(&key(k)) else { continue };
                    let addr = table.get_mut(id).unwrap();
                    let removed = match list {
                        List::Rlinks => addr.remove_rlink(LinkId::new(member)),
                        List::Inlinks => addr.remove_inlink(LinkId::new(member)),
                        List::Subscriptions => addr.remove_subscription(SubscriptionId::new(member)),
                        List::Rnodes => addr.remove_rnode(member as usize),
                    };
                    let was_local = removed && matches!(list, List::Rlinks);
                    let outcome = table.check(id, was_local);
                    if outcome.mobile_removed.is_some() {
                        notices += 1;
                    }

                    let entry = model.entry(k).or_default();
                    let model_removed = entry.lists[list_index(list)].remove(&member);
                    prop_assert_eq!(removed, model_removed);
                    if was_local && entry.lists[0].is_empty() {
                        expected_notices += 1;
                    }
                    if entry.collectable() {
                        model.remove(&k);
                    }
                }
                Op::Block(k, blocked) => {
                    let Some(id) = table.lookup(&key(k)) else { continue };
                    table.get_mut(id).unwrap().set_block_deletion(blocked);
                    table.check(id, false);

                    let entry = model.entry(k).or_default();
                    entry.blocked = blocked;
                    if entry.collectable() {
                        model.remove(&k);
                    }
                }
            }

            for idx in 0..KEYS.len() {
                prop_assert_eq!(table.lookup(&key(idx)).is_some(), model.contains_key(&idx));
            }
            for addr in table.iter() {
                prop_assert!(!addr.is_collectable());
            }
        }

        prop_assert_eq!(notices, expected_notices);
    }

    /// Property: claimed mask bits are unique and a released bit is reused first
    #[test]
    fn mask_bits_unique(capacity in 1usize..200, releases in prop::collection::vec(any::<prop::sample::Index>(), 0..20)) {
        let mut pool = MaskBitPool::new(capacity);
        let mut held: Vec<usize> = Vec::new();
        while let Some(bit) = pool.claim() {
            held.push(bit);
        }
        let unique: HashSet<_> = held.iter().copied().collect();
        prop_assert_eq!(unique.len(), capacity);
        prop_assert_eq!(held.len(), capacity);

        for index in releases {
            let bit = held[index.index(held.len())];
            pool.release(bit).unwrap();
            prop_assert_eq!(pool.claim(), Some(bit));
            prop_assert_eq!(pool.claim(), None);
        }
    }
}
