//! Terminus address resolution
//!
//! Maps the address of a link's local terminus onto the address table. The
//! order matters:
//!
//! 1. dynamic terminus: link-route lookup of the dynamic-node address, or a
//!    freshly generated temporary address
//! 2. anonymous terminus: nothing to resolve
//! 3. link-route prefix match on the direction-prefixed key
//! 4. exact match, optionally creating the address

use crate::address_key::{AddressKey, KeyPrefix};
use crate::address_table::AddressTable;
use crate::config::RouterIdentity;
use crate::discriminator::DiscriminatorGenerator;
use crate::terminus::Terminus;
use crate::types::{AddressId, Direction, Semantics};
use tracing::{debug, trace};

/// What a terminus resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No address and not dynamic
    Anonymous,
    /// Nothing matched and nothing was created
    NoRoute,
    /// A configured link-route prefix matched; the attach is forwarded
    LinkRoute { addr: AddressId, key: AddressKey },
    /// Message-routed address, possibly created by this call
    Local { addr: AddressId, created: bool },
}

/// Flags controlling resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    /// Create the address when no exact match exists
    pub create: bool,
    /// Generate a temporary address for a dynamic terminus
    pub accept_dynamic: bool,
}

impl ResolveOptions {
    pub const fn new(create: bool, accept_dynamic: bool) -> Self {
        Self {
            create,
            accept_dynamic,
        }
    }
}

/// Resolve `terminus` for a link of `direction`
///
/// A generated temporary address is written back into the terminus.
pub fn resolve_terminus(
    table: &mut AddressTable,
    generator: &mut DiscriminatorGenerator,
    identity: &RouterIdentity,
    direction: Direction,
    terminus: &mut Terminus,
    options: ResolveOptions,
) -> Resolution {
    let route_prefix = KeyPrefix::link_route(direction);

    if terminus.is_dynamic() {
        if let Some(dnp_address) = terminus.dynamic_node_address() {
            let route_key = AddressKey::for_address(dnp_address, identity).with_prefix(route_prefix);
            return match table.lookup_prefix(&route_key) {
                Some(addr) => Resolution::LinkRoute { addr, key: route_key },
                None => Resolution::NoRoute,
            };
        }

        if !options.accept_dynamic {
            return Resolution::NoRoute;
        }

        loop {
            let temp = generator.temp_address(identity);
            let key = AddressKey::for_address(&temp, identity);
            match table.insert(key, Semantics::AnycastClosest) {
                Some(addr) => {
                    debug!(address = %temp, addr = %addr, "Dynamic address generated");
                    terminus.set_address(temp);
                    return Resolution::Local {
                        addr,
                        created: true,
                    };
                }
                None => trace!(address = %temp, "Dynamic address collision, retrying"),
            }
        }
    }

    let Some(address) = terminus.address() else {
        return Resolution::Anonymous;
    };

    let key = AddressKey::for_address(address, identity);
    let route_key = key.with_prefix(route_prefix);
    if let Some(addr) = table.lookup_prefix(&route_key) {
        return Resolution::LinkRoute { addr, key: route_key };
    }

    if let Some(addr) = table.lookup(&key) {
        return Resolution::Local {
            addr,
            created: false,
        };
    }

    if options.create {
        let (addr, created) = table.lookup_or_insert(key, Semantics::AnycastBalanced);
        return Resolution::Local { addr, created };
    }

    Resolution::NoRoute
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (AddressTable, DiscriminatorGenerator, RouterIdentity) {
        (
            AddressTable::new(),
            DiscriminatorGenerator::new(Some(11)),
            RouterIdentity::new("0", "Router.A"),
        )
    }

    #[test]
    fn test_anonymous_terminus() {
        let (mut table, mut generator, identity) = setup();
        let mut terminus = Terminus::anonymous();
        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Incoming,
            &mut terminus,
            ResolveOptions::new(true, true),
        );
        assert_eq!(resolution, Resolution::Anonymous);
        assert!(table.is_empty());
    }

    #[test]
    fn test_exact_match_or_create() {
        let (mut table, mut generator, identity) = setup();
        let mut terminus = Terminus::with_address("service.orders");

        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Incoming,
            &mut terminus,
            ResolveOptions::new(false, false),
        );
        assert_eq!(resolution, Resolution::NoRoute);

        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Incoming,
            &mut terminus,
            ResolveOptions::new(true, false),
        );
        let Resolution::Local { addr, created } = resolution else {
            panic!("expected local resolution, got {resolution:?}");
        };
        assert!(created);
        let record = table.get(addr).unwrap();
        assert_eq!(record.key().as_str(), "Mservice.orders");
        assert_eq!(record.semantics(), Semantics::AnycastBalanced);

        let again = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Outgoing,
            &mut terminus,
            ResolveOptions::new(true, false),
        );
        assert_eq!(again, Resolution::Local { addr, created: false });
    }

    #[test]
    fn test_link_route_takes_precedence_and_creates_nothing() {
        let (mut table, mut generator, identity) = setup();
        let route = table
            .insert(AddressKey::link_route("broker", Direction::Outgoing), Semantics::LinkBalanced)
            .unwrap();

        let mut terminus = Terminus::with_address("broker.queue1");
        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Outgoing,
            &mut terminus,
            ResolveOptions::new(true, true),
        );
        assert_eq!(
            resolution,
            Resolution::LinkRoute {
                addr: route,
                key: AddressKey::parse("Dbroker.queue1").unwrap(),
            }
        );
        assert_eq!(table.len(), 1);

        // Opposite direction does not see the outgoing route
        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Incoming,
            &mut terminus,
            ResolveOptions::new(false, false),
        );
        assert_eq!(resolution, Resolution::NoRoute);
    }

    #[test]
    fn test_dynamic_generates_temp_address() {
        let (mut table, mut generator, identity) = setup();
        let mut terminus = Terminus::dynamic();

        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Outgoing,
            &mut terminus,
            ResolveOptions::new(true, true),
        );
        let Resolution::Local { addr, created: true } = resolution else {
            panic!("expected created address, got {resolution:?}");
        };

        let address = terminus.address().unwrap();
        assert!(address.starts_with("amqp:/_topo/0/Router.A/temp."));
        let record = table.get(addr).unwrap();
        assert_eq!(record.semantics(), Semantics::AnycastClosest);
        assert_eq!(record.key(), &AddressKey::for_address(address, &identity));
    }

    #[test]
    fn test_dynamic_retries_on_collision() {
        let (mut table, generator, identity) = setup();

        // Pre-seed the first address the generator will produce
        let mut upcoming = generator.clone();
        let first = upcoming.temp_address(&identity);
        let taken = table
            .insert(AddressKey::for_address(&first, &identity), Semantics::AnycastBalanced)
            .unwrap();

        let mut generator = generator;
        let mut terminus = Terminus::dynamic();
        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Outgoing,
            &mut terminus,
            ResolveOptions::new(true, true),
        );
        let Resolution::Local { addr, created: true } = resolution else {
            panic!("expected created address, got {resolution:?}");
        };
        assert_ne!(addr, taken);
        assert_ne!(terminus.address(), Some(first.as_str()));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_dynamic_refused_or_routed_by_node_address() {
        let (mut table, mut generator, identity) = setup();
        let mut terminus = Terminus::dynamic();
        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Incoming,
            &mut terminus,
            ResolveOptions::new(true, false),
        );
        assert_eq!(resolution, Resolution::NoRoute);

        let route = table
            .insert(AddressKey::link_route("broker", Direction::Incoming), Semantics::LinkBalanced)
            .unwrap();
        let mut terminus = Terminus::dynamic().with_dynamic_node_address("broker.tmp");
        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Incoming,
            &mut terminus,
            ResolveOptions::new(true, true),
        );
        assert!(matches!(resolution, Resolution::LinkRoute { addr, .. } if addr == route));

        let mut terminus = Terminus::dynamic().with_dynamic_node_address("elsewhere");
        let resolution = resolve_terminus(
            &mut table,
            &mut generator,
            &identity,
            Direction::Incoming,
            &mut terminus,
            ResolveOptions::new(true, true),
        );
        assert_eq!(resolution, Resolution::NoRoute);
        assert!(terminus.address().is_none());
    }
}
