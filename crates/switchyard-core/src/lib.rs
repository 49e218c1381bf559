//! Switchyard Core
//!
//! Runtime-agnostic building blocks of the router control plane:
//! identifiers, termini, address-key encoding, the address table with its
//! garbage-collection rule, the mask-bit pool, discriminator generation and
//! the first-attach policy. Everything here is plain owned data driven by a
//! single writer; the `switchyard-runtime` crate supplies the core task that
//! owns it.

pub mod address_key;
pub mod address_table;
pub mod config;
pub mod discriminator;
pub mod errors;
pub mod mask;
pub mod policy;
pub mod resolve;
pub mod terminus;
pub mod types;

// Re-export commonly used types
pub use address_key::{AddressKey, KeyPrefix};
pub use address_table::{Address, AddressTable, GcOutcome};
pub use config::{InterRouterConfig, LinkConfig, RouterConfig, RouterIdentity, MAX_MASK_BITS};
pub use discriminator::{DiscriminatorGenerator, DISCRIMINATOR_LEN};
pub use errors::{Condition, LinkError, RouterError, RouterResult};
pub use mask::MaskBitPool;
pub use policy::{link_type_for, local_terminus, AttachPolicy};
pub use resolve::{resolve_terminus, Resolution, ResolveOptions};
pub use terminus::{Terminus, CAPABILITY_ROUTER_CONTROL, CAPABILITY_ROUTER_DATA};
pub use types::{
    AddressId, ConnectionId, ConnectionRole, DetachType, Direction, LinkId, LinkState, LinkType,
    MaskBit, Semantics, SubscriptionId,
};

/// Local address of the inter-router hello protocol
pub const HELLO_ADDRESS: &str = "qdhello";
