//! Link terminus description
//!
//! A terminus is what the transport layer hands the core for each end of a
//! link: an optional address, the capabilities the peer advertised, and the
//! dynamic-node flag with its optional dynamic-node-properties address. The
//! core only reads it, except for writing a generated address back into a
//! dynamic terminus.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Capability marking the inter-router control link
pub const CAPABILITY_ROUTER_CONTROL: &str = "qd.router";

/// Capability marking the inter-router data link
pub const CAPABILITY_ROUTER_DATA: &str = "qd.router-data";

/// Source or target of a link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminus {
    address: Option<String>,
    capabilities: SmallVec<[String; 2]>,
    dynamic: bool,
    dynamic_node_address: Option<String>,
}

impl Terminus {
    /// Terminus without an address
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Terminus naming a fixed address
    pub fn with_address<A: Into<String>>(address: A) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    /// Terminus requesting a dynamically assigned address
    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            ..Self::default()
        }
    }

    /// Terminus for the inter-router control link
    pub fn router_control() -> Self {
        Self::anonymous().with_capability(CAPABILITY_ROUTER_CONTROL)
    }

    /// Terminus for the inter-router data link
    pub fn router_data() -> Self {
        Self::anonymous().with_capability(CAPABILITY_ROUTER_DATA)
    }

    /// Add a capability
    pub fn with_capability<C: Into<String>>(mut self, capability: C) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Set the address carried in the dynamic-node-properties
    pub fn with_dynamic_node_address<A: Into<String>>(mut self, address: A) -> Self {
        self.dynamic_node_address = Some(address.into());
        self
    }

    /// The terminus address, if any
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Overwrite the address, used when a dynamic address is generated
    pub fn set_address<A: Into<String>>(&mut self, address: A) {
        self.address = Some(address.into());
    }

    /// Address carried in the dynamic-node-properties, if any
    pub fn dynamic_node_address(&self) -> Option<&str> {
        self.dynamic_node_address.as_deref()
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Anonymous means neither an address nor a dynamic request
    pub fn is_anonymous(&self) -> bool {
        !self.dynamic && self.address.is_none()
    }
}
