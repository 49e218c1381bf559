//! Router core configuration
//!
//! All knobs the core reads at start-up live here. Every section has a
//! `Default` so partial configuration files deserialize cleanly.

use crate::errors::{RouterError, RouterResult};
use serde::{Deserialize, Serialize};

/// Upper bound for the mask-bit pool
pub const MAX_MASK_BITS: usize = 1024;

// ----------------------------------------------------------------------------
// Router Identity
// ----------------------------------------------------------------------------

/// Area and router id, embedded in generated addresses and local keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterIdentity {
    /// Routing area this router belongs to
    pub area: String,
    /// Router id, unique within the area
    pub router_id: String,
}

impl Default for RouterIdentity {
    fn default() -> Self {
        Self {
            area: "0".to_string(),
            router_id: "Router.A".to_string(),
        }
    }
}

impl RouterIdentity {
    pub fn new<A: Into<String>, R: Into<String>>(area: A, router_id: R) -> Self {
        Self {
            area: area.into(),
            router_id: router_id.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Link Configuration
// ----------------------------------------------------------------------------

/// Settings applied to every link the core tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Credit window issued to incoming links
    pub capacity: u32,
    /// Label prefixed to names of links the core creates itself
    pub name_label: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            name_label: "qdlink".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Inter-Router Configuration
// ----------------------------------------------------------------------------

/// Limits on inter-router connectivity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterRouterConfig {
    /// Size of the mask-bit pool, i.e. concurrent inter-router connections
    pub max_connections: usize,
}

impl Default for InterRouterConfig {
    fn default() -> Self {
        Self {
            max_connections: 64,
        }
    }
}

// ----------------------------------------------------------------------------
// Router Configuration
// ----------------------------------------------------------------------------

/// Master configuration for the router core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub identity: RouterIdentity,
    pub links: LinkConfig,
    pub inter_router: InterRouterConfig,
    /// Fixed seed for discriminator generation; entropy-seeded when unset
    pub discriminator_seed: Option<u64>,
}

impl RouterConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic configuration for tests
    pub fn testing() -> Self {
        Self {
            identity: RouterIdentity::new("0", "Router.Test"),
            discriminator_seed: Some(0x5717_c4a7),
            ..Self::default()
        }
    }

    pub fn with_identity(mut self, identity: RouterIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_links(mut self, links: LinkConfig) -> Self {
        self.links = links;
        self
    }

    pub fn with_max_inter_router_connections(mut self, max_connections: usize) -> Self {
        self.inter_router.max_connections = max_connections;
        self
    }

    pub fn with_discriminator_seed(mut self, seed: u64) -> Self {
        self.discriminator_seed = Some(seed);
        self
    }

    /// Check the configuration for values the core cannot run with
    pub fn validate(&self) -> RouterResult<()> {
        for (field, value) in [
            ("identity.area", &self.identity.area),
            ("identity.router_id", &self.identity.router_id),
        ] {
            if value.is_empty() {
                return Err(RouterError::config_error(format!("{field} must not be empty")));
            }
            if value.contains('/') {
                return Err(RouterError::config_error(format!(
                    "{field} must not contain '/' (got {value:?})"
                )));
            }
        }

        if self.links.capacity == 0 {
            return Err(RouterError::config_error("links.capacity must be positive"));
        }

        if self.links.name_label.is_empty() {
            return Err(RouterError::config_error("links.name_label must not be empty"));
        }

        if self.inter_router.max_connections == 0
            || self.inter_router.max_connections > MAX_MASK_BITS
        {
            return Err(RouterError::config_error(format!(
                "inter_router.max_connections must be within 1..={MAX_MASK_BITS} (got {})",
                self.inter_router.max_connections
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.links.capacity, 32);
        assert_eq!(config.links.name_label, "qdlink");
        assert_eq!(config.inter_router.max_connections, 64);
        assert!(config.discriminator_seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_preset_is_deterministic_and_valid() {
        let config = RouterConfig::testing();
        assert!(config.discriminator_seed.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = RouterConfig::default().with_identity(RouterIdentity::new("", "R"));
        assert!(config.validate().is_err());

        let config = RouterConfig::default().with_identity(RouterIdentity::new("0", "a/b"));
        assert!(config.validate().is_err());

        let config = RouterConfig::default().with_links(LinkConfig {
            capacity: 0,
            ..LinkConfig::default()
        });
        assert!(config.validate().is_err());

        let config = RouterConfig::default().with_max_inter_router_connections(0);
        assert!(config.validate().is_err());

        let config = RouterConfig::default().with_max_inter_router_connections(MAX_MASK_BITS + 1);
        assert!(config.validate().is_err());
    }
}
