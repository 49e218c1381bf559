//! Switchyard CLI Configuration
//!
//! One TOML file carries the router core configuration and the shape of the
//! demo scenario. Missing sections and fields fall back to their defaults.
//!
//! ```toml
//! [router.identity]
//! area = "0"
//! router_id = "Router.A"
//!
//! [router.links]
//! capacity = 250
//!
//! [demo]
//! clients = 3
//! address = "service.orders"
//! ```

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use switchyard_core::RouterConfig;

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Router core configuration
    pub router: RouterConfig,
    /// Demo scenario settings
    pub demo: DemoConfig,
}

/// Shape of the scripted demo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Client connections, each attaching one producer
    pub clients: usize,
    /// Mobile address the producers and the consumer share
    pub address: String,
    /// Inter-router connections dialed by this router
    pub peer_routers: usize,
    /// Prefix configured as an outgoing link route
    pub link_route_prefix: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            clients: 2,
            address: "service.orders".to_string(),
            peer_routers: 1,
            link_route_prefix: "broker".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.router.validate()?;

        if self.demo.clients == 0 {
            return Err(CliError::Config("demo.clients must be positive".to_string()));
        }
        if self.demo.address.is_empty() {
            return Err(CliError::Config("demo.address must not be empty".to_string()));
        }
        if self.demo.peer_routers > self.router.inter_router.max_connections {
            return Err(CliError::Config(format!(
                "demo.peer_routers ({}) exceeds router.inter_router.max_connections ({})",
                self.demo.peer_routers, self.router.inter_router.max_connections
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [router.identity]
            router_id = "Router.B"

            [router.links]
            capacity = 250

            [demo]
            clients = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.router.identity.router_id, "Router.B");
        assert_eq!(config.router.identity.area, "0");
        assert_eq!(config.router.links.capacity, 250);
        assert_eq!(config.router.links.name_label, "qdlink");
        assert_eq!(config.demo.clients, 5);
        assert_eq!(config.demo.address, "service.orders");
    }

    #[test]
    fn test_invalid_router_section_is_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
            [router.inter_router]
            max_connections = 0
            "#,
        );
        assert!(matches!(result, Err(CliError::Router(_))));
    }

    #[test]
    fn test_too_many_peer_routers_is_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
            [router.inter_router]
            max_connections = 2

            [demo]
            peer_routers = 3
            "#,
        );
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_rendered_config_parses_back() {
        let mut config = AppConfig::default();
        config.router.discriminator_seed = Some(7);
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[router.identity]"));
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_malformed_toml_is_reported() {
        let result = AppConfig::from_toml_str("[demo\nclients = ");
        assert!(matches!(result, Err(CliError::TomlParsing(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AppConfig::load_from_file("/nonexistent/switchyard.toml");
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
