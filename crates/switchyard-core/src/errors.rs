//! Error types for the Switchyard router core
//!
//! Two families live here: `RouterError`, returned by the public API when a
//! call cannot be accepted at all, and the peer-visible `Condition` /
//! `LinkError` pair carried on outbound detaches when an attach is rejected.

use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Peer-visible Conditions
// ----------------------------------------------------------------------------

/// Reason an attach is refused, sent to the peer on the outbound detach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// No address, link route or dynamic address matched the terminus
    NoRouteToDestination,
    /// The link type is not permitted on this connection
    Forbidden,
}

impl Condition {
    /// Symbolic condition name placed in the detach frame
    pub fn name(self) -> &'static str {
        match self {
            Condition::NoRouteToDestination => "qd:no-route-to-dest",
            Condition::Forbidden => "qd:forbidden",
        }
    }

    /// Default human readable description
    pub fn description(self) -> &'static str {
        match self {
            Condition::NoRouteToDestination => "No route to the destination node",
            Condition::Forbidden => "Connectivity to the node is forbidden",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error object attached to a link detach, in either direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkError {
    /// Symbolic condition name, e.g. `qd:forbidden` or a peer supplied name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
}

impl LinkError {
    /// Create an error with an arbitrary condition name
    pub fn new<N: Into<String>>(name: N, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }

    /// Create the error sent for a core-originated rejection
    pub fn from_condition(condition: Condition) -> Self {
        Self {
            name: condition.name().to_string(),
            description: Some(condition.description().to_string()),
        }
    }

    /// Whether this error carries the given core condition
    pub fn is(&self, condition: Condition) -> bool {
        self.name == condition.name()
    }
}

impl From<Condition> for LinkError {
    fn from(condition: Condition) -> Self {
        LinkError::from_condition(condition)
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.name, description),
            None => f.write_str(&self.name),
        }
    }
}

// ----------------------------------------------------------------------------
// API Errors
// ----------------------------------------------------------------------------

/// Errors returned by the router core API
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The core task is gone; the action was not queued
    #[error("Router core is not running: {reason}")]
    CoreStopped { reason: String },

    /// Invalid configuration or handler registration
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// A route-table hook was given a key without a known prefix
    #[error("Invalid address key: {key:?}")]
    InvalidAddressKey { key: String },

    /// Mask bit outside the configured pool
    #[error("Mask bit {bit} is out of range (pool size {capacity})")]
    MaskBitOutOfRange { bit: usize, capacity: usize },
}

impl RouterError {
    /// Create a core-stopped error with a reason
    pub fn core_stopped<T: Into<String>>(reason: T) -> Self {
        RouterError::CoreStopped {
            reason: reason.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        RouterError::Configuration {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type RouterResult<T> = core::result::Result<T, RouterError>;
