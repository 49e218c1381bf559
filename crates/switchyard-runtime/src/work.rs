//! Outbound connection work
//!
//! Items the core task leaves on a connection's work queue for the
//! transport to turn into protocol frames. Each item owns its termini.

use crate::link::LinkHandle;
use switchyard_core::{LinkError, Terminus};

/// One unit of outbound work for a connection
#[derive(Debug)]
pub enum ConnectionWork {
    /// Send a first attach for a link the core created
    FirstAttach {
        link: LinkHandle,
        source: Terminus,
        target: Terminus,
    },
    /// Answer a peer's first attach
    SecondAttach {
        link: LinkHandle,
        source: Terminus,
        target: Terminus,
    },
    /// Send a detach, carrying the rejection condition if there is one
    Detach {
        link: LinkHandle,
        error: Option<LinkError>,
    },
}

impl ConnectionWork {
    pub fn link(&self) -> &LinkHandle {
        match self {
            ConnectionWork::FirstAttach { link, .. }
            | ConnectionWork::SecondAttach { link, .. }
            | ConnectionWork::Detach { link, .. } => link,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectionWork::FirstAttach { .. } => "first-attach",
            ConnectionWork::SecondAttach { .. } => "second-attach",
            ConnectionWork::Detach { .. } => "detach",
        }
    }
}
