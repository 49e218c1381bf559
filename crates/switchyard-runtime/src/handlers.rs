//! Outbound handler interface
//!
//! The transport installs one implementation before the core starts. All
//! callbacks except `activate` run on the thread that calls
//! `ConnectionHandle::process`; `activate` runs on the core task and must
//! only schedule that call.

use crate::connection::ConnectionHandle;
use crate::link::LinkHandle;
use switchyard_core::{LinkError, Terminus};

pub trait ConnectionHandlers: Send + Sync {
    /// The connection's work queue went from empty to non-empty
    fn activate(&self, conn: &ConnectionHandle);

    /// Send a first attach for a core-created link
    fn first_attach(
        &self,
        conn: &ConnectionHandle,
        link: &LinkHandle,
        source: Terminus,
        target: Terminus,
    );

    /// Send the reply attach
    fn second_attach(&self, link: &LinkHandle, source: Terminus, target: Terminus);

    /// Send a detach
    fn detach(&self, link: &LinkHandle, error: Option<LinkError>);

    /// Grant `credit` more credit on an incoming link
    fn flow(&self, link: &LinkHandle, credit: u32);

    /// Deliveries are waiting on an outgoing link
    fn push(&self, link: &LinkHandle);
}
