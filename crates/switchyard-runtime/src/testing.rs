//! Test support
//!
//! `RecordingHandlers` implements the outbound handler trait by recording
//! every callback, so tests can drive the router and then assert on exactly
//! what the transport would have been asked to send.

use crate::connection::ConnectionHandle;
use crate::handlers::ConnectionHandlers;
use crate::link::LinkHandle;
use parking_lot::Mutex;
use std::sync::Arc;
use switchyard_core::{ConnectionId, LinkError, LinkId, Terminus};

/// One recorded handler callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerCall {
    Activate {
        conn: ConnectionId,
    },
    FirstAttach {
        conn: ConnectionId,
        link: LinkId,
        name: String,
        source: Terminus,
        target: Terminus,
    },
    SecondAttach {
        link: LinkId,
        source: Terminus,
        target: Terminus,
    },
    Detach {
        link: LinkId,
        error: Option<LinkError>,
    },
    Flow {
        link: LinkId,
        credit: u32,
    },
    Push {
        link: LinkId,
    },
}

impl HandlerCall {
    pub fn link(&self) -> Option<LinkId> {
        match self {
            HandlerCall::Activate { .. } => None,
            HandlerCall::FirstAttach { link, .. }
            | HandlerCall::SecondAttach { link, .. }
            | HandlerCall::Detach { link, .. }
            | HandlerCall::Flow { link, .. }
            | HandlerCall::Push { link } => Some(*link),
        }
    }
}

/// Handler implementation that records calls in order
#[derive(Debug, Default)]
pub struct RecordingHandlers {
    calls: Mutex<Vec<HandlerCall>>,
}

impl RecordingHandlers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy of everything recorded so far
    pub fn calls(&self) -> Vec<HandlerCall> {
        self.calls.lock().clone()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<HandlerCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Number of activations recorded for a connection
    pub fn activations(&self, conn: ConnectionId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, HandlerCall::Activate { conn: c } if *c == conn))
            .count()
    }

    /// Recorded calls concerning one link
    pub fn calls_for(&self, link: LinkId) -> Vec<HandlerCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.link() == Some(link))
            .cloned()
            .collect()
    }

    fn record(&self, call: HandlerCall) {
        self.calls.lock().push(call);
    }
}

impl ConnectionHandlers for RecordingHandlers {
    fn activate(&self, conn: &ConnectionHandle) {
        self.record(HandlerCall::Activate { conn: conn.id() });
    }

    fn first_attach(
        &self,
        conn: &ConnectionHandle,
        link: &LinkHandle,
        source: Terminus,
        target: Terminus,
    ) {
        self.record(HandlerCall::FirstAttach {
            conn: conn.id(),
            link: link.id(),
            name: link.name().to_string(),
            source,
            target,
        });
    }

    fn second_attach(&self, link: &LinkHandle, source: Terminus, target: Terminus) {
        self.record(HandlerCall::SecondAttach {
            link: link.id(),
            source,
            target,
        });
    }

    fn detach(&self, link: &LinkHandle, error: Option<LinkError>) {
        self.record(HandlerCall::Detach {
            link: link.id(),
            error,
        });
    }

    fn flow(&self, link: &LinkHandle, credit: u32) {
        self.record(HandlerCall::Flow {
            link: link.id(),
            credit,
        });
    }

    fn push(&self, link: &LinkHandle) {
        self.record(HandlerCall::Push { link: link.id() });
    }
}
