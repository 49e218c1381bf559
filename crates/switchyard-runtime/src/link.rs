//! Link handles
//!
//! A `LinkHandle` is the transport's reference to a link. It is created
//! synchronously when an attach is reported (or by the core for links it
//! initiates) and stays valid after the core has forgotten the link, so
//! late callbacks never dangle.

use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use switchyard_core::{ConnectionId, Direction, LinkId, LinkType};

struct LinkShared {
    id: LinkId,
    connection: ConnectionId,
    name: String,
    direction: Direction,
    link_type: OnceLock<LinkType>,
    detached: AtomicBool,
    strip_annotations_in: bool,
    strip_annotations_out: bool,
    context: Mutex<Option<Arc<dyn Any + Send + Sync>>>,
}

/// Shared handle to one link
#[derive(Clone)]
pub struct LinkHandle {
    inner: Arc<LinkShared>,
}

impl LinkHandle {
    pub(crate) fn new(
        id: LinkId,
        connection: ConnectionId,
        name: String,
        direction: Direction,
        strip_annotations: (bool, bool),
    ) -> Self {
        Self {
            inner: Arc::new(LinkShared {
                id,
                connection,
                name,
                direction,
                link_type: OnceLock::new(),
                detached: AtomicBool::new(false),
                strip_annotations_in: strip_annotations.0,
                strip_annotations_out: strip_annotations.1,
                context: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn with_type(self, link_type: LinkType) -> Self {
        self.set_link_type(link_type);
        self
    }

    /// Record the type once the core has classified the link
    pub(crate) fn set_link_type(&self, link_type: LinkType) {
        let _ = self.inner.link_type.set(link_type);
    }

    pub fn id(&self) -> LinkId {
        self.inner.id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.inner.connection
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    /// Type assigned by the core; `None` until the first attach is processed
    pub fn link_type(&self) -> Option<LinkType> {
        self.inner.link_type.get().copied()
    }

    /// True once the core has torn the link down or rejected it
    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::Acquire)
    }

    pub(crate) fn mark_detached(&self) {
        self.inner.detached.store(true, Ordering::Release);
    }

    pub fn strip_annotations_in(&self) -> bool {
        self.inner.strip_annotations_in
    }

    pub fn strip_annotations_out(&self) -> bool {
        self.inner.strip_annotations_out
    }

    /// Attach transport-owned state to the link
    pub fn set_context(&self, context: Arc<dyn Any + Send + Sync>) {
        *self.inner.context.lock() = Some(context);
    }

    pub fn context(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.inner.context.lock().clone()
    }

    pub fn ptr_eq(&self, other: &LinkHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkHandle")
            .field("id", &self.inner.id)
            .field("connection", &self.inner.connection)
            .field("name", &self.inner.name)
            .field("direction", &self.inner.direction)
            .field("link_type", &self.link_type())
            .finish()
    }
}
