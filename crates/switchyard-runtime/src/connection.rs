//! Connection handles and per-connection work queues
//!
//! The work queue is the one piece of state written by the core task and
//! read by another thread, so it sits behind its own lock. `process` holds
//! the lock only long enough to move the pending items out; handler
//! callbacks run unlocked.

use crate::handlers::ConnectionHandlers;
use crate::link::LinkHandle;
use crate::work::ConnectionWork;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;
use switchyard_core::{ConnectionId, ConnectionRole, Direction};
use tracing::trace;

// ----------------------------------------------------------------------------
// Connection Options
// ----------------------------------------------------------------------------

/// What the transport reports when a connection opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    pub label: String,
    /// True when the peer initiated the connection
    pub incoming: bool,
    pub role: ConnectionRole,
    pub strip_annotations_in: bool,
    pub strip_annotations_out: bool,
}

impl ConnectionOptions {
    pub fn new<L: Into<String>>(label: L, incoming: bool, role: ConnectionRole) -> Self {
        Self {
            label: label.into(),
            incoming,
            role,
            strip_annotations_in: false,
            strip_annotations_out: false,
        }
    }

    /// Client connection accepted from a peer
    pub fn normal<L: Into<String>>(label: L) -> Self {
        Self::new(label, true, ConnectionRole::Normal)
    }

    /// Inter-router connection; `incoming` is false on the side that dialed
    pub fn inter_router<L: Into<String>>(label: L, incoming: bool) -> Self {
        Self::new(label, incoming, ConnectionRole::InterRouter)
    }

    pub fn with_strip_annotations(mut self, strip_in: bool, strip_out: bool) -> Self {
        self.strip_annotations_in = strip_in;
        self.strip_annotations_out = strip_out;
        self
    }

    pub fn direction(&self) -> Direction {
        if self.incoming {
            Direction::Incoming
        } else {
            Direction::Outgoing
        }
    }
}

/// Lifecycle of a connection as seen by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Reported by the transport, not yet processed by the core
    Opening,
    Open,
    Closed,
}

// ----------------------------------------------------------------------------
// Work Queue
// ----------------------------------------------------------------------------

struct WorkQueue {
    state: ConnectionState,
    items: VecDeque<ConnectionWork>,
    links_with_deliveries: Vec<LinkHandle>,
    links_with_credit: Vec<(LinkHandle, u32)>,
}

impl WorkQueue {
    fn new() -> Self {
        Self {
            state: ConnectionState::Opening,
            items: VecDeque::new(),
            links_with_deliveries: Vec::new(),
            links_with_credit: Vec::new(),
        }
    }

    fn pending(&self) -> usize {
        self.items.len() + self.links_with_deliveries.len() + self.links_with_credit.len()
    }

    fn accepting(&self) -> bool {
        self.state != ConnectionState::Closed
    }
}

/// Items moved out of the queue by one drain
struct Drained {
    items: VecDeque<ConnectionWork>,
    pushes: Vec<LinkHandle>,
    credits: Vec<(LinkHandle, u32)>,
}

// ----------------------------------------------------------------------------
// Connection Handle
// ----------------------------------------------------------------------------

struct ConnectionShared {
    id: ConnectionId,
    options: ConnectionOptions,
    work: Mutex<WorkQueue>,
    context: Mutex<Option<Arc<dyn Any + Send + Sync>>>,
    handlers: Arc<dyn ConnectionHandlers>,
}

/// Shared handle to one connection
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<ConnectionShared>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        id: ConnectionId,
        options: ConnectionOptions,
        handlers: Arc<dyn ConnectionHandlers>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionShared {
                id,
                options,
                work: Mutex::new(WorkQueue::new()),
                context: Mutex::new(None),
                handlers,
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.options.label
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }

    pub fn role(&self) -> ConnectionRole {
        self.inner.options.role
    }

    pub fn is_incoming(&self) -> bool {
        self.inner.options.incoming
    }

    pub fn direction(&self) -> Direction {
        self.inner.options.direction()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.work.lock().state
    }

    /// Items, pushes and credit grants waiting for `process`
    pub fn pending_work(&self) -> usize {
        self.inner.work.lock().pending()
    }

    /// Attach transport-owned state to the connection
    pub fn set_context(&self, context: Arc<dyn Any + Send + Sync>) {
        *self.inner.context.lock() = Some(context);
    }

    pub fn context(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.inner.context.lock().clone()
    }

    pub fn ptr_eq(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Drain the work queue and hand everything to the outbound handlers
    ///
    /// Work items go out first in FIFO order, then pushes, then credit.
    /// Returns the number of callbacks made.
    pub fn process(&self) -> usize {
        let drained = {
            let mut queue = self.inner.work.lock();
            Drained {
                items: mem::take(&mut queue.items),
                pushes: mem::take(&mut queue.links_with_deliveries),
                credits: mem::take(&mut queue.links_with_credit),
            }
        };

        let handlers = &self.inner.handlers;
        let count = drained.items.len() + drained.pushes.len() + drained.credits.len();

        for work in drained.items {
            trace!(conn = %self.id(), link = %work.link().name(), work = work.name(), "Dispatching work");
            match work {
                ConnectionWork::FirstAttach {
                    link,
                    source,
                    target,
                } => handlers.first_attach(self, &link, source, target),
                ConnectionWork::SecondAttach {
                    link,
                    source,
                    target,
                } => handlers.second_attach(&link, source, target),
                ConnectionWork::Detach { link, error } => handlers.detach(&link, error),
            }
        }

        for link in drained.pushes {
            handlers.push(&link);
        }

        for (link, credit) in drained.credits {
            handlers.flow(&link, credit);
        }

        count
    }

    // ------------------------------------------------------------------------
    // Core-side operations
    // ------------------------------------------------------------------------

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.inner.work.lock().state = state;
    }

    pub(crate) fn activate(&self) {
        self.inner.handlers.activate(self);
    }

    /// Append a work item; true when the queue went from empty to non-empty
    pub(crate) fn enqueue(&self, work: ConnectionWork) -> bool {
        let mut queue = self.inner.work.lock();
        if !queue.accepting() {
            return false;
        }
        let was_empty = queue.pending() == 0;
        queue.items.push_back(work);
        was_empty
    }

    /// Add credit for a link, merging with an undrained grant
    pub(crate) fn add_credit(&self, link: &LinkHandle, credit: u32) -> bool {
        let mut queue = self.inner.work.lock();
        if !queue.accepting() {
            return false;
        }
        if let Some((_, pending)) = queue
            .links_with_credit
            .iter_mut()
            .find(|(existing, _)| existing.ptr_eq(link))
        {
            *pending = pending.saturating_add(credit);
            return false;
        }
        let was_empty = queue.pending() == 0;
        queue.links_with_credit.push((link.clone(), credit));
        was_empty
    }

    /// Mark a link as having deliveries to push; duplicates collapse
    pub(crate) fn add_push(&self, link: &LinkHandle) -> bool {
        let mut queue = self.inner.work.lock();
        if !queue.accepting() {
            return false;
        }
        if queue
            .links_with_deliveries
            .iter()
            .any(|existing| existing.ptr_eq(link))
        {
            return false;
        }
        let was_empty = queue.pending() == 0;
        queue.links_with_deliveries.push(link.clone());
        was_empty
    }

    /// Drop undrained credit and pushes for a link that is going away;
    /// returns how many entries were removed
    pub(crate) fn forget_link(&self, link: &LinkHandle) -> usize {
        let mut queue = self.inner.work.lock();
        let before = queue.links_with_deliveries.len() + queue.links_with_credit.len();
        queue
            .links_with_deliveries
            .retain(|existing| !existing.ptr_eq(link));
        queue
            .links_with_credit
            .retain(|(existing, _)| !existing.ptr_eq(link));
        before - queue.links_with_deliveries.len() - queue.links_with_credit.len()
    }

    /// Close the queue and drop anything undrained; returns the drop count
    pub(crate) fn close_work_queue(&self) -> usize {
        let mut queue = self.inner.work.lock();
        queue.state = ConnectionState::Closed;
        let discarded = queue.pending();
        queue.items.clear();
        queue.links_with_deliveries.clear();
        queue.links_with_credit.clear();
        discarded
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("label", &self.inner.options.label)
            .field("role", &self.inner.options.role)
            .field("incoming", &self.inner.options.incoming)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HandlerCall, RecordingHandlers};
    use std::thread;
    use switchyard_core::{LinkId, Terminus};

    fn connection(recorder: &Arc<RecordingHandlers>) -> ConnectionHandle {
        let conn = ConnectionHandle::new(
            ConnectionId::new(1),
            ConnectionOptions::normal("client"),
            recorder.clone(),
        );
        conn.set_state(ConnectionState::Open);
        conn
    }

    fn link(id: u64) -> LinkHandle {
        LinkHandle::new(
            LinkId::new(id),
            ConnectionId::new(1),
            format!("link.{id}"),
            Direction::Incoming,
            (false, false),
        )
    }

    fn second_attach(link: &LinkHandle) -> ConnectionWork {
        ConnectionWork::SecondAttach {
            link: link.clone(),
            source: Terminus::anonymous(),
            target: Terminus::anonymous(),
        }
    }

    #[test]
    fn test_process_preserves_fifo_order() {
        let recorder = RecordingHandlers::new();
        let conn = connection(&recorder);
        let (a, b, c) = (link(1), link(2), link(3));

        assert!(conn.enqueue(second_attach(&a)));
        assert!(!conn.enqueue(second_attach(&b)));
        assert!(!conn.enqueue(second_attach(&c)));

        assert_eq!(conn.process(), 3);
        let order: Vec<_> = recorder
            .take()
            .into_iter()
            .filter_map(|call| match call {
                HandlerCall::SecondAttach { link, .. } => Some(link.get()),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(conn.pending_work(), 0);
    }

    #[test]
    fn test_drain_order_work_then_push_then_flow() {
        let recorder = RecordingHandlers::new();
        let conn = connection(&recorder);
        let (a, b) = (link(1), link(2));

        assert!(conn.add_credit(&a, 32));
        assert!(!conn.add_push(&b));
        assert!(!conn.enqueue(second_attach(&a)));
        conn.process();

        let calls = recorder.take();
        assert!(matches!(calls[0], HandlerCall::SecondAttach { .. }));
        assert!(matches!(calls[1], HandlerCall::Push { .. }));
        assert!(matches!(calls[2], HandlerCall::Flow { credit: 32, .. }));
    }

    #[test]
    fn test_credit_merges_and_push_dedupes() {
        let recorder = RecordingHandlers::new();
        let conn = connection(&recorder);
        let a = link(1);

        assert!(conn.add_credit(&a, 10));
        assert!(!conn.add_credit(&a, 5));
        assert!(!conn.add_push(&a));
        assert!(!conn.add_push(&a));
        assert_eq!(conn.pending_work(), 2);

        conn.process();
        let calls = recorder.take();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[1], HandlerCall::Flow { credit: 15, .. }));
    }

    #[test]
    fn test_edge_reported_again_after_drain() {
        let recorder = RecordingHandlers::new();
        let conn = connection(&recorder);
        let a = link(1);

        assert!(conn.enqueue(second_attach(&a)));
        conn.process();
        assert!(conn.enqueue(second_attach(&a)));
    }

    #[test]
    fn test_forget_link_drops_only_its_credit_and_push() {
        let recorder = RecordingHandlers::new();
        let conn = connection(&recorder);
        let (a, b) = (link(1), link(2));

        conn.enqueue(second_attach(&a));
        conn.add_credit(&a, 32);
        conn.add_push(&a);
        conn.add_credit(&b, 8);
        assert_eq!(conn.forget_link(&a), 2);
        assert_eq!(conn.forget_link(&a), 0);

        conn.process();
        let calls = recorder.take();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], HandlerCall::SecondAttach { .. }));
        assert!(matches!(&calls[1], HandlerCall::Flow { link, credit: 8 } if link.get() == 2));
    }

    #[test]
    fn test_closed_queue_discards() {
        let recorder = RecordingHandlers::new();
        let conn = connection(&recorder);
        let a = link(1);

        conn.enqueue(second_attach(&a));
        conn.add_credit(&a, 1);
        assert_eq!(conn.close_work_queue(), 2);
        assert_eq!(conn.state(), ConnectionState::Closed);

        assert!(!conn.enqueue(second_attach(&a)));
        assert!(!conn.add_push(&a));
        assert_eq!(conn.process(), 0);
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_concurrent_enqueue_loses_nothing() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 250;

        let recorder = RecordingHandlers::new();
        let conn = connection(&recorder);

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let conn = conn.clone();
                thread::spawn(move || {
                    let mut edges = 0;
                    for i in 0..PER_PRODUCER {
                        if conn.enqueue(second_attach(&link(p * 1000 + i))) {
                            edges += 1;
                        }
                    }
                    edges
                })
            })
            .collect();

        let mut edges = 0;
        for producer in producers {
            edges += producer.join().unwrap();
        }
        let drained = conn.process();

        assert_eq!(drained as u64, PRODUCERS * PER_PRODUCER);
        // Nothing drained concurrently, so exactly one empty-to-non-empty edge
        assert_eq!(edges, 1);

        let mut seen: Vec<u64> = recorder
            .take()
            .into_iter()
            .filter_map(|call| match call {
                HandlerCall::SecondAttach { link, .. } => Some(link.get()),
                _ => None,
            })
            .collect();

        // Per-producer order is preserved
        for p in 0..PRODUCERS {
            let mine: Vec<_> = seen.iter().copied().filter(|id| id / 1000 == p).collect();
            let expected: Vec<_> = (0..PER_PRODUCER).map(|i| p * 1000 + i).collect();
            assert_eq!(mine, expected);
        }

        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len() as u64, PRODUCERS * PER_PRODUCER);
    }
}
