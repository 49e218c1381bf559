//! Logging transport
//!
//! Stands in for a real protocol engine: every outbound callback is logged
//! and counted. Activations are forwarded over a channel to a drain task,
//! which calls `ConnectionHandle::process` off the core task the way an I/O
//! thread would.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use switchyard_runtime::{ConnectionHandle, ConnectionHandlers, LinkError, LinkHandle, Terminus};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

enum DrainRequest {
    Process(ConnectionHandle),
    Flush(oneshot::Sender<()>),
    Stop,
}

/// Callback counters
#[derive(Debug, Default)]
pub struct TransportCounters {
    pub activations: AtomicU64,
    pub first_attaches: AtomicU64,
    pub second_attaches: AtomicU64,
    pub detaches: AtomicU64,
    pub flows: AtomicU64,
    pub pushes: AtomicU64,
}

impl TransportCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "activations": self.activations.load(Ordering::Relaxed),
            "first_attaches": self.first_attaches.load(Ordering::Relaxed),
            "second_attaches": self.second_attaches.load(Ordering::Relaxed),
            "detaches": self.detaches.load(Ordering::Relaxed),
            "flows": self.flows.load(Ordering::Relaxed),
            "pushes": self.pushes.load(Ordering::Relaxed),
        })
    }
}

/// Outbound handlers that log instead of writing frames
pub struct TracingTransport {
    drain: mpsc::UnboundedSender<DrainRequest>,
    counters: Arc<TransportCounters>,
    /// Links the core attached on its own initiative, awaiting a reply
    initiated: Mutex<Vec<LinkHandle>>,
}

impl TracingTransport {
    /// Create the transport and spawn its drain task
    pub fn spawn() -> (Arc<Self>, JoinHandle<usize>) {
        let (drain, mut requests) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            drain,
            counters: Arc::new(TransportCounters::default()),
            initiated: Mutex::new(Vec::new()),
        });

        let handle = tokio::spawn(async move {
            let mut processed = 0usize;
            while let Some(request) = requests.recv().await {
                match request {
                    DrainRequest::Process(conn) => {
                        let n = conn.process();
                        trace!(conn = %conn.id(), callbacks = n, "Drained connection");
                        processed += n;
                    }
                    DrainRequest::Flush(done) => {
                        let _ = done.send(());
                    }
                    DrainRequest::Stop => break,
                }
            }
            debug!(processed, "Drain task stopped");
            processed
        });

        (transport, handle)
    }

    pub fn counters(&self) -> Arc<TransportCounters> {
        self.counters.clone()
    }

    /// Core-initiated links seen since the last call
    pub fn take_initiated(&self) -> Vec<LinkHandle> {
        std::mem::take(&mut *self.initiated.lock())
    }

    /// Stop the drain task once it has worked through earlier activations
    pub fn stop(&self) {
        let _ = self.drain.send(DrainRequest::Stop);
    }

    /// Wait until every activation sent so far has been drained
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.drain.send(DrainRequest::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl ConnectionHandlers for TracingTransport {
    fn activate(&self, conn: &ConnectionHandle) {
        TransportCounters::bump(&self.counters.activations);
        if self.drain.send(DrainRequest::Process(conn.clone())).is_err() {
            warn!(conn = %conn.id(), "Drain task gone; activation dropped");
        }
    }

    fn first_attach(
        &self,
        conn: &ConnectionHandle,
        link: &LinkHandle,
        source: Terminus,
        target: Terminus,
    ) {
        TransportCounters::bump(&self.counters.first_attaches);
        info!(
            conn = %conn.label(),
            link = %link.name(),
            direction = %link.direction(),
            source = ?source.capabilities(),
            target = ?target.capabilities(),
            "-> attach"
        );
        self.initiated.lock().push(link.clone());
    }

    fn second_attach(&self, link: &LinkHandle, source: Terminus, target: Terminus) {
        TransportCounters::bump(&self.counters.second_attaches);
        info!(
            link = %link.name(),
            source = source.address().unwrap_or("<anonymous>"),
            target = target.address().unwrap_or("<anonymous>"),
            "-> attach reply"
        );
    }

    fn detach(&self, link: &LinkHandle, error: Option<LinkError>) {
        TransportCounters::bump(&self.counters.detaches);
        match error {
            Some(error) => info!(link = %link.name(), error = %error, "-> detach"),
            None => info!(link = %link.name(), "-> detach"),
        }
    }

    fn flow(&self, link: &LinkHandle, credit: u32) {
        TransportCounters::bump(&self.counters.flows);
        info!(link = %link.name(), credit, "-> flow");
    }

    fn push(&self, link: &LinkHandle) {
        TransportCounters::bump(&self.counters.pushes);
        debug!(link = %link.name(), "-> push deliveries");
    }
}
