//! Router Builder API
//!
//! Validates the configuration, installs the outbound handlers and starts
//! the core task.

use crate::action::{ActionSender, IdAllocator};
use crate::handlers::ConnectionHandlers;
use crate::logic::{CoreState, CoreStats, CoreTask};
use crate::router::Router;
use crate::routing::{RoutingEventReceiver, RoutingEventSender};
use std::sync::Arc;
use switchyard_core::{RouterConfig, RouterError, RouterResult};
use tokio::task::JoinHandle;
use tracing::info;

// ----------------------------------------------------------------------------
// Router Builder
// ----------------------------------------------------------------------------

/// Builder for the router core
pub struct RouterBuilder {
    config: RouterConfig,
    handlers: Option<Arc<dyn ConnectionHandlers>>,
    registrations: usize,
}

impl RouterBuilder {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            handlers: None,
            registrations: 0,
        }
    }

    /// Install the outbound handlers; exactly one registration is allowed
    pub fn with_handlers(mut self, handlers: Arc<dyn ConnectionHandlers>) -> Self {
        self.registrations += 1;
        self.handlers = Some(handlers);
        self
    }

    /// Assemble the router without spawning anything
    ///
    /// The caller drives the returned `CoreTask` itself.
    pub fn build(self) -> RouterResult<(Router, CoreTask, RoutingEventReceiver)> {
        self.config.validate()?;
        let handlers = match (self.handlers, self.registrations) {
            (Some(handlers), 1) => handlers,
            (None, _) => {
                return Err(RouterError::config_error(
                    "connection handlers must be registered before start",
                ))
            }
            (Some(_), n) => {
                return Err(RouterError::config_error(format!(
                    "connection handlers registered {n} times; exactly one registration is allowed"
                )))
            }
        };

        let ids = Arc::new(IdAllocator::new());
        let (actions, action_receiver) = ActionSender::channel();
        let (routing, routing_receiver) = RoutingEventSender::channel();

        let state = CoreState::new(self.config, ids.clone(), routing);
        let task = CoreTask::new(state, action_receiver);
        let router = Router::new(actions, ids, handlers);

        Ok((router, task, routing_receiver))
    }

    /// Build and spawn the core task on the current Tokio runtime
    pub fn start(self) -> RouterResult<RouterRuntime> {
        let (router, task, routing_events) = self.build()?;
        let core_handle = tokio::spawn(task.run());
        info!("Router core started");

        Ok(RouterRuntime {
            router,
            core_handle: Some(core_handle),
            routing_events: Some(routing_events),
        })
    }
}

// ----------------------------------------------------------------------------
// Router Runtime
// ----------------------------------------------------------------------------

/// A started router core
pub struct RouterRuntime {
    router: Router,
    core_handle: Option<JoinHandle<CoreStats>>,
    routing_events: Option<RoutingEventReceiver>,
}

impl RouterRuntime {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Take the routing event receiver (can only be called once)
    pub fn take_routing_events(&mut self) -> Option<RoutingEventReceiver> {
        self.routing_events.take()
    }

    pub fn is_running(&self) -> bool {
        self.core_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the core task and wait for its final statistics
    pub async fn shutdown(&mut self) -> RouterResult<CoreStats> {
        info!("Shutting down router core");
        // Already stopped is fine; the join below reports the outcome
        let _ = self.router.shutdown();

        let Some(handle) = self.core_handle.take() else {
            return Err(RouterError::core_stopped("router core already shut down"));
        };
        let stats = handle
            .await
            .map_err(|e| RouterError::core_stopped(format!("core task failed: {e}")))?;
        info!("Router core shut down");
        Ok(stats)
    }
}
