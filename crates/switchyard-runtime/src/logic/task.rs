//! Core Task Implementation
//!
//! The single consumer of the action queue. Actions run one at a time, in
//! queue order, against the `CoreState` the task owns.

use super::state::{CoreState, CoreStats};
use crate::action::{Action, ActionReceiver};
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Core Task
// ----------------------------------------------------------------------------

/// Task that owns and mutates all routing state
pub struct CoreTask {
    state: CoreState,
    actions: ActionReceiver,
}

impl CoreTask {
    pub(crate) fn new(state: CoreState, actions: ActionReceiver) -> Self {
        Self { state, actions }
    }

    /// Run until a shutdown action arrives or every submitter is gone
    ///
    /// On the way out the queue is closed and whatever is still in it is
    /// executed in discard mode. Returns the final statistics.
    pub async fn run(mut self) -> CoreStats {
        info!(
            area = %self.state.config.identity.area,
            router = %self.state.config.identity.router_id,
            "Router core task starting"
        );

        while let Some(action) = self.actions.recv().await {
            if matches!(action, Action::Shutdown) {
                info!("Shutdown requested");
                break;
            }
            self.state.execute(action, false);
        }

        self.actions.close();
        let mut discarded = 0usize;
        while let Ok(action) = self.actions.try_recv() {
            self.state.execute(action, true);
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "Drained action queue after shutdown");
        }

        let stats = self.state.into_stats();
        info!(
            actions = stats.actions_processed,
            connections = stats.connections_opened,
            links = stats.links_attached,
            "Router core task stopped"
        );
        stats
    }
}
