//! Core Logic Module
//!
//! The core task and the state it owns, split into focused components:
//! - `state`: routing state, records and statistics
//! - `handlers`: one handler per action kind
//! - `snapshot`: serializable view produced by the inspect action
//! - `task`: the loop that feeds actions to the handlers
//!
//! All routing state is owned by a single `CoreTask`. Transports and the
//! route layer never touch it directly; they submit actions and read back
//! connection work and routing events.

pub mod handlers;
pub mod snapshot;
pub mod state;
pub mod task;


pub use snapshot::{AddressSnapshot, ConnectionSnapshot, CoreSnapshot, LinkSnapshot, SlotSnapshot};
pub use state::{CoreState, CoreStats};
pub use task::CoreTask;
