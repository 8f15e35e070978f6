//! Fetch planning and the run orchestrator.

mod engine;
mod planner;

pub use engine::{SyncEngine, sync_once};
pub use planner::{SyncPlan, compute_plan};
