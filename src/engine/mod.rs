//! Cycle engine
//!
//! The per-symbol trading loop: price, exit plans, oracle, risk policy,
//! ledger, snapshot, metrics and persistence.

mod orchestrator;
mod persist;
mod state;

pub use orchestrator::{EngineConfig, Orchestrator};
pub use persist::{PendingWrite, WriteBuffer};
pub use state::{CycleOutcome, CycleState, DecisionOutcome, HoldReason};
