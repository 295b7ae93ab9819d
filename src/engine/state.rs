//! Cycle states and outcomes

use crate::analytics::BehavioralMetrics;
use crate::feed::PriceTick;
use crate::ledger::{LedgerError, PortfolioSnapshot, Trade};
use crate::risk::Rejection;

/// Where the orchestrator is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    FetchingPrice,
    MonitoringExitPlans,
    AwaitingDecision,
    Validating,
    Executing,
    Snapshotting,
    Sleeping,
    /// Terminal; only reached on shutdown
    Stopped,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::FetchingPrice => "fetching_price",
            CycleState::MonitoringExitPlans => "monitoring_exit_plans",
            CycleState::AwaitingDecision => "awaiting_decision",
            CycleState::Validating => "validating",
            CycleState::Executing => "executing",
            CycleState::Snapshotting => "snapshotting",
            CycleState::Sleeping => "sleeping",
            CycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why a cycle ended without an oracle trade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldReason {
    /// The oracle chose to hold
    Decided,
    OracleFailed(String),
    OracleTimeout,
    /// Reply failed the schema boundary
    Malformed(String),
}

/// What became of the oracle's decision
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Hold(HoldReason),
    Rejected(Rejection),
    Executed(Trade),
    ExecutionFailed(LedgerError),
}

/// Result of one cycle
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    /// `None` when the price fetch failed and the cycle was skipped
    pub tick: Option<PriceTick>,
    /// Closes forced by exit plans, executed before the oracle was asked
    pub forced_exits: Vec<Trade>,
    pub decision: Option<DecisionOutcome>,
    pub snapshot: Option<PortfolioSnapshot>,
    /// Behavioral metrics after this cycle's ledger mutations
    pub behavior: Option<BehavioralMetrics>,
}

impl CycleOutcome {
    pub fn is_skipped(&self) -> bool {
        self.tick.is_none()
    }

    /// Oracle trade executed this cycle, if any
    pub fn executed(&self) -> Option<&Trade> {
        match &self.decision {
            Some(DecisionOutcome::Executed(trade)) => Some(trade),
            _ => None,
        }
    }
}
