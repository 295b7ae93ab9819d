//! Risk policy types

use crate::decision::{ExitPlan, MalformedDecision};
use crate::ledger::{CloseReason, Side};
use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a decision never reaches the ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Confidence below the configured threshold
    #[error("confidence {confidence} below threshold {threshold}")]
    LowConfidence {
        confidence: Decimal,
        threshold: Decimal,
    },
    /// Maximum concurrent positions reached
    #[error("position limit reached ({active}/{max})")]
    PositionLimitReached { active: usize, max: usize },
    /// Not enough free cash for the required margin
    #[error("insufficient margin: required {required}, available {available}")]
    InsufficientMargin {
        required: Decimal,
        available: Decimal,
    },
    /// Decision failed schema or sizing checks
    #[error(transparent)]
    Malformed(#[from] MalformedDecision),
    /// Close requested with no position on the symbol
    #[error("no open position on {symbol}")]
    NoOpenPosition { symbol: String },
}

impl Rejection {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::LowConfidence { .. } => "low_confidence",
            Rejection::PositionLimitReached { .. } => "position_limit",
            Rejection::InsufficientMargin { .. } => "insufficient_margin",
            Rejection::Malformed(_) => "malformed",
            Rejection::NoOpenPosition { .. } => "no_open_position",
        }
    }
}

/// What the ledger is asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// No ledger mutation
    Hold,
    /// Open a new position or add to the existing one on the same side
    Open {
        side: Side,
        quantity: Decimal,
        amount_usdt: Decimal,
        leverage: Decimal,
    },
    /// Close the position on `side`; `None` closes all of it
    Close {
        side: Side,
        quantity: Option<Decimal>,
    },
}

/// Adjustment the policy made instead of rejecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjustment {
    LeverageClamped { requested: Decimal, applied: Decimal },
    SizeClamped { requested: Decimal, applied: Decimal },
}

/// A decision ready for execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDecision {
    pub symbol: String,
    pub intent: Intent,
    pub confidence: Decimal,
    pub exit_plan: ExitPlan,
    pub reason: CloseReason,
    pub adjustments: Vec<Adjustment>,
}

impl ValidatedDecision {
    pub fn is_hold(&self) -> bool {
        self.intent == Intent::Hold
    }

    /// Attribute a close to something other than the oracle
    pub fn with_reason(mut self, reason: CloseReason) -> Self {
        self.reason = reason;
        self
    }
}
