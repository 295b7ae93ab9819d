//! Decision types

use crate::ledger::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Requested action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// Requested direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    None,
}

impl Direction {
    /// Position side this direction refers to, if any
    pub fn side(self) -> Option<Side> {
        match self {
            Direction::Long => Some(Side::Long),
            Direction::Short => Some(Side::Short),
            Direction::None => None,
        }
    }
}

/// Risk label attached by the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskAssessment {
    Low,
    #[default]
    Medium,
    High,
}

/// Pre-declared exit conditions of a position
///
/// A level of zero means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitPlan {
    /// Price at which the position is closed in profit
    pub profit_target: Decimal,
    /// Price at which the position is closed at a loss
    pub stop_loss: Decimal,
    /// Free-form conditions that void the trade thesis
    #[serde(default)]
    pub invalidation_conditions: BTreeSet<String>,
}

impl ExitPlan {
    /// Create an exit plan with price levels only
    pub fn new(profit_target: Decimal, stop_loss: Decimal) -> Self {
        Self {
            profit_target,
            stop_loss,
            invalidation_conditions: BTreeSet::new(),
        }
    }

    /// Add an invalidation condition
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.invalidation_conditions.insert(condition.into());
        self
    }

    pub fn has_profit_target(&self) -> bool {
        self.profit_target > dec!(0)
    }

    pub fn has_stop_loss(&self) -> bool {
        self.stop_loss > dec!(0)
    }
}

/// A trading recommendation that passed schema validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub direction: Direction,
    /// Base asset quantity (zero when sized by `position_size_usdt`)
    pub quantity: Decimal,
    /// Requested leverage; `None` falls back to the configured default
    pub leverage: Option<Decimal>,
    /// Confidence in `[0, 1]`
    pub confidence: Decimal,
    /// Requested notional in USDT
    pub position_size_usdt: Decimal,
    pub risk_assessment: RiskAssessment,
    pub justification: String,
    pub exit_plan: ExitPlan,
}

impl Decision {
    /// A hold decision
    pub fn hold(justification: impl Into<String>) -> Self {
        Self {
            action: Action::Hold,
            direction: Direction::None,
            quantity: dec!(0),
            leverage: None,
            confidence: dec!(0),
            position_size_usdt: dec!(0),
            risk_assessment: RiskAssessment::default(),
            justification: justification.into(),
            exit_plan: ExitPlan::default(),
        }
    }

    /// A full close of the position on `side`, issued with full confidence
    pub fn force_close(side: Side, quantity: Decimal, justification: impl Into<String>) -> Self {
        let (action, direction) = match side {
            Side::Long => (Action::Sell, Direction::Long),
            Side::Short => (Action::Buy, Direction::Short),
        };
        Self {
            action,
            direction,
            quantity,
            leverage: None,
            confidence: dec!(1),
            position_size_usdt: dec!(0),
            risk_assessment: RiskAssessment::High,
            justification: justification.into(),
            exit_plan: ExitPlan::default(),
        }
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }
}
