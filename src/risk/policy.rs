//! Risk policy
//!
//! Pure validation of oracle decisions against the configured limits.
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. confidence threshold
//! 2. concurrent position limit (new positions only)
//! 3. leverage clamp into `[1, max_leverage]`
//! 4. position size clamp to `max_position_size × portfolio value`
//! 5. required margin against available cash

use super::types::{Adjustment, Intent, Rejection, ValidatedDecision};
use crate::config::RiskConfig;
use crate::decision::{Action, Decision, Direction, MalformedDecision};
use crate::ledger::{CloseReason, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Limits enforced by the policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Upper leverage bound
    pub max_leverage: Decimal,
    /// Leverage used when the decision does not name one
    pub default_leverage: Decimal,
    /// Maximum notional per position as a fraction of portfolio value
    pub max_position_size: Decimal,
    /// Maximum active positions across all symbols
    pub max_active_positions: usize,
    /// Minimum confidence to act on a decision
    pub min_confidence_threshold: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_leverage: dec!(10),
            default_leverage: dec!(1),
            max_position_size: dec!(0.5),
            max_active_positions: 1,
            min_confidence_threshold: dec!(0.6),
        }
    }
}

impl From<&RiskConfig> for RiskLimits {
    fn from(config: &RiskConfig) -> Self {
        Self {
            max_leverage: config.max_leverage,
            default_leverage: config.default_leverage,
            max_position_size: config.max_position_size,
            max_active_positions: config.max_active_positions,
            min_confidence_threshold: config.min_confidence_threshold,
        }
    }
}

/// Read-only view of the portfolio the policy validates against
#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub symbol: String,
    /// Last observed price of `symbol`
    pub mark_price: Decimal,
    /// Free cash
    pub cash_balance: Decimal,
    /// Cash plus marked position value
    pub total_value: Decimal,
    /// Active positions across all symbols
    pub active_position_count: usize,
    /// Side of the active position on `symbol`, if any
    pub open_side: Option<Side>,
    /// Quantity of the active position on `symbol`
    pub open_quantity: Decimal,
}

enum Resolved {
    Hold,
    Open(Side),
    Close(Side),
}

/// Validates and clamps decisions before execution
#[derive(Debug, Clone, Default)]
pub struct RiskPolicy {
    limits: RiskLimits,
}

impl RiskPolicy {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Validate `decision` against `state`
    pub fn validate(
        &self,
        decision: &Decision,
        state: &PortfolioState,
    ) -> Result<ValidatedDecision, Rejection> {
        if decision.is_hold() {
            return Ok(self.validated(state, decision, Intent::Hold, vec![]));
        }

        if decision.confidence < self.limits.min_confidence_threshold {
            return Err(Rejection::LowConfidence {
                confidence: decision.confidence,
                threshold: self.limits.min_confidence_threshold,
            });
        }

        if state.mark_price <= dec!(0) {
            return Err(MalformedDecision {
                reason: format!("no usable mark price for {}", state.symbol),
            }
            .into());
        }

        match resolve(decision, state)? {
            Resolved::Hold => Ok(self.validated(state, decision, Intent::Hold, vec![])),
            Resolved::Close(side) => {
                let requested = requested_quantity(decision, state.mark_price)?;
                let quantity = if requested <= dec!(0) || requested >= state.open_quantity {
                    None
                } else {
                    Some(requested)
                };
                Ok(self.validated(state, decision, Intent::Close { side, quantity }, vec![]))
            }
            Resolved::Open(side) => self.validate_open(decision, state, side),
        }
    }

    fn validate_open(
        &self,
        decision: &Decision,
        state: &PortfolioState,
        side: Side,
    ) -> Result<ValidatedDecision, Rejection> {
        let mut adjustments = Vec::new();

        let is_new_position = state.open_side.is_none();
        if is_new_position && state.active_position_count >= self.limits.max_active_positions {
            return Err(Rejection::PositionLimitReached {
                active: state.active_position_count,
                max: self.limits.max_active_positions,
            });
        }

        let requested_leverage = decision.leverage.unwrap_or(self.limits.default_leverage);
        let leverage = requested_leverage.clamp(dec!(1), self.limits.max_leverage.max(dec!(1)));
        if leverage != requested_leverage {
            adjustments.push(Adjustment::LeverageClamped {
                requested: requested_leverage,
                applied: leverage,
            });
        }

        let requested_size = if decision.position_size_usdt > dec!(0) {
            decision.position_size_usdt
        } else {
            decision
                .quantity
                .checked_mul(state.mark_price)
                .ok_or_else(|| MalformedDecision {
                    reason: format!("quantity {} is out of range", decision.quantity),
                })?
        };
        if requested_size <= dec!(0) {
            return Err(MalformedDecision {
                reason: "opening decision has neither quantity nor position size".to_string(),
            }
            .into());
        }

        let max_size = self.limits.max_position_size * state.total_value;
        let amount_usdt = if requested_size > max_size {
            adjustments.push(Adjustment::SizeClamped {
                requested: requested_size,
                applied: max_size,
            });
            max_size
        } else {
            requested_size
        };
        if amount_usdt <= dec!(0) {
            return Err(Rejection::InsufficientMargin {
                required: requested_size / leverage,
                available: state.cash_balance,
            });
        }

        let required = amount_usdt / leverage;
        if required > state.cash_balance {
            return Err(Rejection::InsufficientMargin {
                required,
                available: state.cash_balance,
            });
        }

        let intent = Intent::Open {
            side,
            quantity: amount_usdt / state.mark_price,
            amount_usdt,
            leverage,
        };
        Ok(self.validated(state, decision, intent, adjustments))
    }

    fn validated(
        &self,
        state: &PortfolioState,
        decision: &Decision,
        intent: Intent,
        adjustments: Vec<Adjustment>,
    ) -> ValidatedDecision {
        ValidatedDecision {
            symbol: state.symbol.clone(),
            intent,
            confidence: decision.confidence,
            exit_plan: decision.exit_plan.clone(),
            reason: CloseReason::Oracle,
            adjustments,
        }
    }
}

/// Map action and direction onto what the ledger should do
fn resolve(decision: &Decision, state: &PortfolioState) -> Result<Resolved, Rejection> {
    let no_position = || Rejection::NoOpenPosition {
        symbol: state.symbol.clone(),
    };

    let resolved = match (decision.action, decision.direction) {
        (Action::Buy, Direction::Long) => match state.open_side {
            Some(Side::Short) => Resolved::Close(Side::Short),
            _ => Resolved::Open(Side::Long),
        },
        (Action::Sell, Direction::Short) => match state.open_side {
            Some(Side::Long) => Resolved::Close(Side::Long),
            _ => Resolved::Open(Side::Short),
        },
        (Action::Sell, Direction::Long) => match state.open_side {
            Some(Side::Long) => Resolved::Close(Side::Long),
            _ => return Err(no_position()),
        },
        (Action::Buy, Direction::Short) => match state.open_side {
            Some(Side::Short) => Resolved::Close(Side::Short),
            _ => return Err(no_position()),
        },
        (_, Direction::None) => Resolved::Close(state.open_side.ok_or_else(no_position)?),
        (Action::Hold, _) => Resolved::Hold,
    };
    Ok(resolved)
}

fn requested_quantity(decision: &Decision, price: Decimal) -> Result<Decimal, Rejection> {
    if decision.quantity > dec!(0) {
        Ok(decision.quantity)
    } else if decision.position_size_usdt > dec!(0) {
        decision
            .position_size_usdt
            .checked_div(price)
            .ok_or_else(|| {
                MalformedDecision {
                    reason: format!(
                        "position size {} is out of range",
                        decision.position_size_usdt
                    ),
                }
                .into()
            })
    } else {
        Ok(dec!(0))
    }
}
