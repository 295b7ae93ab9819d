//! Exit plan monitor
//!
//! Checks every active position against its exit plan before the oracle is
//! consulted, and turns a triggered plan into a forced close decision.

use super::{InvalidationCondition, MarketFlags, MarketStateEvaluator};
use crate::decision::Decision;
use crate::feed::PriceTick;
use crate::ledger::{CloseReason, Position, Side};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// A position whose exit plan fired
#[derive(Debug, Clone, PartialEq)]
pub struct ExitSignal {
    pub symbol: String,
    pub side: Side,
    pub reason: CloseReason,
    /// Close decision to run through the risk policy
    pub decision: Decision,
}

/// Evaluates exit plans against price and market state
pub struct ExitMonitor {
    market_state: MarketStateEvaluator,
}

impl ExitMonitor {
    pub fn new(window: Duration) -> Self {
        Self {
            market_state: MarketStateEvaluator::new(window),
        }
    }

    /// Feed a tick into the market state statistics
    pub fn observe(&mut self, tick: &PriceTick) {
        self.market_state.update(tick);
    }

    pub fn market_state(&self) -> &MarketStateEvaluator {
        &self.market_state
    }

    /// Exit signals for the positions on `symbol` at `price`
    pub fn check<'a>(
        &self,
        positions: impl IntoIterator<Item = &'a Position>,
        symbol: &str,
        price: Decimal,
    ) -> Vec<ExitSignal> {
        let flags = self.market_state.flags();
        if !flags.is_empty() {
            tracing::debug!(?flags, "Market state flags raised");
        }

        positions
            .into_iter()
            .filter(|p| p.is_active && p.symbol == symbol)
            .filter_map(|position| {
                let reason = evaluate(position, price, &flags)?;
                tracing::warn!(
                    symbol = %position.symbol,
                    side = %position.side,
                    price = %price,
                    reason = %reason,
                    "Exit plan triggered"
                );
                Some(ExitSignal {
                    symbol: position.symbol.clone(),
                    side: position.side,
                    decision: Decision::force_close(
                        position.side,
                        position.quantity,
                        format!("exit plan triggered: {reason}"),
                    ),
                    reason,
                })
            })
            .collect()
    }
}

/// First exit condition that holds for `position` at `price`
///
/// Stop-loss wins over take-profit, which wins over invalidation.
pub fn evaluate(position: &Position, price: Decimal, flags: &MarketFlags) -> Option<CloseReason> {
    let plan = &position.exit_plan;

    let stop_hit = plan.stop_loss > dec!(0)
        && match position.side {
            Side::Long => price <= plan.stop_loss,
            Side::Short => price >= plan.stop_loss,
        };
    if stop_hit {
        return Some(CloseReason::StopLoss);
    }

    let target_hit = plan.profit_target > dec!(0)
        && match position.side {
            Side::Long => price >= plan.profit_target,
            Side::Short => price <= plan.profit_target,
        };
    if target_hit {
        return Some(CloseReason::TakeProfit);
    }

    plan.invalidation_conditions
        .iter()
        .find(|text| {
            InvalidationCondition::parse_for(text, &position.symbol).is_met(price, flags)
        })
        .map(|text| CloseReason::Invalidation(text.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Action, Direction, ExitPlan};
    use chrono::Utc;
    use uuid::Uuid;

    fn position(side: Side, exit_plan: ExitPlan) -> Position {
        Position {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            side,
            quantity: dec!(0.01),
            avg_entry_price: dec!(50000),
            leverage: dec!(2),
            margin_used: dec!(250),
            fees_paid: dec!(0.25),
            opened_at: Utc::now(),
            exit_plan,
            is_active: true,
            mark_price: dec!(50000),
            unrealized_pnl: dec!(0),
            closed_at: None,
        }
    }

    fn no_flags() -> MarketFlags {
        MarketFlags::new()
    }

    #[test]
    fn test_long_stop_loss() {
        let pos = position(Side::Long, ExitPlan::new(dec!(52000), dec!(49000)));
        assert_eq!(evaluate(&pos, dec!(48900), &no_flags()), Some(CloseReason::StopLoss));
        assert_eq!(evaluate(&pos, dec!(49000), &no_flags()), Some(CloseReason::StopLoss));
        assert_eq!(evaluate(&pos, dec!(49500), &no_flags()), None);
    }

    #[test]
    fn test_long_take_profit() {
        let pos = position(Side::Long, ExitPlan::new(dec!(52000), dec!(49000)));
        assert_eq!(evaluate(&pos, dec!(52100), &no_flags()), Some(CloseReason::TakeProfit));
    }

    #[test]
    fn test_short_levels_are_mirrored() {
        let pos = position(Side::Short, ExitPlan::new(dec!(48000), dec!(51000)));
        assert_eq!(evaluate(&pos, dec!(51200), &no_flags()), Some(CloseReason::StopLoss));
        assert_eq!(evaluate(&pos, dec!(47900), &no_flags()), Some(CloseReason::TakeProfit));
        assert_eq!(evaluate(&pos, dec!(50000), &no_flags()), None);
    }

    #[test]
    fn test_stop_loss_wins_on_inverted_plan() {
        // Levels on the wrong side: both fire on the same tick
        let pos = position(Side::Long, ExitPlan::new(dec!(48000), dec!(49000)));
        assert_eq!(evaluate(&pos, dec!(48500), &no_flags()), Some(CloseReason::StopLoss));
    }

    #[test]
    fn test_unset_levels_never_fire() {
        let pos = position(Side::Short, ExitPlan::default());
        assert_eq!(evaluate(&pos, dec!(1), &no_flags()), None);
        assert_eq!(evaluate(&pos, dec!(1000000), &no_flags()), None);
    }

    #[test]
    fn test_invalidation_price_condition() {
        let plan = ExitPlan::default().with_condition("price below 49500");
        let pos = position(Side::Long, plan);
        assert_eq!(
            evaluate(&pos, dec!(49400), &no_flags()),
            Some(CloseReason::Invalidation("price below 49500".to_string()))
        );
    }

    #[test]
    fn test_indicator_condition_does_not_fire_on_price() {
        let plan = ExitPlan::new(dec!(52000), dec!(49000)).with_condition("RSI above 80");
        let pos = position(Side::Long, plan);
        assert_eq!(evaluate(&pos, dec!(50000), &no_flags()), None);
    }

    #[test]
    fn test_asset_subject_condition() {
        let plan = ExitPlan::default().with_condition("BTC closes below 49500");
        let pos = position(Side::Long, plan);
        assert_eq!(
            evaluate(&pos, dec!(49400), &no_flags()),
            Some(CloseReason::Invalidation("BTC closes below 49500".to_string()))
        );
    }

    #[test]
    fn test_invalidation_flag_condition() {
        let plan = ExitPlan::default().with_condition("volatility_spike");
        let pos = position(Side::Long, plan);
        let flags: MarketFlags = ["volatility_spike".to_string()].into_iter().collect();

        assert_eq!(evaluate(&pos, dec!(50000), &no_flags()), None);
        assert_eq!(
            evaluate(&pos, dec!(50000), &flags),
            Some(CloseReason::Invalidation("volatility_spike".to_string()))
        );
    }

    #[test]
    fn test_check_builds_forced_close() {
        let monitor = ExitMonitor::new(Duration::hours(1));
        let positions = vec![
            position(Side::Long, ExitPlan::new(dec!(52000), dec!(49000))),
        ];

        let signals = monitor.check(&positions, "BTCUSDT", dec!(48900));

        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.reason, CloseReason::StopLoss);
        assert_eq!(signal.decision.action, Action::Sell);
        assert_eq!(signal.decision.direction, Direction::Long);
        assert_eq!(signal.decision.confidence, dec!(1));
        assert_eq!(signal.decision.quantity, dec!(0.01));
    }

    #[test]
    fn test_check_skips_other_symbols() {
        let monitor = ExitMonitor::new(Duration::hours(1));
        let mut other = position(Side::Long, ExitPlan::new(dec!(52000), dec!(49000)));
        other.symbol = "ETHUSDT".to_string();

        assert!(monitor.check([&other], "BTCUSDT", dec!(48900)).is_empty());
    }
}
