//! Behavioral tracker
//!
//! Trading-habit statistics derived from the trade log and the current
//! position set, fed back to the oracle each cycle.

use crate::ledger::{Position, Side, Trade};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Ceiling for `fee_impact_pct`
pub const FEE_IMPACT_CAP: Decimal = dec!(999.99);

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralMetrics {
    pub timestamp: DateTime<Utc>,
    /// Share of opening trades taken long, 0.5 when there are none
    pub bullish_tilt: Decimal,
    pub avg_holding_period_hours: Decimal,
    pub trade_frequency_per_day: Decimal,
    pub avg_position_size_usdt: Decimal,
    pub avg_confidence: Decimal,
    /// Mean exit-plan distance from entry, in percent
    pub exit_plan_tightness: Decimal,
    /// Fees as a share of absolute realized PnL, in percent
    pub fee_impact_pct: Decimal,
    pub avg_leverage: Decimal,
    pub open_position_count: usize,
    pub total_trades: usize,
}

impl BehavioralMetrics {
    /// Compute from the full trade log and the active positions
    pub fn compute<'a>(
        trades: &[Trade],
        positions: impl IntoIterator<Item = &'a Position>,
        now: DateTime<Utc>,
    ) -> Self {
        let openings: Vec<&Trade> = trades.iter().filter(|t| t.is_opening()).collect();
        let closings: Vec<&Trade> = trades.iter().filter(|t| t.is_closing()).collect();
        let positions: Vec<&Position> = positions.into_iter().filter(|p| p.is_active).collect();

        let longs = openings.iter().filter(|t| t.direction == Side::Long).count();
        let bullish_tilt = if openings.is_empty() {
            dec!(0.5)
        } else {
            Decimal::from(longs) / Decimal::from(openings.len())
        };

        let holding_hours = closings.iter().map(|t| {
            let secs = (t.timestamp - t.position_opened_at).num_seconds().max(0);
            Decimal::from(secs) / Decimal::from(SECONDS_PER_HOUR)
        });

        let tightness = openings.iter().filter_map(|t| exit_plan_distance_pct(t));

        Self {
            timestamp: now,
            bullish_tilt,
            avg_holding_period_hours: average(holding_hours),
            trade_frequency_per_day: trade_frequency(trades, now),
            avg_position_size_usdt: average(openings.iter().map(|t| t.amount_usdt)),
            avg_confidence: average(openings.iter().map(|t| t.confidence)),
            exit_plan_tightness: average(tightness),
            fee_impact_pct: fee_impact(trades),
            avg_leverage: average(positions.iter().map(|p| p.leverage)),
            open_position_count: positions.len(),
            total_trades: trades.len(),
        }
    }
}

fn average(values: impl Iterator<Item = Decimal>) -> Decimal {
    let (sum, count) = values.fold((dec!(0), 0u32), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        return dec!(0);
    }
    sum / Decimal::from(count)
}

/// Trades per day since the first trade, with at least one hour elapsed
fn trade_frequency(trades: &[Trade], now: DateTime<Utc>) -> Decimal {
    let Some(first) = trades.iter().map(|t| t.timestamp).min() else {
        return dec!(0);
    };
    let elapsed_secs = (now - first).num_seconds().max(SECONDS_PER_HOUR);
    Decimal::from(trades.len()) * Decimal::from(SECONDS_PER_DAY) / Decimal::from(elapsed_secs)
}

/// Mean distance of target and stop from the entry price, in percent
fn exit_plan_distance_pct(trade: &Trade) -> Option<Decimal> {
    let plan = &trade.exit_plan;
    if trade.price <= dec!(0) || !plan.has_profit_target() || !plan.has_stop_loss() {
        return None;
    }
    let target = (plan.profit_target - trade.price).abs() / trade.price;
    let stop = (plan.stop_loss - trade.price).abs() / trade.price;
    Some((target + stop) / dec!(2) * dec!(100))
}

fn fee_impact(trades: &[Trade]) -> Decimal {
    let fees: Decimal = trades.iter().map(|t| t.trading_fee).sum();
    let realized: Decimal = trades.iter().filter_map(|t| t.realized_pnl).sum();

    if fees == dec!(0) {
        return dec!(0);
    }
    if realized == dec!(0) {
        return FEE_IMPACT_CAP;
    }
    (fees / realized.abs() * dec!(100)).min(FEE_IMPACT_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ExitPlan;
    use crate::ledger::{CloseReason, TradeKind};
    use chrono::Duration;
    use uuid::Uuid;

    fn trade(kind: TradeKind, direction: Side, ts: DateTime<Utc>) -> Trade {
        let closing = kind.is_closing();
        Trade {
            id: Uuid::new_v4(),
            timestamp: ts,
            symbol: "BTCUSDT".to_string(),
            side: if closing {
                direction.closing_order()
            } else {
                direction.opening_order()
            },
            direction,
            kind,
            price: dec!(50000),
            quantity: dec!(0.01),
            amount_usdt: dec!(500),
            leverage: dec!(2),
            trading_fee: dec!(0.25),
            margin_used: dec!(250),
            confidence: dec!(0.8),
            realized_pnl: closing.then_some(dec!(10)),
            net_pnl: closing.then_some(dec!(9.5)),
            profit_pct: closing.then_some(dec!(4)),
            exit_plan: ExitPlan::new(dec!(52000), dec!(49000)),
            position_opened_at: ts - if closing { Duration::hours(2) } else { Duration::zero() },
            close_reason: closing.then_some(CloseReason::Oracle),
        }
    }

    #[test]
    fn test_bullish_tilt_three_long_one_short() {
        let now = Utc::now();
        let trades = vec![
            trade(TradeKind::Open, Side::Long, now),
            trade(TradeKind::Add, Side::Long, now),
            trade(TradeKind::Open, Side::Long, now),
            trade(TradeKind::Open, Side::Short, now),
        ];
        let metrics = BehavioralMetrics::compute(&trades, &[], now);
        assert_eq!(metrics.bullish_tilt, dec!(0.75));
    }

    #[test]
    fn test_empty_history() {
        let metrics = BehavioralMetrics::compute(&[], &[], Utc::now());
        assert_eq!(metrics.bullish_tilt, dec!(0.5));
        assert_eq!(metrics.trade_frequency_per_day, dec!(0));
        assert_eq!(metrics.fee_impact_pct, dec!(0));
        assert_eq!(metrics.avg_leverage, dec!(0));
        assert_eq!(metrics.total_trades, 0);
    }

    #[test]
    fn test_holding_period() {
        let now = Utc::now();
        let trades = vec![
            trade(TradeKind::Open, Side::Long, now - Duration::hours(2)),
            trade(TradeKind::Close, Side::Long, now),
        ];
        let metrics = BehavioralMetrics::compute(&trades, &[], now);
        assert_eq!(metrics.avg_holding_period_hours, dec!(2));
    }

    #[test]
    fn test_frequency_floor_of_one_hour() {
        let now = Utc::now();
        let trades = vec![
            trade(TradeKind::Open, Side::Long, now),
            trade(TradeKind::Close, Side::Long, now),
        ];
        // Two trades within the same instant count as two per hour
        let metrics = BehavioralMetrics::compute(&trades, &[], now);
        assert_eq!(metrics.trade_frequency_per_day, dec!(48));
    }

    #[test]
    fn test_frequency_over_days() {
        let now = Utc::now();
        let trades = vec![
            trade(TradeKind::Open, Side::Long, now - Duration::days(2)),
            trade(TradeKind::Close, Side::Long, now - Duration::days(1)),
        ];
        let metrics = BehavioralMetrics::compute(&trades, &[], now);
        assert_eq!(metrics.trade_frequency_per_day, dec!(1));
    }

    #[test]
    fn test_averages_and_tightness() {
        let now = Utc::now();
        let trades = vec![trade(TradeKind::Open, Side::Long, now)];
        let metrics = BehavioralMetrics::compute(&trades, &[], now);

        assert_eq!(metrics.avg_position_size_usdt, dec!(500));
        assert_eq!(metrics.avg_confidence, dec!(0.8));
        // (4% + 2%) / 2
        assert_eq!(metrics.exit_plan_tightness, dec!(3));
    }

    #[test]
    fn test_fee_impact() {
        let now = Utc::now();
        let trades = vec![
            trade(TradeKind::Open, Side::Long, now),
            trade(TradeKind::Close, Side::Long, now),
        ];
        // 0.5 fees over 10 realized
        let metrics = BehavioralMetrics::compute(&trades, &[], now);
        assert_eq!(metrics.fee_impact_pct, dec!(5));
    }

    #[test]
    fn test_fee_impact_capped_without_realized_pnl() {
        let now = Utc::now();
        let trades = vec![trade(TradeKind::Open, Side::Long, now)];
        let metrics = BehavioralMetrics::compute(&trades, &[], now);
        assert_eq!(metrics.fee_impact_pct, FEE_IMPACT_CAP);
    }

    #[test]
    fn test_fee_impact_capped_on_tiny_pnl() {
        let now = Utc::now();
        let mut close = trade(TradeKind::Close, Side::Long, now);
        close.realized_pnl = Some(dec!(0.0001));
        let trades = vec![trade(TradeKind::Open, Side::Long, now), close];
        let metrics = BehavioralMetrics::compute(&trades, &[], now);
        assert_eq!(metrics.fee_impact_pct, FEE_IMPACT_CAP);
    }
}
