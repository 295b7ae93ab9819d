//! Risk metrics engine
//!
//! Stateless given the equity history and the trade log. Money-valued
//! results stay in `Decimal`; dispersion ratios are `f64`.

use crate::ledger::Trade;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Seconds in a 365-day year
const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Risk statistics of the portfolio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Sample stddev of per-cycle returns over the window
    pub volatility: Option<f64>,
    /// Annualised mean return over volatility
    pub sharpe_ratio: Option<f64>,
    /// Annualised mean return over downside deviation
    pub sortino_ratio: Option<f64>,
    /// Largest peak-to-trough decline in currency
    pub max_drawdown: Decimal,
    /// Largest peak-to-trough decline in percent of the peak
    pub max_drawdown_pct: Decimal,
    /// Winning closes over all closes, in percent
    pub win_rate: Decimal,
    /// Gross wins over gross losses; `None` without losses
    pub profit_factor: Option<Decimal>,
    pub total_return_pct: Decimal,
    /// Total return above the risk-free rate
    pub excess_return: Decimal,
    pub risk_adjusted_return: Decimal,
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
}

/// Computes [`RiskMetrics`]
#[derive(Debug, Clone)]
pub struct RiskMetricsEngine {
    /// Seconds between cycles, used to annualise
    run_interval_secs: u64,
    /// Trailing snapshots used for return statistics
    window: usize,
    /// Annual risk-free rate, in percent
    risk_free_rate: Decimal,
}

impl RiskMetricsEngine {
    pub fn new(run_interval_secs: u64, window: usize, risk_free_rate: Decimal) -> Self {
        Self {
            run_interval_secs: run_interval_secs.max(1),
            window: window.max(2),
            risk_free_rate,
        }
    }

    /// Compute metrics from the full equity history (oldest first) and trades
    pub fn compute(&self, equity: &[Decimal], initial_balance: Decimal, trades: &[Trade]) -> RiskMetrics {
        let drawdown = DrawdownTracker::from_history(equity);
        self.compute_with_drawdown(equity, &drawdown, initial_balance, trades)
    }

    /// Compute metrics from a trailing equity window and a drawdown tracked
    /// over the full history
    pub fn compute_with_drawdown(
        &self,
        equity: &[Decimal],
        drawdown: &DrawdownTracker,
        initial_balance: Decimal,
        trades: &[Trade],
    ) -> RiskMetrics {
        let returns = self.window_returns(equity);
        let volatility = sample_std_dev(&returns);

        let annual_factor = (SECONDS_PER_YEAR / self.run_interval_secs as f64).sqrt();
        let mean = mean(&returns);

        let sharpe_ratio = match (volatility, mean) {
            (Some(vol), Some(mean)) if equity.len() >= 2 && vol > 0.0 => {
                Some(mean / vol * annual_factor)
            }
            _ => None,
        };
        let sortino_ratio = match (downside_deviation(&returns), mean) {
            (Some(dev), Some(mean)) if dev > 0.0 => Some(mean / dev * annual_factor),
            _ => None,
        };

        let max_drawdown = drawdown.max_drawdown();
        let max_drawdown_pct = drawdown.max_drawdown_pct();
        let trade_stats = TradeStats::from_trades(trades);

        let total_return_pct = match equity.last() {
            Some(last) if initial_balance > dec!(0) => {
                (*last - initial_balance) / initial_balance * dec!(100)
            }
            _ => dec!(0),
        };
        let vol_decimal = volatility
            .and_then(|v| Decimal::try_from(v).ok())
            .unwrap_or(dec!(0));

        RiskMetrics {
            volatility,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_pct,
            win_rate: trade_stats.win_rate(),
            profit_factor: trade_stats.profit_factor(),
            total_return_pct,
            excess_return: total_return_pct - self.risk_free_rate,
            risk_adjusted_return: total_return_pct / (dec!(1) + vol_decimal),
            closed_trades: trade_stats.closed,
            winning_trades: trade_stats.wins,
            losing_trades: trade_stats.losses,
        }
    }

    /// Simple returns over the trailing window
    fn window_returns(&self, equity: &[Decimal]) -> Vec<f64> {
        let start = equity.len().saturating_sub(self.window);
        let values: Vec<f64> = equity[start..]
            .iter()
            .map(|v| (*v).try_into().unwrap_or(0.0))
            .collect();

        values
            .windows(2)
            .filter(|pair| pair[0] > 0.0)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect()
    }
}

/// Running peak and deepest decline, updated one value at a time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawdownTracker {
    peak: Option<Decimal>,
    max_drawdown: Decimal,
    max_drawdown_pct: Decimal,
}

impl DrawdownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_history(equity: &[Decimal]) -> Self {
        let mut tracker = Self::new();
        for value in equity {
            tracker.update(*value);
        }
        tracker
    }

    pub fn update(&mut self, value: Decimal) {
        let peak = match self.peak {
            Some(peak) if peak >= value => peak,
            _ => value,
        };
        self.peak = Some(peak);

        let drawdown = peak - value;
        self.max_drawdown = self.max_drawdown.max(drawdown);
        if peak > dec!(0) {
            self.max_drawdown_pct = self.max_drawdown_pct.max(drawdown / peak * dec!(100));
        }
    }

    pub fn peak(&self) -> Option<Decimal> {
        self.peak
    }

    /// Largest peak-to-trough decline in currency
    pub fn max_drawdown(&self) -> Decimal {
        self.max_drawdown
    }

    /// Largest peak-to-trough decline in percent of the peak
    pub fn max_drawdown_pct(&self) -> Decimal {
        self.max_drawdown_pct
    }
}

/// Largest absolute and relative decline from a running peak
pub fn max_drawdown(equity: &[Decimal]) -> (Decimal, Decimal) {
    let tracker = DrawdownTracker::from_history(equity);
    (tracker.max_drawdown(), tracker.max_drawdown_pct())
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample stddev (n−1); `None` with fewer than two values
fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Root mean square of negative returns (n−1)
fn downside_deviation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let sum_sq = values
        .iter()
        .filter(|r| **r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

#[derive(Default)]
struct TradeStats {
    closed: usize,
    wins: usize,
    losses: usize,
    gross_profit: Decimal,
    gross_loss: Decimal,
}

impl TradeStats {
    fn from_trades(trades: &[Trade]) -> Self {
        let mut stats = Self::default();
        for pnl in trades.iter().filter_map(|t| t.realized_pnl) {
            stats.closed += 1;
            if pnl > dec!(0) {
                stats.wins += 1;
                stats.gross_profit += pnl;
            } else if pnl < dec!(0) {
                stats.losses += 1;
                stats.gross_loss += -pnl;
            }
        }
        stats
    }

    fn win_rate(&self) -> Decimal {
        if self.closed == 0 {
            return dec!(0);
        }
        Decimal::from(self.wins) / Decimal::from(self.closed) * dec!(100)
    }

    fn profit_factor(&self) -> Option<Decimal> {
        if self.gross_loss == dec!(0) {
            return None;
        }
        Some(self.gross_profit / self.gross_loss)
    }
}
