//! Per-cycle portfolio snapshots

use crate::analytics::RiskMetrics;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Portfolio state at the end of a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cash_balance: Decimal,
    /// Margin plus unrealized PnL of active positions
    pub positions_value: Decimal,
    /// `cash_balance + positions_value`
    pub total_value: Decimal,
    pub realized_pnl_cumulative: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_fees_cumulative: Decimal,
    pub active_position_count: usize,
    pub sharpe_ratio: Option<f64>,
    pub volatility: Option<f64>,
    pub max_drawdown: Decimal,
    pub win_rate: Decimal,
    pub profit_factor: Option<Decimal>,
}

impl PortfolioSnapshot {
    /// Copy the derived risk fields
    pub fn with_risk(mut self, metrics: &RiskMetrics) -> Self {
        self.sharpe_ratio = metrics.sharpe_ratio;
        self.volatility = metrics.volatility;
        self.max_drawdown = metrics.max_drawdown;
        self.win_rate = metrics.win_rate;
        self.profit_factor = metrics.profit_factor;
        self
    }

    /// Total value rebuilt from the cumulative ledger totals
    pub fn reconstructed_value(&self, initial_balance: Decimal) -> Decimal {
        initial_balance + self.realized_pnl_cumulative - self.total_fees_cumulative
            + self.unrealized_pnl
    }
}
