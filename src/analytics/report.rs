//! Performance report for the CLI

use super::{BehavioralMetrics, RiskMetrics};
use crate::ledger::PortfolioSnapshot;
use rust_decimal::Decimal;
use serde::Serialize;

/// Portfolio, risk and behavior summary
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub symbol: String,
    pub initial_balance: Decimal,
    pub snapshot: Option<PortfolioSnapshot>,
    pub risk: RiskMetrics,
    pub behavior: BehavioralMetrics,
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

impl PerformanceReport {
    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let (equity, cash, realized, unrealized, fees) = match &self.snapshot {
            Some(s) => (
                s.total_value,
                s.cash_balance,
                s.realized_pnl_cumulative,
                s.unrealized_pnl,
                s.total_fees_cumulative,
            ),
            None => (
                self.initial_balance,
                self.initial_balance,
                Decimal::ZERO,
                Decimal::ZERO,
                Decimal::ZERO,
            ),
        };
        let profit_factor = self
            .risk
            .profit_factor
            .map_or_else(|| "n/a".to_string(), |pf| format!("{:.2}", pf));

        format!(
            r#"
══════════════════════════════════════════════════════
               PERFORMANCE REPORT ({})
══════════════════════════════════════════════════════

PORTFOLIO
───────────────────────────────────────────────────────
Equity:           {:.2} ({:+.2}%)
Cash:             {:.2}
Realized P&L:     {:+.2}
Unrealized P&L:   {:+.2}
Fees Paid:        {:.2}

RISK
───────────────────────────────────────────────────────
Sharpe Ratio:     {}
Sortino Ratio:    {}
Volatility:       {}
Max Drawdown:     {:.2} ({:.2}%)
Win Rate:         {:.1}%
Profit Factor:    {}

BEHAVIOR
───────────────────────────────────────────────────────
Total Trades:     {} ({} closed)
Bullish Tilt:     {:.2}
Avg Holding:      {:.1}h
Trades / Day:     {:.2}
Avg Size:         {:.2} USDT
Avg Confidence:   {:.2}
Exit Tightness:   {:.2}%
Fee Impact:       {:.2}%
══════════════════════════════════════════════════════
"#,
            self.symbol,
            equity,
            self.risk.total_return_pct,
            cash,
            realized,
            unrealized,
            fees,
            ratio(self.risk.sharpe_ratio),
            ratio(self.risk.sortino_ratio),
            self.risk
                .volatility
                .map_or_else(|| "n/a".to_string(), |v| format!("{:.4}%", v * 100.0)),
            self.risk.max_drawdown,
            self.risk.max_drawdown_pct,
            self.risk.win_rate,
            profit_factor,
            self.behavior.total_trades,
            self.risk.closed_trades,
            self.behavior.bullish_tilt,
            self.behavior.avg_holding_period_hours,
            self.behavior.trade_frequency_per_day,
            self.behavior.avg_position_size_usdt,
            self.behavior.avg_confidence,
            self.behavior.exit_plan_tightness,
            self.behavior.fee_impact_pct,
        )
    }
}
