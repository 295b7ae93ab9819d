//! Context handed to the decision oracle

use crate::analytics::{BehavioralMetrics, RiskMetrics};
use crate::ledger::{PortfolioSnapshot, Position, Trade};
use crate::risk::RiskLimits;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Everything the oracle sees when asked for a decision
#[derive(Debug, Clone, Serialize)]
pub struct OracleContext {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: Decimal,
    pub volume: Decimal,
    /// Named market-state flags currently raised
    pub market_flags: Vec<String>,
    pub portfolio: PortfolioSnapshot,
    pub positions: Vec<Position>,
    pub risk: RiskMetrics,
    pub behavior: BehavioralMetrics,
    /// Most recent trades, newest last
    pub recent_trades: Vec<Trade>,
    pub limits: RiskLimits,
}
