//! Append-only trade records

use super::{CloseReason, OrderSide, Side, TradeKind};
use crate::decision::ExitPlan;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A simulated fill
///
/// Never mutated after creation. Closing trades carry the `opened_at` of
/// the position they close in `position_opened_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    /// Order side of the fill
    pub side: OrderSide,
    /// Side of the position the fill belongs to
    pub direction: Side,
    pub kind: TradeKind,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Notional of the fill (`quantity × price`)
    pub amount_usdt: Decimal,
    pub leverage: Decimal,
    pub trading_fee: Decimal,
    /// Margin locked (opening) or released (closing)
    pub margin_used: Decimal,
    pub confidence: Decimal,
    /// Leveraged price PnL, closing trades only
    pub realized_pnl: Option<Decimal>,
    /// Realized PnL minus closing fee and attributed opening fees
    pub net_pnl: Option<Decimal>,
    /// `realized_pnl / margin_used × 100`
    pub profit_pct: Option<Decimal>,
    pub exit_plan: ExitPlan,
    pub position_opened_at: DateTime<Utc>,
    pub close_reason: Option<CloseReason>,
}

impl Trade {
    pub fn is_closing(&self) -> bool {
        self.kind.is_closing()
    }

    pub fn is_opening(&self) -> bool {
        self.kind.is_opening()
    }
}
