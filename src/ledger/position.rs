//! Leveraged position

use super::Side;
use crate::decision::ExitPlan;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A leveraged perpetual position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Position identifier
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    /// Base asset quantity
    pub quantity: Decimal,
    /// Notional-weighted average entry price
    pub avg_entry_price: Decimal,
    /// Effective leverage (`notional_value / margin_used`)
    pub leverage: Decimal,
    /// Cash collateral locked in the position
    pub margin_used: Decimal,
    /// Opening fees not yet attributed to a close
    pub fees_paid: Decimal,
    pub opened_at: DateTime<Utc>,
    pub exit_plan: ExitPlan,
    pub is_active: bool,
    /// Last mark price
    pub mark_price: Decimal,
    /// PnL at `mark_price`
    pub unrealized_pnl: Decimal,
    /// Set when the position is deactivated
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Notional value at entry
    pub fn notional_value(&self) -> Decimal {
        self.quantity * self.avg_entry_price
    }

    /// Leveraged PnL of `quantity` of this position exited at `price`
    pub fn pnl_at(&self, price: Decimal, quantity: Decimal) -> Decimal {
        self.side.price_pnl(self.avg_entry_price, price, quantity) * self.leverage
    }

    /// Re-mark the position at `price`
    pub fn mark(&mut self, price: Decimal) {
        self.mark_price = price;
        self.unrealized_pnl = self.pnl_at(price, self.quantity);
    }

    /// Margin plus unrealized PnL
    pub fn value(&self) -> Decimal {
        self.margin_used + self.unrealized_pnl
    }

    /// Return on margin at the current mark, in percent
    pub fn unrealized_pnl_pct(&self) -> Decimal {
        if self.margin_used == dec!(0) {
            return dec!(0);
        }
        self.unrealized_pnl / self.margin_used * dec!(100)
    }
}
