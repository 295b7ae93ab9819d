//! Ledger types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Unleveraged price PnL of `quantity` moved from `entry` to `exit`
    pub fn price_pnl(self, entry: Decimal, exit: Decimal, quantity: Decimal) -> Decimal {
        match self {
            Side::Long => (exit - entry) * quantity,
            // Shorts profit when price falls
            Side::Short => (entry - exit) * quantity,
        }
    }

    /// Order side that opens a position on this side
    pub fn opening_order(self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Order side that closes a position on this side
    pub fn closing_order(self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Order side of a fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// What a trade did to its position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Open,
    Add,
    Close,
    PartialClose,
}

impl TradeKind {
    pub fn is_opening(self) -> bool {
        matches!(self, TradeKind::Open | TradeKind::Add)
    }

    pub fn is_closing(self) -> bool {
        matches!(self, TradeKind::Close | TradeKind::PartialClose)
    }
}

/// Why a position was closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "condition", rename_all = "snake_case")]
pub enum CloseReason {
    /// Decided by the oracle
    Oracle,
    StopLoss,
    TakeProfit,
    /// An invalidation condition of the exit plan fired
    Invalidation(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Oracle => write!(f, "oracle"),
            CloseReason::StopLoss => write!(f, "stop_loss"),
            CloseReason::TakeProfit => write!(f, "take_profit"),
            CloseReason::Invalidation(condition) => write!(f, "invalidation: {condition}"),
        }
    }
}

/// Ledger execution failures
///
/// Every failure leaves the ledger exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Cash cannot cover margin and fee, or a close would drive cash negative
    #[error("insufficient cash: required {required}, available {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },
    /// No active position on the symbol
    #[error("no open {side} position on {symbol}")]
    NoOpenPosition { symbol: String, side: Side },
    /// A position on the other side is active
    #[error("{symbol} already holds a {existing} position")]
    SideConflict { symbol: String, existing: Side },
    #[error("invalid price: {0}")]
    InvalidPrice(Decimal),
    #[error("invalid quantity: {0}")]
    InvalidQuantity(Decimal),
    #[error("invalid leverage: {0}")]
    InvalidLeverage(Decimal),
    /// Hold decisions carry nothing to execute
    #[error("nothing to execute")]
    NothingToExecute,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_long_price_pnl() {
        assert_eq!(
            Side::Long.price_pnl(dec!(50000), dec!(51000), dec!(0.01)),
            dec!(10)
        );
    }

    #[test]
    fn test_short_price_pnl_sign() {
        assert_eq!(
            Side::Short.price_pnl(dec!(50000), dec!(51000), dec!(0.01)),
            dec!(-10)
        );
        assert_eq!(
            Side::Short.price_pnl(dec!(50000), dec!(49000), dec!(0.01)),
            dec!(10)
        );
    }

    #[test]
    fn test_order_sides() {
        assert_eq!(Side::Long.opening_order(), OrderSide::Buy);
        assert_eq!(Side::Long.closing_order(), OrderSide::Sell);
        assert_eq!(Side::Short.opening_order(), OrderSide::Sell);
        assert_eq!(Side::Short.closing_order(), OrderSide::Buy);
    }

    #[test]
    fn test_close_reason_serde() {
        let json = serde_json::to_string(&CloseReason::Invalidation("volatility_spike".into()))
            .unwrap();
        assert_eq!(json, r#"{"type":"invalidation","condition":"volatility_spike"}"#);

        let back: CloseReason = serde_json::from_str(r#"{"type":"stop_loss"}"#).unwrap();
        assert_eq!(back, CloseReason::StopLoss);
    }
}
