//! Fee and margin arithmetic
//!
//! Applied symmetrically on both legs of a trade. Fees are always paid from
//! cash and never folded into position size.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Proportional trading fee model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeModel {
    /// Fee as a percentage of notional (0.05 = 0.05%)
    fee_percent: Decimal,
}

impl FeeModel {
    pub fn new(fee_percent: Decimal) -> Self {
        Self { fee_percent }
    }

    pub fn fee_percent(&self) -> Decimal {
        self.fee_percent
    }

    /// Fee charged on `amount_usdt` of notional
    pub fn fee(&self, amount_usdt: Decimal) -> Decimal {
        amount_usdt * self.fee_percent / dec!(100)
    }
}

impl Default for FeeModel {
    fn default() -> Self {
        Self::new(dec!(0.05))
    }
}

/// Collateral required for `amount_usdt` of notional at `leverage`
pub fn margin(amount_usdt: Decimal, leverage: Decimal) -> Decimal {
    if leverage <= dec!(0) {
        return amount_usdt;
    }
    amount_usdt / leverage
}

/// Unleveraged exposure of `quantity` at `price`, `None` on overflow
pub fn notional(quantity: Decimal, price: Decimal) -> Option<Decimal> {
    quantity.checked_mul(price)
}
