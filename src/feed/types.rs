//! Market data types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Last traded price
    pub price: Decimal,
    /// Rolling base-asset volume reported alongside the price
    pub volume: Decimal,
    /// Local timestamp when the tick was received
    pub timestamp: DateTime<Utc>,
    /// Exchange timestamp of the observation
    pub exchange_ts: DateTime<Utc>,
}

impl PriceTick {
    /// Tick stamped with the local clock on both timestamps
    pub fn new(symbol: impl Into<String>, price: Decimal, volume: Decimal) -> Self {
        let now = Utc::now();
        Self {
            symbol: symbol.into(),
            price,
            volume,
            timestamp: now,
            exchange_ts: now,
        }
    }
}
