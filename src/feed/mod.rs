//! Market data module
//!
//! Last traded price and volume for a symbol, polled once per cycle

mod binance;
mod types;

pub use binance::{BinanceConfig, BinanceTicker, BINANCE_API_URL};
pub use types::PriceTick;

use async_trait::async_trait;

/// Source of the current market price
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch the latest price for `symbol`
    async fn get_price(&self, symbol: &str) -> anyhow::Result<PriceTick>;
}
