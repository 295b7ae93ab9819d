//! Binance REST ticker
//!
//! Polls the 24h rolling ticker for last price and base volume.

use super::{MarketData, PriceTick};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Binance spot REST base URL
pub const BINANCE_API_URL: &str = "https://api.binance.com";

/// 24h ticker response (subset)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerResponse {
    symbol: String,
    last_price: String,
    volume: String,
    /// Statistics close time (milliseconds)
    close_time: i64,
}

/// Configuration for the ticker client
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Binance REST price source
pub struct BinanceTicker {
    config: BinanceConfig,
    client: Client,
}

impl BinanceTicker {
    pub fn new(config: BinanceConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn ticker_url(&self) -> String {
        format!(
            "{}/api/v3/ticker/24hr",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Parse a ticker body into a PriceTick
    fn parse_ticker(body: &str) -> Option<PriceTick> {
        let ticker: TickerResponse = serde_json::from_str(body).ok()?;

        let price = Decimal::from_str(&ticker.last_price).ok()?;
        if price <= Decimal::ZERO {
            return None;
        }
        let volume = Decimal::from_str(&ticker.volume).unwrap_or(Decimal::ZERO);
        let exchange_ts = Utc.timestamp_millis_opt(ticker.close_time).single()?;

        Some(PriceTick {
            symbol: ticker.symbol,
            price,
            volume,
            timestamp: Utc::now(),
            exchange_ts,
        })
    }
}

#[async_trait]
impl MarketData for BinanceTicker {
    async fn get_price(&self, symbol: &str) -> anyhow::Result<PriceTick> {
        let url = self.ticker_url();
        let symbol = symbol.to_uppercase();

        tracing::debug!(url = %url, symbol = %symbol, "Fetching ticker");

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error: {} - {}", status, body);
        }

        let body = response.text().await?;
        Self::parse_ticker(&body)
            .ok_or_else(|| anyhow::anyhow!("unparseable ticker for {symbol}: {body}"))
    }
}
