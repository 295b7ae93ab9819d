//! Configuration types for perp-agent

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub oracle: OracleSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Trading loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradingConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    /// Seconds between cycles
    #[serde(default = "default_run_interval_secs")]
    pub run_interval_secs: u64,
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}
fn default_initial_balance() -> Decimal {
    dec!(10000)
}
fn default_run_interval_secs() -> u64 {
    300
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            initial_balance: default_initial_balance(),
            run_interval_secs: default_run_interval_secs(),
        }
    }
}

/// Risk policy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_leverage")]
    pub max_leverage: Decimal,
    #[serde(default = "default_default_leverage")]
    pub default_leverage: Decimal,
    /// Fraction of portfolio value per position
    #[serde(default = "default_max_position_size")]
    pub max_position_size: Decimal,
    #[serde(default = "default_max_active_positions")]
    pub max_active_positions: usize,
    #[serde(default = "default_min_confidence_threshold")]
    pub min_confidence_threshold: Decimal,
    /// Default stop distance from entry, percent (0 disables)
    #[serde(default = "default_stop_loss_percent")]
    pub stop_loss_percent: Decimal,
    /// Default target distance from entry, percent (0 disables)
    #[serde(default = "default_take_profit_percent")]
    pub take_profit_percent: Decimal,
    /// Annual risk-free rate, percent
    #[serde(default)]
    pub risk_free_rate: Decimal,
    /// Trailing snapshots used for return statistics
    #[serde(default = "default_metrics_window")]
    pub metrics_window: usize,
}

fn default_max_leverage() -> Decimal {
    dec!(10)
}
fn default_default_leverage() -> Decimal {
    dec!(1)
}
fn default_max_position_size() -> Decimal {
    dec!(0.5)
}
fn default_max_active_positions() -> usize {
    1
}
fn default_min_confidence_threshold() -> Decimal {
    dec!(0.6)
}
fn default_stop_loss_percent() -> Decimal {
    dec!(2)
}
fn default_take_profit_percent() -> Decimal {
    dec!(4)
}
fn default_metrics_window() -> usize {
    288 // one day at 5 minute cycles
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_leverage: default_max_leverage(),
            default_leverage: default_default_leverage(),
            max_position_size: default_max_position_size(),
            max_active_positions: default_max_active_positions(),
            min_confidence_threshold: default_min_confidence_threshold(),
            stop_loss_percent: default_stop_loss_percent(),
            take_profit_percent: default_take_profit_percent(),
            risk_free_rate: Decimal::ZERO,
            metrics_window: default_metrics_window(),
        }
    }
}

/// Fee configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeConfig {
    /// Percent of notional charged per fill
    #[serde(default = "default_trading_fee_percent")]
    pub trading_fee_percent: Decimal,
}

fn default_trading_fee_percent() -> Decimal {
    dec!(0.05)
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            trading_fee_percent: default_trading_fee_percent(),
        }
    }
}

/// Market data configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Window for market-state statistics
    #[serde(default = "default_market_state_window_minutes")]
    pub market_state_window_minutes: i64,
}

fn default_feed_url() -> String {
    crate::feed::BINANCE_API_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_market_state_window_minutes() -> i64 {
    240
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_url(),
            timeout_secs: default_timeout_secs(),
            market_state_window_minutes: default_market_state_window_minutes(),
        }
    }
}

/// Decision oracle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleSettings {
    /// Always hold when unset
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Recent trades included in the oracle context
    #[serde(default = "default_context_trades")]
    pub context_trades: usize,
}

fn default_context_trades() -> usize {
    20
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            context_trades: default_context_trades(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Failed writes kept for retry
    #[serde(default = "default_max_pending_writes")]
    pub max_pending_writes: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_max_pending_writes() -> usize {
    1000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_pending_writes: default_max_pending_writes(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {key}={value}: {e}"))
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by upper-case setting name
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(v) = lookup("MAX_LEVERAGE") {
            self.risk.max_leverage = parse_override("MAX_LEVERAGE", &v)?;
        }
        if let Some(v) = lookup("DEFAULT_LEVERAGE") {
            self.risk.default_leverage = parse_override("DEFAULT_LEVERAGE", &v)?;
        }
        if let Some(v) = lookup("MAX_POSITION_SIZE") {
            self.risk.max_position_size = parse_override("MAX_POSITION_SIZE", &v)?;
        }
        if let Some(v) = lookup("MAX_ACTIVE_POSITIONS") {
            self.risk.max_active_positions = parse_override("MAX_ACTIVE_POSITIONS", &v)?;
        }
        if let Some(v) = lookup("MIN_CONFIDENCE_THRESHOLD") {
            self.risk.min_confidence_threshold = parse_override("MIN_CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("STOP_LOSS_PERCENT") {
            self.risk.stop_loss_percent = parse_override("STOP_LOSS_PERCENT", &v)?;
        }
        if let Some(v) = lookup("TAKE_PROFIT_PERCENT") {
            self.risk.take_profit_percent = parse_override("TAKE_PROFIT_PERCENT", &v)?;
        }
        if let Some(v) = lookup("TRADING_FEE_PERCENT") {
            self.fees.trading_fee_percent = parse_override("TRADING_FEE_PERCENT", &v)?;
        }
        if let Some(v) = lookup("RUN_INTERVAL_SECONDS") {
            self.trading.run_interval_secs = parse_override("RUN_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = lookup("INITIAL_BALANCE") {
            self.trading.initial_balance = parse_override("INITIAL_BALANCE", &v)?;
        }
        if let Some(v) = lookup("ORACLE_API_KEY") {
            self.oracle.api_key = Some(v);
        }
        Ok(())
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> anyhow::Result<()> {
        let risk = &self.risk;
        if risk.max_leverage < dec!(1) {
            anyhow::bail!("max_leverage must be at least 1, got {}", risk.max_leverage);
        }
        if risk.default_leverage < dec!(1) || risk.default_leverage > risk.max_leverage {
            anyhow::bail!(
                "default_leverage {} must lie in [1, {}]",
                risk.default_leverage,
                risk.max_leverage
            );
        }
        if risk.max_position_size <= dec!(0) || risk.max_position_size > dec!(1) {
            anyhow::bail!(
                "max_position_size must be in (0, 1], got {}",
                risk.max_position_size
            );
        }
        if risk.min_confidence_threshold < dec!(0) || risk.min_confidence_threshold > dec!(1) {
            anyhow::bail!(
                "min_confidence_threshold must be in [0, 1], got {}",
                risk.min_confidence_threshold
            );
        }
        if risk.max_active_positions == 0 {
            anyhow::bail!("max_active_positions must be positive");
        }
        if risk.stop_loss_percent < dec!(0) || risk.take_profit_percent < dec!(0) {
            anyhow::bail!("exit plan percentages must not be negative");
        }
        if risk.metrics_window < 2 {
            anyhow::bail!("metrics_window must be at least 2");
        }
        if self.fees.trading_fee_percent < dec!(0) {
            anyhow::bail!("trading_fee_percent must not be negative");
        }
        if self.trading.initial_balance <= dec!(0) {
            anyhow::bail!("initial_balance must be positive");
        }
        if self.trading.run_interval_secs == 0 {
            anyhow::bail!("run_interval_secs must be positive");
        }
        if self.trading.symbol.trim().is_empty() {
            anyhow::bail!("symbol must not be empty");
        }
        if self.feed.timeout_secs == 0 || self.oracle.timeout_secs == 0 {
            anyhow::bail!("timeouts must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [trading]
            symbol = "ETHUSDT"
            initial_balance = 5000
            run_interval_secs = 60

            [risk]
            max_leverage = 20
            default_leverage = 3
            max_position_size = 0.25
            max_active_positions = 2
            min_confidence_threshold = 0.7

            [fees]
            trading_fee_percent = 0.04

            [oracle]
            endpoint = "http://localhost:8000/decide"
            timeout_secs = 45

            [storage]
            data_dir = "/tmp/perp-agent"

            [telemetry]
            log_level = "debug"
            log_format = "json"
            metrics_port = 9090
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.trading.symbol, "ETHUSDT");
        assert_eq!(config.risk.max_leverage, dec!(20));
        assert_eq!(config.risk.max_active_positions, 2);
        assert_eq!(config.fees.trading_fee_percent, dec!(0.04));
        assert_eq!(config.oracle.timeout_secs, 45);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert_eq!(config.telemetry.metrics_port, Some(9090));
        // Unset keys fall back to defaults
        assert_eq!(config.risk.stop_loss_percent, dec!(2));
        assert_eq!(config.feed.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.trading.initial_balance, dec!(10000));
        assert_eq!(config.risk.max_leverage, dec!(10));
        assert!(config.oracle.endpoint.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bundled_example_parses() {
        let config: Config = toml::from_str(include_str!("../config.toml.example")).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("MAX_LEVERAGE", "5"),
            ("MAX_ACTIVE_POSITIONS", "3"),
            ("RUN_INTERVAL_SECONDS", "60"),
            ("INITIAL_BALANCE", "2500.50"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.risk.max_leverage, dec!(5));
        assert_eq!(config.risk.max_active_positions, 3);
        assert_eq!(config.trading.run_interval_secs, 60);
        assert_eq!(config.trading.initial_balance, dec!(2500.50));
    }

    #[test]
    fn test_invalid_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == "MAX_LEVERAGE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_LEVERAGE"));
    }

    #[test]
    fn test_validate_rejects_bad_leverage() {
        let mut config = Config::default();
        config.risk.max_leverage = dec!(0.5);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.risk.default_leverage = dec!(20);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.trading.run_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_fraction_out_of_range() {
        let mut config = Config::default();
        config.risk.max_position_size = dec!(1.5);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.risk.min_confidence_threshold = dec!(-0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = Config::default();
        config.oracle.api_key = Some("secret".to_string());
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }
}
