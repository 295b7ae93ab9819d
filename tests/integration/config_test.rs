//! Configuration loading from disk

use perp_agent::config::{Config, LogFormat};
use perp_agent::risk::RiskLimits;
use rust_decimal_macros::dec;
use std::io::Write;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [trading]
        symbol = "ETHUSDT"
        initial_balance = 2500

        [risk]
        max_leverage = 5
        min_confidence_threshold = 0.7

        [telemetry]
        log_format = "json"
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.trading.symbol, "ETHUSDT");
    assert_eq!(config.trading.initial_balance, dec!(2500));
    assert_eq!(config.telemetry.log_format, LogFormat::Json);

    let limits = RiskLimits::from(&config.risk);
    assert_eq!(limits.max_leverage, dec!(5));
    assert_eq!(limits.min_confidence_threshold, dec!(0.7));
}

#[test]
fn test_effective_config_round_trips() {
    let config = Config::default();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.trading.symbol, config.trading.symbol);
    assert_eq!(parsed.risk.max_leverage, config.risk.max_leverage);
    assert_eq!(parsed.storage.data_dir, config.storage.data_dir);
}
