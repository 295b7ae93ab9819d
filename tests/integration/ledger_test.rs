//! Ledger, policy and metrics working together, plus restart recovery

use crate::support::*;
use chrono::{Duration, TimeZone, Utc};
use perp_agent::analytics::{BehavioralMetrics, RiskMetricsEngine};
use perp_agent::config::Config;
use perp_agent::decision::parse_decision;
use perp_agent::engine::Orchestrator;
use perp_agent::ledger::{Ledger, TradeKind};
use perp_agent::risk::{RiskLimits, RiskPolicy};
use perp_agent::store::{JsonlStore, Store};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn step(ledger: &mut Ledger, policy: &RiskPolicy, raw: &str, price: Decimal, minute: i64) {
    let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
    ledger.mark_to_market(SYMBOL, price);
    let decision = parse_decision(raw).unwrap();
    let validated = policy
        .validate(&decision, &ledger.portfolio_state(SYMBOL, price))
        .unwrap();
    ledger.apply(&validated, price, ts).unwrap();
}

#[test]
fn test_long_then_short_session() {
    let policy = RiskPolicy::new(RiskLimits::default());
    let mut ledger = ledger();

    step(&mut ledger, &policy, OPEN_LONG, dec!(50000), 0);
    step(
        &mut ledger,
        &policy,
        r#"{"action":"sell","direction":"long","confidence":0.9}"#,
        dec!(51000),
        60,
    );
    step(
        &mut ledger,
        &policy,
        r#"{"action":"sell","direction":"short","confidence":0.7,"leverage":4,"position_size_usdt":1000}"#,
        dec!(50000),
        120,
    );
    step(
        &mut ledger,
        &policy,
        r#"{"action":"buy","direction":"short","confidence":0.9}"#,
        dec!(51000),
        180,
    );

    let trades = ledger.trades();
    assert_eq!(trades.len(), 4);
    assert_eq!(trades[1].realized_pnl, Some(dec!(20)));
    assert_eq!(trades[3].realized_pnl, Some(dec!(-80)));
    assert_eq!(ledger.realized_pnl(), dec!(-60));
    assert_eq!(ledger.active_count(), 0);

    // every fee leaves cash, so the flat account lost PnL plus fees
    let expected = dec!(10000) + ledger.realized_pnl() - ledger.total_fees();
    assert_eq!(ledger.cash_balance(), expected);

    let engine = RiskMetricsEngine::new(300, 288, Decimal::ZERO);
    let equity = [dec!(10000), dec!(10019.5), dec!(9939)];
    let risk = engine.compute(&equity, dec!(10000), trades);
    assert_eq!(risk.closed_trades, 2);
    assert_eq!(risk.winning_trades, 1);
    assert_eq!(risk.win_rate, dec!(50));
    assert_eq!(risk.profit_factor, Some(dec!(0.25)));

    let behavior = BehavioralMetrics::compute(trades, ledger.positions(), trades[3].timestamp);
    assert_eq!(behavior.bullish_tilt, dec!(0.5));
    assert_eq!(behavior.total_trades, 4);
    assert_eq!(behavior.open_position_count, 0);
}

#[tokio::test]
async fn test_resume_from_jsonl_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.trading.symbol = SYMBOL.to_string();
    config.trading.initial_balance = dec!(10000);
    config.fees.trading_fee_percent = dec!(0.05);
    config.storage.data_dir = dir.path().to_path_buf();

    let store = Arc::new(JsonlStore::open(dir.path()).await.unwrap());
    let (cash, position_id) = {
        let feed = Arc::new(ScriptedFeed::new([Some(dec!(50000))]));
        let oracle = Arc::new(ScriptedOracle::new([OPEN_LONG]));
        let mut engine = Orchestrator::resume(&config, feed, oracle, store.clone())
            .await
            .unwrap();
        let outcome = engine.run_cycle().await;
        assert_eq!(outcome.executed().map(|t| t.kind), Some(TradeKind::Open));
        engine.stop().await;
        let position = engine.ledger().position(SYMBOL).unwrap();
        (engine.ledger().cash_balance(), position.id)
    };

    // fresh process over the same directory
    let store = Arc::new(JsonlStore::open(dir.path()).await.unwrap());
    assert_eq!(store.query_recent_trades(10).await.unwrap().len(), 1);

    let feed = Arc::new(ScriptedFeed::new([]));
    let oracle = Arc::new(ScriptedOracle::new([]));
    let engine = Orchestrator::resume(&config, feed, oracle, store).await.unwrap();

    assert_eq!(engine.ledger().cash_balance(), cash);
    assert_eq!(engine.ledger().cash_balance(), dec!(9749.75));
    assert_eq!(engine.ledger().position(SYMBOL).map(|p| p.id), Some(position_id));
    assert_eq!(engine.equity_history().len(), 1);
}
