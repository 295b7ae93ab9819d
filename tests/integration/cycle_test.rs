//! Orchestrator cycles against scripted collaborators

use crate::support::*;
use perp_agent::engine::{CycleState, DecisionOutcome, HoldReason};
use perp_agent::ledger::{CloseReason, Side, TradeKind};
use perp_agent::store::{MemoryStore, Store};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn test_open_then_stop_loss_while_oracle_holds() {
    let oracle = Arc::new(ScriptedOracle::new([OPEN_LONG]));
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::new([Some(dec!(50000)), Some(dec!(48900))]);
    let mut engine = orchestrator(feed, oracle.clone(), store.clone());

    let first = engine.run_cycle().await;
    let opened = first.executed().expect("position opened");
    assert_eq!(opened.kind, TradeKind::Open);
    assert_eq!(opened.direction, Side::Long);
    assert_eq!(opened.quantity, dec!(0.01));
    assert_eq!(opened.margin_used, dec!(250));
    assert_eq!(opened.trading_fee, dec!(0.25));
    assert_eq!(engine.ledger().cash_balance(), dec!(9749.75));

    let second = engine.run_cycle().await;
    assert_eq!(second.forced_exits.len(), 1);
    let closed = &second.forced_exits[0];
    assert_eq!(closed.close_reason, Some(CloseReason::StopLoss));
    assert_eq!(closed.realized_pnl, Some(dec!(-22)));
    assert_eq!(
        second.decision,
        Some(DecisionOutcome::Hold(HoldReason::Decided))
    );

    assert_eq!(engine.ledger().active_count(), 0);
    assert_eq!(engine.ledger().cash_balance(), dec!(9977.5055));
    assert_eq!(oracle.calls(), 2);
    assert_eq!(store.trade_count().await, 2);
    assert_eq!(store.snapshot_count().await, 2);
    assert!(store.get_open_positions().await.unwrap().is_empty());
    assert_eq!(store.position_count().await, 0);
}

#[tokio::test]
async fn test_behavior_recorded_each_cycle() {
    let oracle = Arc::new(ScriptedOracle::new([OPEN_LONG]));
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::new([Some(dec!(50000)), Some(dec!(48900))]);
    let mut engine = orchestrator(feed, oracle, store.clone());

    let first = engine.run_cycle().await;
    let behavior = first.behavior.expect("behavior after open");
    assert_eq!(behavior.open_position_count, 1);
    assert_eq!(behavior.total_trades, 1);
    assert_eq!(behavior.bullish_tilt, dec!(1));

    let second = engine.run_cycle().await;
    let behavior = second.behavior.expect("behavior after stop");
    assert_eq!(behavior.open_position_count, 0);
    assert_eq!(behavior.total_trades, 2);

    assert_eq!(store.behavior_count().await, 2);
    let since = first.snapshot.expect("first snapshot").timestamp;
    let logged = store.query_behavior(since).await.unwrap();
    assert_eq!(logged.last(), Some(&behavior));
}

#[tokio::test]
async fn test_price_failure_skips_cycle() {
    let oracle = Arc::new(ScriptedOracle::new([OPEN_LONG]));
    let store = Arc::new(MemoryStore::new());
    let mut engine = orchestrator(ScriptedFeed::new([None]), oracle.clone(), store.clone());

    let outcome = engine.run_cycle().await;

    assert!(outcome.is_skipped());
    assert!(outcome.snapshot.is_none());
    assert!(outcome.behavior.is_none());
    assert_eq!(oracle.calls(), 0);
    assert_eq!(store.snapshot_count().await, 0);
    assert_eq!(engine.ledger().cash_balance(), dec!(10000));
    assert_eq!(engine.state(), CycleState::Idle);
}

#[tokio::test]
async fn test_malformed_reply_holds() {
    let oracle = Arc::new(ScriptedOracle::new(["I would buy some bitcoin here"]));
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::new([Some(dec!(50000))]);
    let mut engine = orchestrator(feed, oracle, store.clone());

    let outcome = engine.run_cycle().await;

    assert!(matches!(
        outcome.decision,
        Some(DecisionOutcome::Hold(HoldReason::Malformed(_)))
    ));
    assert_eq!(engine.ledger().trades().len(), 0);
    // the cycle still snapshots
    assert_eq!(store.snapshot_count().await, 1);
}

#[tokio::test]
async fn test_oracle_timeout_holds() {
    let oracle = Arc::new(ScriptedOracle::slow(Duration::from_secs(5)));
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::new([Some(dec!(50000))]);
    let mut engine = orchestrator(feed, oracle, store);

    let outcome = engine.run_cycle().await;

    assert_eq!(
        outcome.decision,
        Some(DecisionOutcome::Hold(HoldReason::OracleTimeout))
    );
    assert_eq!(
        outcome.snapshot.map(|s| s.total_value),
        Some(dec!(10000))
    );
}

#[tokio::test]
async fn test_excess_leverage_is_clamped() {
    let reply = r#"{"action":"buy","direction":"long","confidence":0.9,
        "leverage":50,"position_size_usdt":1000}"#;
    let oracle = Arc::new(ScriptedOracle::new([reply]));
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::new([Some(dec!(50000))]);
    let mut engine = orchestrator(feed, oracle, store);

    let outcome = engine.run_cycle().await;

    let trade = outcome.executed().expect("clamped trade executes");
    assert_eq!(trade.leverage, dec!(10));
    assert_eq!(trade.margin_used, dec!(100));
}

#[tokio::test]
async fn test_low_confidence_rejected() {
    let reply = r#"{"action":"buy","direction":"long","confidence":0.3,"position_size_usdt":500}"#;
    let oracle = Arc::new(ScriptedOracle::new([reply]));
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::new([Some(dec!(50000))]);
    let mut engine = orchestrator(feed, oracle, store);

    let outcome = engine.run_cycle().await;

    assert!(matches!(outcome.decision, Some(DecisionOutcome::Rejected(_))));
    assert_eq!(engine.ledger().active_count(), 0);
}

#[tokio::test]
async fn test_failed_writes_are_retried() {
    let oracle = Arc::new(ScriptedOracle::new([OPEN_LONG]));
    let store = Arc::new(FlakyStore::default());
    let feed = ScriptedFeed::new([Some(dec!(50000)), Some(dec!(50100))]);
    let mut engine = orchestrator(feed, oracle, store.clone());

    store.set_failing(true);
    let first = engine.run_cycle().await;
    assert!(first.executed().is_some());
    assert_eq!(store.inner.trade_count().await, 0);
    assert!(engine.pending_writes() > 0);
    // the ledger is unaffected by the store outage
    assert_eq!(engine.ledger().active_count(), 1);

    store.set_failing(false);
    engine.run_cycle().await;
    assert_eq!(engine.pending_writes(), 0);
    assert_eq!(store.inner.trade_count().await, 1);
    assert_eq!(store.inner.snapshot_count().await, 2);
    assert_eq!(store.inner.behavior_count().await, 2);
    assert_eq!(store.inner.get_open_positions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_context_carries_portfolio_and_limits() {
    let oracle = Arc::new(ScriptedOracle::new([OPEN_LONG]));
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::new([Some(dec!(50000)), Some(dec!(51000))]);
    let mut engine = orchestrator(feed, oracle.clone(), store);

    engine.run_cycle().await;
    engine.run_cycle().await;

    let context = oracle.last_context().expect("oracle was called");
    assert_eq!(context.symbol, SYMBOL);
    assert_eq!(context.price, dec!(51000));
    assert_eq!(context.positions.len(), 1);
    assert_eq!(context.positions[0].unrealized_pnl, dec!(20));
    assert_eq!(context.recent_trades.len(), 1);
    assert_eq!(context.limits.max_leverage, dec!(10));
}

#[tokio::test]
async fn test_stop_signal_ends_run() {
    let oracle = Arc::new(ScriptedOracle::new([]));
    let store = Arc::new(MemoryStore::new());
    let feed = ScriptedFeed::new([Some(dec!(50000))]);
    let mut engine = orchestrator(feed, oracle, store.clone());

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
    });

    tokio::time::timeout(Duration::from_secs(5), engine.run(rx))
        .await
        .expect("loop stops promptly")
        .unwrap();

    assert_eq!(engine.state(), CycleState::Stopped);
    assert_eq!(store.snapshot_count().await, 1);
}
