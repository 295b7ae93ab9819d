//! Scripted collaborators for driving the orchestrator

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use perp_agent::analytics::BehavioralMetrics;
use perp_agent::engine::{EngineConfig, Orchestrator};
use perp_agent::feed::{MarketData, PriceTick};
use perp_agent::ledger::{Ledger, LedgerConfig, PortfolioSnapshot, Position, Trade};
use perp_agent::oracle::{DecisionOracle, OracleContext};
use perp_agent::risk::{FeeModel, RiskLimits};
use perp_agent::store::{MemoryStore, Store, StoreError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SYMBOL: &str = "BTCUSDT";

/// Replays a fixed price sequence; `None` entries fail the fetch
pub struct ScriptedFeed {
    prices: Mutex<VecDeque<Option<Decimal>>>,
}

impl ScriptedFeed {
    pub fn new(prices: impl IntoIterator<Item = Option<Decimal>>) -> Self {
        Self {
            prices: Mutex::new(prices.into_iter().collect()),
        }
    }
}

#[async_trait]
impl MarketData for ScriptedFeed {
    async fn get_price(&self, symbol: &str) -> anyhow::Result<PriceTick> {
        let next = self.prices.lock().unwrap().pop_front();
        match next {
            Some(Some(price)) => Ok(PriceTick::new(symbol, price, dec!(100))),
            Some(None) => anyhow::bail!("exchange unavailable"),
            None => anyhow::bail!("price script exhausted"),
        }
    }
}

/// Replies from a queue, holding once it runs dry
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_context: Mutex<Option<OracleContext>>,
}

impl ScriptedOracle {
    pub fn new(replies: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            delay: None,
            calls: AtomicUsize::new(0),
            last_context: Mutex::new(None),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new([])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> Option<OracleContext> {
        self.last_context.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(&self, context: &OracleContext) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_context.lock().unwrap() = Some(context.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| r#"{"action": "hold"}"#.to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Memory store that refuses every write while `failing` is set
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn append_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        self.check()?;
        self.inner.append_trade(trade).await
    }

    async fn append_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), StoreError> {
        self.check()?;
        self.inner.append_snapshot(snapshot).await
    }

    async fn query_recent_trades(&self, limit: usize) -> Result<Vec<Trade>, StoreError> {
        self.inner.query_recent_trades(limit).await
    }

    async fn query_snapshots(&self, since: DateTime<Utc>) -> Result<Vec<PortfolioSnapshot>, StoreError> {
        self.inner.query_snapshots(since).await
    }

    async fn get_open_positions(&self) -> Result<Vec<Position>, StoreError> {
        self.inner.get_open_positions().await
    }

    async fn upsert_position(&self, position: &Position) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_position(position).await
    }

    async fn append_behavior(&self, metrics: &BehavioralMetrics) -> Result<(), StoreError> {
        self.check()?;
        self.inner.append_behavior(metrics).await
    }

    async fn query_behavior(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<BehavioralMetrics>, StoreError> {
        self.inner.query_behavior(since).await
    }
}

pub fn engine_config() -> EngineConfig {
    EngineConfig {
        symbol: SYMBOL.to_string(),
        run_interval: Duration::from_secs(300),
        price_timeout: Duration::from_millis(200),
        oracle_timeout: Duration::from_millis(200),
        context_trades: 20,
        metrics_window: 288,
        risk_free_rate: Decimal::ZERO,
        market_state_window: chrono::Duration::minutes(240),
        max_pending_writes: 1000,
    }
}

pub fn ledger() -> Ledger {
    Ledger::new(LedgerConfig {
        initial_balance: dec!(10000),
        fees: FeeModel::new(dec!(0.05)),
        stop_loss_percent: Decimal::ZERO,
        take_profit_percent: Decimal::ZERO,
    })
}

pub type TestOrchestrator<S> = Orchestrator<ScriptedFeed, ScriptedOracle, S>;

pub fn orchestrator<S: Store>(
    feed: ScriptedFeed,
    oracle: Arc<ScriptedOracle>,
    store: Arc<S>,
) -> TestOrchestrator<S> {
    Orchestrator::new(
        engine_config(),
        RiskLimits::default(),
        ledger(),
        Arc::new(feed),
        oracle,
        store,
    )
}

pub const OPEN_LONG: &str = r#"{
    "action": "buy",
    "direction": "long",
    "confidence": 0.8,
    "leverage": 2,
    "position_size_usdt": 500,
    "justification": "Breakout above range high",
    "exit_plan": {"profit_target": 52000, "stop_loss": 49000}
}"#;
