//! Cycle orchestrator
//!
//! Runs one cooperative loop per symbol:
//! 1. fetch the price and mark positions
//! 2. force closes whose exit plan fired
//! 3. ask the oracle for a decision
//! 4. validate it against the risk policy
//! 5. apply it to the ledger
//! 6. snapshot, recompute metrics and persist
//!
//! The stop signal is only observed between cycles and while sleeping, so a
//! ledger mutation is never interrupted.

use super::persist::{PendingWrite, WriteBuffer};
use super::state::{CycleOutcome, CycleState, DecisionOutcome, HoldReason};
use crate::analytics::{BehavioralMetrics, DrawdownTracker, RiskMetrics, RiskMetricsEngine};
use crate::config::Config;
use crate::decision::{parse_decision, Decision};
use crate::exit::ExitMonitor;
use crate::feed::{MarketData, PriceTick};
use crate::ledger::{Ledger, LedgerConfig, PortfolioSnapshot, Trade};
use crate::oracle::{DecisionOracle, OracleContext};
use crate::risk::{RiskLimits, RiskPolicy};
use crate::store::Store;
use crate::telemetry::{
    increment, increment_with_reason, record_latency, set_gauge, CounterMetric, GaugeMetric,
    LatencyMetric,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Orchestrator parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: String,
    pub run_interval: Duration,
    pub price_timeout: Duration,
    pub oracle_timeout: Duration,
    /// Recent trades included in the oracle context
    pub context_trades: usize,
    pub metrics_window: usize,
    pub risk_free_rate: Decimal,
    /// Window for market-state statistics
    pub market_state_window: chrono::Duration,
    pub max_pending_writes: usize,
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            symbol: config.trading.symbol.to_uppercase(),
            run_interval: Duration::from_secs(config.trading.run_interval_secs),
            price_timeout: Duration::from_secs(config.feed.timeout_secs),
            oracle_timeout: Duration::from_secs(config.oracle.timeout_secs),
            context_trades: config.oracle.context_trades,
            metrics_window: config.risk.metrics_window,
            risk_free_rate: config.risk.risk_free_rate,
            market_state_window: chrono::Duration::minutes(config.feed.market_state_window_minutes),
            max_pending_writes: config.storage.max_pending_writes,
        }
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.try_into().unwrap_or(0.0)
}

/// Owns the ledger and drives the trading loop for one symbol
pub struct Orchestrator<M: ?Sized, O: ?Sized, S: ?Sized> {
    config: EngineConfig,
    feed: Arc<M>,
    oracle: Arc<O>,
    store: Arc<S>,
    ledger: Ledger,
    policy: RiskPolicy,
    risk_engine: RiskMetricsEngine,
    exit_monitor: ExitMonitor,
    /// Total value of the trailing `metrics_window` snapshots, oldest first
    equity_window: Vec<Decimal>,
    /// Peak and drawdown over every snapshot
    drawdown: DrawdownTracker,
    last_risk: RiskMetrics,
    writes: WriteBuffer,
    state: CycleState,
    cycles: u64,
}

impl<M, O, S> Orchestrator<M, O, S>
where
    M: MarketData + ?Sized,
    O: DecisionOracle + ?Sized,
    S: Store + ?Sized,
{
    /// Create an orchestrator around an existing ledger
    pub fn new(
        config: EngineConfig,
        limits: RiskLimits,
        ledger: Ledger,
        feed: Arc<M>,
        oracle: Arc<O>,
        store: Arc<S>,
    ) -> Self {
        let risk_engine = RiskMetricsEngine::new(
            config.run_interval.as_secs(),
            config.metrics_window,
            config.risk_free_rate,
        );
        Self {
            exit_monitor: ExitMonitor::new(config.market_state_window),
            writes: WriteBuffer::new(config.max_pending_writes),
            equity_window: Vec::new(),
            drawdown: DrawdownTracker::new(),
            last_risk: RiskMetrics::default(),
            policy: RiskPolicy::new(limits),
            state: CycleState::Idle,
            cycles: 0,
            risk_engine,
            config,
            ledger,
            feed,
            oracle,
            store,
        }
    }

    /// Rebuild state from the store and create an orchestrator
    pub async fn resume(
        config: &Config,
        feed: Arc<M>,
        oracle: Arc<O>,
        store: Arc<S>,
    ) -> anyhow::Result<Self> {
        let trades = store.query_recent_trades(usize::MAX).await?;
        let positions = store.get_open_positions().await?;
        let snapshots = store.query_snapshots(DateTime::<Utc>::MIN_UTC).await?;

        let ledger = Ledger::restore(LedgerConfig::from_config(config), positions, trades);
        let mut orchestrator = Self::new(
            EngineConfig::from_config(config),
            RiskLimits::from(&config.risk),
            ledger,
            feed,
            oracle,
            store,
        );
        for snapshot in &snapshots {
            orchestrator.record_equity(snapshot.total_value);
        }

        if let Some(last) = snapshots.last() {
            let rebuilt = orchestrator.ledger.snapshot(last.timestamp);
            if rebuilt.cash_balance != last.cash_balance {
                tracing::warn!(
                    snapshot_cash = %last.cash_balance,
                    replayed_cash = %rebuilt.cash_balance,
                    "Trade log and last snapshot disagree, using trade log"
                );
            }
        }
        Ok(orchestrator)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Trailing equity values used for return statistics
    pub fn equity_history(&self) -> &[Decimal] {
        &self.equity_window
    }

    pub fn drawdown(&self) -> &DrawdownTracker {
        &self.drawdown
    }

    pub fn risk_metrics(&self) -> &RiskMetrics {
        &self.last_risk
    }

    /// Writes still waiting for the store
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    fn record_equity(&mut self, value: Decimal) {
        self.drawdown.update(value);
        self.equity_window.push(value);
        let excess = self.equity_window.len().saturating_sub(self.config.metrics_window.max(2));
        if excess > 0 {
            self.equity_window.drain(..excess);
        }
    }

    fn transition(&mut self, next: CycleState) {
        tracing::trace!(from = %self.state, to = %next, "Cycle state");
        self.state = next;
    }

    /// Run until the stop signal turns true
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        tracing::info!(
            symbol = %self.config.symbol,
            interval_secs = self.config.run_interval.as_secs(),
            oracle = self.oracle.name(),
            "Starting trading loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            self.transition(CycleState::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(self.config.run_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.stop().await;
        Ok(())
    }

    /// Flush what can be flushed and enter the terminal state
    pub async fn stop(&mut self) {
        let remaining = self.writes.flush(self.store.as_ref()).await;
        if remaining > 0 {
            tracing::error!(remaining, "Stopping with unpersisted writes");
        }
        self.transition(CycleState::Stopped);
        tracing::info!(cycles = self.cycles, "Trading loop stopped");
    }

    /// Execute one full cycle
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let started = Instant::now();
        self.cycles += 1;
        increment(CounterMetric::Cycles);

        let mut outcome = CycleOutcome::default();

        self.transition(CycleState::FetchingPrice);
        let Some(tick) = self.fetch_price().await else {
            self.transition(CycleState::Idle);
            return outcome;
        };
        let price = tick.price;
        let now = tick.timestamp;
        set_gauge(GaugeMetric::Price, to_f64(price));

        self.exit_monitor.observe(&tick);
        self.ledger.mark_to_market(&self.config.symbol, price);

        self.transition(CycleState::MonitoringExitPlans);
        outcome.forced_exits = self.enforce_exit_plans(price, now);

        self.transition(CycleState::AwaitingDecision);
        let decision = match self.request_decision(&tick).await {
            Ok(decision) => decision,
            Err(reason) => {
                outcome.decision = Some(DecisionOutcome::Hold(reason));
                outcome.tick = Some(tick);
                let (snapshot, behavior) = self.finish_cycle(now).await;
                outcome.snapshot = Some(snapshot);
                outcome.behavior = Some(behavior);
                record_latency(LatencyMetric::Cycle, started.elapsed());
                return outcome;
            }
        };

        self.transition(CycleState::Validating);
        let portfolio = self.ledger.portfolio_state(&self.config.symbol, price);
        let decision_outcome = match self.policy.validate(&decision, &portfolio) {
            Ok(validated) if validated.is_hold() => {
                tracing::info!(justification = %decision.justification, "Oracle holds");
                DecisionOutcome::Hold(HoldReason::Decided)
            }
            Ok(validated) => {
                for adjustment in &validated.adjustments {
                    tracing::info!(?adjustment, "Decision adjusted by risk policy");
                }
                self.transition(CycleState::Executing);
                match self.ledger.apply(&validated, price, now) {
                    Ok(trade) => {
                        self.record_trade(&trade);
                        DecisionOutcome::Executed(trade)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Execution failed, ledger unchanged");
                        DecisionOutcome::ExecutionFailed(e)
                    }
                }
            }
            Err(rejection) => {
                increment_with_reason(CounterMetric::Rejections, rejection.kind());
                tracing::warn!(
                    reason = %rejection,
                    action = ?decision.action,
                    direction = ?decision.direction,
                    confidence = %decision.confidence,
                    "Decision rejected, holding"
                );
                DecisionOutcome::Rejected(rejection)
            }
        };

        outcome.decision = Some(decision_outcome);
        outcome.tick = Some(tick);
        let (snapshot, behavior) = self.finish_cycle(now).await;
        outcome.snapshot = Some(snapshot);
        outcome.behavior = Some(behavior);
        record_latency(LatencyMetric::Cycle, started.elapsed());
        outcome
    }

    async fn fetch_price(&self) -> Option<PriceTick> {
        let started = Instant::now();
        let result =
            tokio::time::timeout(self.config.price_timeout, self.feed.get_price(&self.config.symbol))
                .await;
        record_latency(LatencyMetric::PriceFetch, started.elapsed());

        match result {
            Ok(Ok(tick)) if tick.price > Decimal::ZERO => Some(tick),
            Ok(Ok(tick)) => {
                increment_with_reason(CounterMetric::CollaboratorFailures, "price");
                tracing::warn!(price = %tick.price, "Non-positive price, skipping cycle");
                None
            }
            Ok(Err(e)) => {
                increment_with_reason(CounterMetric::CollaboratorFailures, "price");
                tracing::warn!(error = %e, "Price fetch failed, skipping cycle");
                None
            }
            Err(_) => {
                increment_with_reason(CounterMetric::CollaboratorFailures, "price");
                tracing::warn!(
                    timeout_secs = self.config.price_timeout.as_secs(),
                    "Price fetch timed out, skipping cycle"
                );
                None
            }
        }
    }

    /// Close every position whose exit plan fired
    fn enforce_exit_plans(&mut self, price: Decimal, now: DateTime<Utc>) -> Vec<Trade> {
        let signals = self
            .exit_monitor
            .check(self.ledger.positions(), &self.config.symbol, price);

        let mut trades = Vec::new();
        for signal in signals {
            let portfolio = self.ledger.portfolio_state(&signal.symbol, price);
            let validated = match self.policy.validate(&signal.decision, &portfolio) {
                Ok(validated) => validated.with_reason(signal.reason.clone()),
                Err(rejection) => {
                    tracing::error!(reason = %rejection, "Forced close rejected");
                    continue;
                }
            };

            self.transition(CycleState::Executing);
            match self.ledger.apply(&validated, price, now) {
                Ok(trade) => {
                    increment(CounterMetric::ForcedExits);
                    self.record_trade(&trade);
                    trades.push(trade);
                }
                Err(e) => {
                    tracing::error!(error = %e, reason = %signal.reason, "Forced close failed");
                }
            }
        }
        trades
    }

    /// Ask the oracle; any failure becomes a hold reason
    async fn request_decision(&self, tick: &PriceTick) -> Result<Decision, HoldReason> {
        let context = self.build_context(tick);
        let started = Instant::now();
        let result =
            tokio::time::timeout(self.config.oracle_timeout, self.oracle.decide(&context)).await;
        record_latency(LatencyMetric::OracleCall, started.elapsed());

        let reply = match result {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                increment_with_reason(CounterMetric::CollaboratorFailures, "oracle");
                tracing::warn!(oracle = self.oracle.name(), error = %e, "Oracle failed, holding");
                return Err(HoldReason::OracleFailed(e.to_string()));
            }
            Err(_) => {
                increment_with_reason(CounterMetric::CollaboratorFailures, "oracle");
                tracing::warn!(
                    oracle = self.oracle.name(),
                    timeout_secs = self.config.oracle_timeout.as_secs(),
                    "Oracle timed out, holding"
                );
                return Err(HoldReason::OracleTimeout);
            }
        };

        parse_decision(&reply).map_err(|e| {
            increment_with_reason(CounterMetric::Rejections, "malformed");
            tracing::warn!(reason = %e.reason, "Malformed oracle reply, holding");
            HoldReason::Malformed(e.reason)
        })
    }

    fn build_context(&self, tick: &PriceTick) -> OracleContext {
        let trades = self.ledger.trades();
        let start = trades.len().saturating_sub(self.config.context_trades);
        OracleContext {
            timestamp: tick.timestamp,
            symbol: self.config.symbol.clone(),
            price: tick.price,
            volume: tick.volume,
            market_flags: self.exit_monitor.market_state().flags().into_iter().collect(),
            portfolio: self.ledger.snapshot(tick.timestamp).with_risk(&self.last_risk),
            positions: self.ledger.positions().cloned().collect(),
            risk: self.last_risk.clone(),
            behavior: BehavioralMetrics::compute(trades, self.ledger.positions(), tick.timestamp),
            recent_trades: trades[start..].to_vec(),
            limits: self.policy.limits().clone(),
        }
    }

    fn record_trade(&mut self, trade: &Trade) {
        increment(CounterMetric::Trades);
        self.writes.push(PendingWrite::Trade(trade.clone()));
        if let Some(position) = self.ledger.latest_position(&trade.symbol) {
            self.writes.push(PendingWrite::Position(position.clone()));
        }
    }

    /// Snapshot, metrics, persistence
    async fn finish_cycle(&mut self, now: DateTime<Utc>) -> (PortfolioSnapshot, BehavioralMetrics) {
        self.transition(CycleState::Snapshotting);

        let snapshot = self.ledger.snapshot(now);
        self.record_equity(snapshot.total_value);
        self.last_risk = self.risk_engine.compute_with_drawdown(
            &self.equity_window,
            &self.drawdown,
            self.ledger.initial_balance(),
            self.ledger.trades(),
        );
        let snapshot = snapshot.with_risk(&self.last_risk);
        let behavior =
            BehavioralMetrics::compute(self.ledger.trades(), self.ledger.positions(), now);

        for position in self.ledger.positions() {
            self.writes.push(PendingWrite::Position(position.clone()));
        }
        self.writes.push(PendingWrite::Snapshot(snapshot.clone()));
        self.writes.push(PendingWrite::Behavior(behavior.clone()));
        self.writes.flush(self.store.as_ref()).await;

        self.publish_gauges(&snapshot);
        tracing::info!(
            equity = %snapshot.total_value,
            cash = %snapshot.cash_balance,
            unrealized = %snapshot.unrealized_pnl,
            positions = snapshot.active_position_count,
            sharpe = ?snapshot.sharpe_ratio,
            max_drawdown = %snapshot.max_drawdown,
            bullish_tilt = %behavior.bullish_tilt,
            "Cycle complete"
        );
        (snapshot, behavior)
    }

    fn publish_gauges(&self, snapshot: &PortfolioSnapshot) {
        set_gauge(GaugeMetric::Equity, to_f64(snapshot.total_value));
        set_gauge(GaugeMetric::Cash, to_f64(snapshot.cash_balance));
        set_gauge(GaugeMetric::UnrealizedPnl, to_f64(snapshot.unrealized_pnl));
        set_gauge(
            GaugeMetric::RealizedPnl,
            to_f64(snapshot.realized_pnl_cumulative),
        );
        set_gauge(
            GaugeMetric::OpenPositions,
            snapshot.active_position_count as f64,
        );
        set_gauge(
            GaugeMetric::MaxDrawdownPct,
            to_f64(self.last_risk.max_drawdown_pct),
        );
        if let Some(sharpe) = self.last_risk.sharpe_ratio {
            set_gauge(GaugeMetric::SharpeRatio, sharpe);
        }
    }
}
