//! Prometheus metrics

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Market data fetch
    PriceFetch,
    /// Oracle round trip
    OracleCall,
    /// Whole cycle
    Cycle,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Total portfolio value
    Equity,
    /// Free cash
    Cash,
    UnrealizedPnl,
    RealizedPnl,
    OpenPositions,
    /// Largest drawdown, in percent
    MaxDrawdownPct,
    SharpeRatio,
    /// Last observed price
    Price,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    Cycles,
    Trades,
    /// Decisions rejected by the risk policy
    Rejections,
    /// Price or oracle failures
    CollaboratorFailures,
    PersistenceFailures,
    /// Closes forced by an exit plan
    ForcedExits,
}

fn latency_name(metric: LatencyMetric) -> &'static str {
    match metric {
        LatencyMetric::PriceFetch => "perp_agent_price_fetch_latency_ms",
        LatencyMetric::OracleCall => "perp_agent_oracle_latency_ms",
        LatencyMetric::Cycle => "perp_agent_cycle_latency_ms",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::Equity => "perp_agent_equity_usdt",
        GaugeMetric::Cash => "perp_agent_cash_usdt",
        GaugeMetric::UnrealizedPnl => "perp_agent_unrealized_pnl_usdt",
        GaugeMetric::RealizedPnl => "perp_agent_realized_pnl_usdt",
        GaugeMetric::OpenPositions => "perp_agent_open_positions",
        GaugeMetric::MaxDrawdownPct => "perp_agent_max_drawdown_pct",
        GaugeMetric::SharpeRatio => "perp_agent_sharpe_ratio",
        GaugeMetric::Price => "perp_agent_price",
    }
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::Cycles => "perp_agent_cycles_total",
        CounterMetric::Trades => "perp_agent_trades_total",
        CounterMetric::Rejections => "perp_agent_rejections_total",
        CounterMetric::CollaboratorFailures => "perp_agent_collaborator_failures_total",
        CounterMetric::PersistenceFailures => "perp_agent_persistence_failures_total",
        CounterMetric::ForcedExits => "perp_agent_forced_exits_total",
    }
}

/// Start the Prometheus scrape endpoint on `port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(latency_name(metric)).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}

/// Increment a counter
pub fn increment(metric: CounterMetric) {
    metrics::counter!(counter_name(metric)).increment(1);
}

/// Increment a counter with a `reason` label
pub fn increment_with_reason(metric: CounterMetric, reason: &'static str) {
    metrics::counter!(counter_name(metric), "reason" => reason).increment(1);
}
