//! Report command implementation

use crate::analytics::{BehavioralMetrics, PerformanceReport, RiskMetricsEngine};
use crate::config::Config;
use crate::store::{JsonlStore, Store};
use chrono::{DateTime, Utc};
use clap::Args;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReportArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = JsonlStore::open(&config.storage.data_dir).await?;
        let trades = store.query_recent_trades(usize::MAX).await?;
        let positions = store.get_open_positions().await?;
        let snapshots = store.query_snapshots(DateTime::<Utc>::MIN_UTC).await?;

        let engine = RiskMetricsEngine::new(
            config.trading.run_interval_secs,
            config.risk.metrics_window,
            config.risk.risk_free_rate,
        );
        let equity: Vec<_> = snapshots.iter().map(|s| s.total_value).collect();

        let report = PerformanceReport {
            symbol: config.trading.symbol.clone(),
            initial_balance: config.trading.initial_balance,
            risk: engine.compute(&equity, config.trading.initial_balance, &trades),
            behavior: BehavioralMetrics::compute(&trades, &positions, Utc::now()),
            snapshot: snapshots.into_iter().last(),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{}", report.format_table());
        }
        Ok(())
    }
}
