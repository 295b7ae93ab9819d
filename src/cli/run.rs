//! Run command implementation

use crate::config::Config;
use crate::engine::{DecisionOutcome, Orchestrator};
use crate::feed::{BinanceConfig, BinanceTicker};
use crate::oracle::{DecisionOracle, HoldOracle, HttpOracle, OracleConfig};
use crate::store::JsonlStore;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Override the configured symbol
    #[arg(short, long)]
    pub symbol: Option<String>,
}

impl RunArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if let Some(symbol) = &self.symbol {
            config.trading.symbol = symbol.to_uppercase();
        }

        let feed = Arc::new(BinanceTicker::new(BinanceConfig {
            base_url: config.feed.base_url.clone(),
            timeout: Duration::from_secs(config.feed.timeout_secs),
        })?);

        let oracle: Arc<dyn DecisionOracle> = match &config.oracle.endpoint {
            Some(endpoint) => Arc::new(HttpOracle::new(OracleConfig {
                endpoint: endpoint.clone(),
                api_key: config.oracle.api_key.clone(),
                timeout: Duration::from_secs(config.oracle.timeout_secs),
            })?),
            None => {
                tracing::warn!("No oracle endpoint configured, every cycle will hold");
                Arc::new(HoldOracle)
            }
        };

        let store = Arc::new(JsonlStore::open(&config.storage.data_dir).await?);
        let mut orchestrator = Orchestrator::resume(&config, feed, oracle, store).await?;

        if self.once {
            let outcome = orchestrator.run_cycle().await;
            orchestrator.stop().await;

            match (&outcome.tick, &outcome.decision) {
                (None, _) => println!("Cycle skipped: no price"),
                (Some(tick), decision) => {
                    println!("Price:    {} {}", tick.symbol, tick.price);
                    for trade in &outcome.forced_exits {
                        println!("Forced:   {:?} {} @ {}", trade.close_reason, trade.quantity, trade.price);
                    }
                    match decision {
                        Some(DecisionOutcome::Executed(trade)) => println!(
                            "Executed: {:?} {} {} @ {} (fee {})",
                            trade.kind, trade.direction, trade.quantity, trade.price, trade.trading_fee
                        ),
                        Some(other) => println!("Decision: {other:?}"),
                        None => {}
                    }
                }
            }
            if let Some(snapshot) = &outcome.snapshot {
                println!("Equity:   {:.2}", snapshot.total_value);
            }
            return Ok(());
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping after the current cycle");
                let _ = stop_tx.send(true);
            }
        });

        orchestrator.run(stop_rx).await
    }
}
