//! Status command implementation

use crate::config::Config;
use crate::store::{JsonlStore, Store};
use clap::Args;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = JsonlStore::open(&config.storage.data_dir).await?;
        let positions = store.get_open_positions().await?;
        let snapshot = store.latest_snapshot().await?;

        if self.json {
            let status = serde_json::json!({
                "symbol": config.trading.symbol,
                "snapshot": snapshot,
                "positions": positions,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }

        println!("perp-agent status ({})", config.trading.symbol);
        match &snapshot {
            Some(s) => {
                println!("  Last snapshot: {}", s.timestamp);
                println!("  Equity:        {:.2}", s.total_value);
                println!("  Cash:          {:.2}", s.cash_balance);
                println!("  Realized P&L:  {:+.2}", s.realized_pnl_cumulative);
                println!("  Fees paid:     {:.2}", s.total_fees_cumulative);
            }
            None => println!("  No snapshots yet"),
        }

        if positions.is_empty() {
            println!("  Open positions: none");
        }
        for p in &positions {
            println!(
                "  {} {} {} @ {} x{:.2} margin {:.2} uPnL {:+.2} (SL {} / TP {})",
                p.symbol,
                p.side,
                p.quantity,
                p.avg_entry_price,
                p.leverage,
                p.margin_used,
                p.unrealized_pnl,
                p.exit_plan.stop_loss,
                p.exit_plan.profit_target,
            );
        }
        Ok(())
    }
}
