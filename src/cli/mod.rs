//! CLI interface for perp-agent
//!
//! Provides subcommands for:
//! - `run`: Start the trading loop
//! - `status`: Show open positions and the last snapshot
//! - `report`: Risk and behavioral metrics from persisted history
//! - `config`: Show the effective configuration

mod report;
mod run;
mod status;

pub use report::ReportArgs;
pub use run::RunArgs;
pub use status::StatusArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "perp-agent")]
#[command(about = "Simulated leveraged perpetuals trading agent")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the trading loop
    Run(RunArgs),
    /// Show open positions and the last snapshot
    Status(StatusArgs),
    /// Print the performance report
    Report(ReportArgs),
    /// Show the effective configuration
    Config,
}
