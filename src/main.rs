use anyhow::Context;
use clap::Parser;
use perp_agent::cli::{Cli, Commands};
use perp_agent::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))
                .context("bundled default config is invalid")?
        }
    };
    config.apply_env_overrides()?;
    config.validate()?;

    // Initialize telemetry
    perp_agent::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(symbol = %config.trading.symbol, "Starting simulated trading");
            args.execute(config).await?;
        }
        Commands::Status(args) => {
            args.execute(&config).await?;
        }
        Commands::Report(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("# Effective configuration");
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
