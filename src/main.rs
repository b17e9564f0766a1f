use clap::Parser;
use tracing_subscriber::EnvFilter;

use delta_vault::{backtest, validate};

mod cli;
mod example;
mod schema;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Schema => schema::run(),
        cli::Command::StateSchema => schema::run_state(),
        cli::Command::Validate { file } => validate::run(&file),
        cli::Command::Example => example::run(),
        cli::Command::Backtest {
            file,
            prices,
            deposit,
            fee_pips,
            pool_depth_multiple,
            yield_apr_bps,
            harvest_interval,
            seed,
            verbose,
            output,
            monte_carlo,
        } => backtest::run(&backtest::BacktestConfig {
            config_path: file,
            prices_path: prices,
            deposit,
            fee_pips,
            pool_depth_multiple,
            yield_apr_bps,
            harvest_interval_secs: harvest_interval,
            seed,
            verbose,
            output,
            monte_carlo: monte_carlo.map(|n_simulations| backtest::monte_carlo::MonteCarloConfig { n_simulations }),
        }),
    }
}
