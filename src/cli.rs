use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Delta-managed yield vault: validate configs, print schemas and examples,
/// and backtest the keeper loop against a price path.
#[derive(Parser)]
#[command(name = "delta-vault", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Output the JSON schema for vault configs
    Schema,

    /// Output the JSON schema for persisted vault state
    StateSchema,

    /// Validate a vault config JSON file
    Validate {
        /// Path to the vault config JSON file
        file: PathBuf,
    },

    /// Output an example vault config JSON to stdout
    Example,

    /// Replay a price path through a simulated market, acting as keeper
    Backtest {
        /// Path to the vault config JSON file
        file: PathBuf,

        /// CSV with columns timestamp,base_price,yield_price
        #[arg(long)]
        prices: PathBuf,

        /// Initial deposit in whole asset units
        #[arg(long, default_value = "10000.0")]
        deposit: f64,

        /// Pool swap fee in pips (500 = 0.05%)
        #[arg(long, default_value = "500")]
        fee_pips: u32,

        /// Simulated pool depth as a multiple of the vault's own range
        #[arg(long, default_value = "1000")]
        pool_depth_multiple: u32,

        /// Yield earned by the deposit asset, in bps per year
        #[arg(long, default_value = "500")]
        yield_apr_bps: u32,

        /// Seconds between harvests
        #[arg(long, default_value = "86400")]
        harvest_interval: u64,

        /// Random seed for Monte Carlo paths
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Print every keeper action
        #[arg(long)]
        verbose: bool,

        /// Output results as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also run N Monte Carlo simulations on GBM paths fitted to the prices
        #[arg(long)]
        monte_carlo: Option<u32>,
    },
}
