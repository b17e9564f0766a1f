pub mod clock;
pub mod metrics;
pub mod monte_carlo;
pub mod result;

use std::path::PathBuf;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result, bail};

use crate::data::{self, PriceRow};
use crate::math::full_math::mul_div_u128;
use crate::math::tick_math::{MAX_SQRT_RATIO, MIN_SQRT_RATIO, tick_at_sqrt_ratio};
use crate::math::PriceX128;
use crate::model::VaultConfig;
use crate::validate;
use crate::vault::{ErrorKind, RebalanceOutcome, Vault, compute_range};
use crate::venues::sim::{SimulatedMarket, SimulatedYield};

use clock::PriceClock;
use metrics::SharePriceMetrics;
use result::BacktestResult;

const SECS_PER_YEAR: u128 = 31_557_600;

/// Configuration for a backtest run.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub config_path: PathBuf,
    pub prices_path: PathBuf,
    /// Initial deposit in whole asset units.
    pub deposit: f64,
    /// Pool swap fee in pips.
    pub fee_pips: u32,
    /// Depth of the simulated pool, as a multiple of the liquidity the
    /// initial deposit would deploy.
    pub pool_depth_multiple: u32,
    /// Yield earned by idle and collateral balances, in bps per year.
    pub yield_apr_bps: u32,
    pub harvest_interval_secs: u64,
    /// Base seed for Monte Carlo paths.
    pub seed: u64,
    pub verbose: bool,
    pub output: Option<PathBuf>,
    pub monte_carlo: Option<monte_carlo::MonteCarloConfig>,
}

/// Run a backtest from the CLI.
pub fn run(config: &BacktestConfig) -> Result<()> {
    let (vault_config, rows) = load_inputs(config)?;
    let historical = replay(vault_config.clone(), &rows, config)?;
    BacktestResult::print_table(std::slice::from_ref(&historical));

    let json = match config.monte_carlo {
        Some(ref mc_config) => {
            let mc_result = monte_carlo::run(&vault_config, &rows, config, mc_config, historical)?;
            monte_carlo::print_results(&mc_result);
            serde_json::to_string_pretty(&mc_result)?
        }
        None => serde_json::to_string_pretty(&historical)?,
    };

    if let Some(ref output_path) = config.output {
        std::fs::write(output_path, json)
            .with_context(|| format!("writing {}", output_path.display()))?;
        println!("  Results written to {}", output_path.display());
    }
    Ok(())
}

/// Load the vault config and price path and replay it.
pub fn run_backtest(config: &BacktestConfig) -> Result<BacktestResult> {
    let (vault_config, rows) = load_inputs(config)?;
    replay(vault_config, &rows, config)
}

fn load_inputs(config: &BacktestConfig) -> Result<(VaultConfig, Vec<PriceRow>)> {
    let vault_config = validate::load_and_validate(&config.config_path).map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::anyhow!("Vault config validation failed:\n  {}", msgs.join("\n  "))
    })?;
    let rows = data::load_price_path(&config.prices_path).context("loading price path")?;
    Ok((vault_config, rows))
}

/// Replay one price path against a fresh vault on its own runtime.
pub fn replay(vault_config: VaultConfig, rows: &[PriceRow], config: &BacktestConfig) -> Result<BacktestResult> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    rt.block_on(execute_backtest(vault_config, rows, config))
}

struct RowPrices {
    base: PriceX128,
    yield_asset: PriceX128,
    sqrt_price_x96: U256,
}

fn row_prices(row: &PriceRow, vault: &VaultConfig) -> Result<RowPrices> {
    let base = PriceX128::from_decimal(row.base_price, vault.base_decimals, vault.quote_decimals)?;
    let yield_asset = PriceX128::from_decimal(row.yield_price, vault.asset_decimals, vault.quote_decimals)?;
    let sqrt_price_x96 = base
        .to_sqrt_price_x96()
        .clamp(MIN_SQRT_RATIO, MAX_SQRT_RATIO - U256::from(1u8));
    Ok(RowPrices { base, yield_asset, sqrt_price_x96 })
}

fn to_units(amount: f64, decimals: u8) -> Result<u128> {
    let units = (amount * 10f64.powi(i32::from(decimals))).round();
    if !units.is_finite() || units <= 0.0 || units >= u128::MAX as f64 {
        bail!("deposit {amount} is not a positive amount");
    }
    Ok(units as u128)
}

fn format_ts(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[derive(Default)]
struct Counters {
    rebalances: u32,
    resets: u32,
    unwind_steps: u32,
    slippage_failures: u32,
    max_net_exposure_pct: f64,
}

async fn share_price(vault: &Vault) -> Result<f64> {
    let total_assets = vault.total_assets().await?;
    let shares = vault.total_shares();
    Ok(if shares == 0 { 1.0 } else { total_assets as f64 / shares as f64 })
}

async fn execute_backtest(
    vault_config: VaultConfig,
    rows: &[PriceRow],
    config: &BacktestConfig,
) -> Result<BacktestResult> {
    let mut clock = PriceClock::new(rows).context("empty price path")?;
    let prices = row_prices(clock.row(), &vault_config)?;
    let tick = tick_at_sqrt_ratio(prices.sqrt_price_x96)?;

    // Size the rest of the pool off the range the initial deposit deploys.
    let deposit = to_units(config.deposit, vault_config.asset_decimals)?;
    let deposit_value = prices.yield_asset.value_of(deposit)?;
    let depth = compute_range(
        deposit_value.saturating_mul(u128::from(config.pool_depth_multiple.max(1))),
        tick,
        &vault_config.sizing,
    )?
    .liquidity
    .max(1);

    let market = SimulatedMarket::new(vault_config.pool, tick, depth, config.fee_pips)?;
    let yield_source = SimulatedYield::new();
    let keeper = vault_config.keeper;
    let depositor = Address::repeat_byte(0xd0);
    let (account, base_asset, yield_asset) = (
        vault_config.account,
        vault_config.base_asset.clone(),
        vault_config.yield_asset.clone(),
    );
    let label = vault_config.name.clone();

    market.set_sqrt_price(prices.sqrt_price_x96)?;
    market.set_index_price(&base_asset, prices.base);
    market.set_index_price(&yield_asset, prices.yield_asset);

    let mut vault = Vault::new(
        vault_config,
        Box::new(market.venue()),
        Box::new(market.price_source()),
        Box::new(yield_source.clone()),
    )?;
    vault.deposit(depositor, deposit).await.context("initial deposit")?;
    if config.verbose {
        println!("[deposit] {} asset units, range {:?}", deposit, vault.state().range);
    }

    let mut metrics = SharePriceMetrics::new(share_price(&vault).await?);
    let mut counters = Counters::default();
    let mut last_harvest = clock.now();

    loop {
        let now = clock.now();
        let prices = row_prices(clock.row(), vault.config())?;
        market.set_sqrt_price(prices.sqrt_price_x96)?;
        market.set_index_price(&base_asset, prices.base);
        market.set_index_price(&yield_asset, prices.yield_asset);

        let principal = vault.state().idle_balance.saturating_add(market.collateral(account));
        let accrued = mul_div_u128(
            principal,
            u128::from(config.yield_apr_bps) * u128::from(clock.dt_seconds()),
            10_000 * SECS_PER_YEAR,
        )?;
        yield_source.accrue(accrued);

        if now.saturating_sub(last_harvest) >= config.harvest_interval_secs {
            vault.harvest(keeper).await?;
            last_harvest = now;
        }

        if vault.is_reset() {
            match vault.close_token_position(keeper).await {
                Ok(step) => {
                    counters.unwind_steps += 1;
                    if config.verbose {
                        println!(
                            "[unwind {}] net {} -> {}{}",
                            format_ts(now),
                            step.net_before,
                            step.net_after,
                            if step.forced { " (closed)" } else { "" }
                        );
                    }
                }
                Err(e) if e.kind() == ErrorKind::Slippage => {
                    counters.slippage_failures += 1;
                    tracing::warn!(error = %e, "unwind step skipped");
                }
                Err(e) => return Err(e.into()),
            }
        } else if let RebalanceOutcome::Rebalanced(report) = vault.rebalance(keeper, now).await? {
            counters.rebalances += 1;
            if report.reset_triggered {
                counters.resets += 1;
            }
            if config.verbose {
                println!(
                    "[rebalance {}] {:?} -> {:?}, net {}{}",
                    format_ts(now),
                    report.previous.map(|r| (r.tick_lower, r.tick_upper)),
                    report.current.map(|r| (r.tick_lower, r.tick_upper)),
                    report.net_position,
                    if report.reset_triggered { " RESET" } else { "" }
                );
            }
        }

        let snapshot = vault.snapshot().await?;
        let net = market.net_token_position(account)?;
        if snapshot.market_value > 0 {
            let exposure = prices.base.value_of(net.unsigned_abs())? as f64 / snapshot.market_value as f64 * 100.0;
            counters.max_net_exposure_pct = counters.max_net_exposure_pct.max(exposure);
        }
        metrics.record_tick(share_price(&vault).await?);

        if config.verbose && clock.position() % 100 == 0 {
            println!(
                "[tick {:>6}/{:>6}] value = {}, share price = {:.6}",
                clock.position(),
                clock.len(),
                snapshot.market_value,
                metrics.final_share_price(),
            );
        }

        if !clock.advance() {
            break;
        }
    }

    let asset_scale = 10f64.powi(i32::from(vault.config().asset_decimals));
    Ok(BacktestResult {
        label,
        start: format_ts(clock.start()),
        end: format_ts(clock.end()),
        ticks: metrics.samples(),
        share_price_return_pct: metrics.return_pct(),
        max_drawdown_pct: metrics.max_drawdown_pct(),
        final_share_price: metrics.final_share_price(),
        rebalances: counters.rebalances,
        resets: counters.resets,
        unwind_steps: counters.unwind_steps,
        slippage_failures: counters.slippage_failures,
        max_net_exposure_pct: counters.max_net_exposure_pct,
        harvested: yield_source.harvested() as f64 / asset_scale,
        swaps: market.swap_count(),
    })
}
