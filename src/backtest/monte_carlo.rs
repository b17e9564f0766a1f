use anyhow::{Result, bail};
use rand::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

use super::BacktestConfig;
use super::result::BacktestResult;
use crate::data::PriceRow;
use crate::model::VaultConfig;

/// Configuration for Monte Carlo simulation.
#[derive(Debug, Clone)]
pub struct MonteCarloConfig {
    pub n_simulations: u32,
}

/// Historical run plus one result per synthetic path.
#[derive(Serialize)]
pub struct MonteCarloResult {
    pub historical: BacktestResult,
    pub simulations: Vec<BacktestResult>,
}

// ── Parameter estimation ─────────────────────────────────────────────

/// Per-period log-return statistics of a historical price path.
struct PathParams {
    start_base: f64,
    base_drift: f64,
    base_vol: f64,
    start_yield: f64,
    yield_drift: f64,
    timestamps: Vec<u64>,
}

fn estimate_params(rows: &[PriceRow]) -> Result<PathParams> {
    if rows.len() < 3 {
        bail!("need at least 3 price rows to fit a path, got {}", rows.len());
    }
    let base_returns: Vec<f64> = rows.windows(2).map(|w| (w[1].base_price / w[0].base_price).ln()).collect();
    let yield_returns: Vec<f64> = rows.windows(2).map(|w| (w[1].yield_price / w[0].yield_price).ln()).collect();
    Ok(PathParams {
        start_base: rows[0].base_price,
        base_drift: mean(&base_returns),
        base_vol: std_dev(&base_returns),
        start_yield: rows[0].yield_price,
        yield_drift: mean(&yield_returns),
        timestamps: rows.iter().map(|r| r.timestamp).collect(),
    })
}

// ── Synthetic paths ──────────────────────────────────────────────────

/// GBM multipliers relative to the start price, one per period.
/// `drift` is the mean log return, so it needs no Itô correction.
fn generate_gbm_prices(n: usize, drift: f64, vol: f64, rng: &mut impl Rng) -> Vec<f64> {
    let mut prices = Vec::with_capacity(n);
    let mut log_cum = 0.0;
    for _ in 0..n {
        log_cum += drift + vol * standard_normal(rng);
        prices.push(log_cum.exp());
    }
    prices
}

/// A path on the historical timestamps: GBM base price, yield asset
/// appreciating at its historical mean rate.
fn synthetic_path(params: &PathParams, rng: &mut impl Rng) -> Vec<PriceRow> {
    let gbm = generate_gbm_prices(params.timestamps.len() - 1, params.base_drift, params.base_vol, rng);
    params
        .timestamps
        .iter()
        .enumerate()
        .map(|(i, &timestamp)| PriceRow {
            timestamp,
            base_price: match i {
                0 => params.start_base,
                i => params.start_base * gbm[i - 1],
            },
            yield_price: params.start_yield * (params.yield_drift * i as f64).exp(),
        })
        .collect()
}

// ── Public API ───────────────────────────────────────────────────────

/// Replay the vault over `n_simulations` synthetic paths fitted to `rows`.
pub fn run(
    vault_config: &VaultConfig,
    rows: &[PriceRow],
    config: &BacktestConfig,
    mc_config: &MonteCarloConfig,
    historical: BacktestResult,
) -> Result<MonteCarloResult> {
    let params = estimate_params(rows)?;

    let pb = indicatif::ProgressBar::new(u64::from(mc_config.n_simulations));
    pb.set_style(indicatif::ProgressStyle::default_bar().template("  Monte Carlo [{bar:40}] {pos}/{len} ({eta})")?);

    let sim_config = BacktestConfig {
        verbose: false,
        output: None,
        monte_carlo: None,
        ..config.clone()
    };
    let simulations: Vec<BacktestResult> = (0..mc_config.n_simulations)
        .into_par_iter()
        .filter_map(|i| {
            let sim_seed = config.seed.wrapping_add(u64::from(i) + 1);
            let mut rng = StdRng::seed_from_u64(sim_seed);
            let path = synthetic_path(&params, &mut rng);
            let result = super::replay(vault_config.clone(), &path, &sim_config);
            pb.inc(1);
            match result {
                Ok(mut r) => {
                    r.label = format!("sim #{i} (seed {sim_seed})");
                    Some(r)
                }
                Err(e) => {
                    tracing::warn!(sim = i, seed = sim_seed, error = %e, "simulation failed");
                    None
                }
            }
        })
        .collect();
    pb.finish_and_clear();

    Ok(MonteCarloResult { historical, simulations })
}

/// Print Monte Carlo results summary.
pub fn print_results(mc: &MonteCarloResult) {
    let h = &mc.historical;
    let sims = &mc.simulations;
    if sims.is_empty() {
        println!("  No successful simulations.");
        return;
    }

    let returns = sorted_by(sims, |r| r.share_price_return_pct);
    let drawdowns = sorted_by(sims, |r| r.max_drawdown_pct);
    let exposures = sorted_by(sims, |r| r.max_net_exposure_pct);
    let rebalances = sorted_by(sims, |r| f64::from(r.rebalances));

    println!("\n{}", "═".repeat(68));
    println!("  Monte Carlo Results ({} simulations)", sims.len());
    println!("{}", "═".repeat(68));
    println!(
        "  Historical:  Ret={:+.3}%  MxDD={:.3}%  MaxExp={:.2}%  Resets={}",
        h.share_price_return_pct, h.max_drawdown_pct, h.max_net_exposure_pct, h.resets
    );
    println!();
    println!(
        "  {:>12}  {:>8}  {:>8}  {:>8}  {:>8}",
        "Percentiles", "Ret%", "MxDD%", "MaxExp%", "Rebal"
    );
    println!("  {}", "─".repeat(52));
    for (label, pct) in [("5th", 5.0), ("25th", 25.0), ("50th", 50.0), ("75th", 75.0), ("95th", 95.0)] {
        println!(
            "  {:>12}  {:>+8.3}  {:>8.3}  {:>8.2}  {:>8.0}",
            label,
            percentile(&returns, pct),
            percentile(&drawdowns, pct),
            percentile(&exposures, pct),
            percentile(&rebalances, pct),
        );
    }

    println!();
    let reset_paths = sims.iter().filter(|r| r.resets > 0).count();
    let stuck_paths = sims.iter().filter(|r| r.slippage_failures > 0).count();
    println!(
        "  Paths with a reset: {:.1}%   with a failed unwind step: {:.1}%",
        reset_paths as f64 / sims.len() as f64 * 100.0,
        stuck_paths as f64 / sims.len() as f64 * 100.0,
    );
    println!("{}", "═".repeat(68));
}

// ── Statistical helpers ──────────────────────────────────────────────

fn sorted_by(results: &[BacktestResult], metric: impl Fn(&BacktestResult) -> f64) -> Vec<f64> {
    let mut xs: Vec<f64> = results.iter().map(metric).collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    xs
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}

/// Box-Muller transform to generate N(0,1) samples.
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.random_range(0.0001f64..1.0);
    let u2: f64 = rng.random_range(0.0f64..std::f64::consts::TAU);
    (-2.0 * u1.ln()).sqrt() * u2.cos()
}

/// Linear interpolation percentile on a sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    let frac = idx - lo as f64;
    if hi >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}
