use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub label: String,
    pub start: String,
    pub end: String,
    pub ticks: usize,
    pub share_price_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub final_share_price: f64,
    pub rebalances: u32,
    pub resets: u32,
    pub unwind_steps: u32,
    pub slippage_failures: u32,
    /// Largest |net token position| seen, as a percentage of vault value.
    pub max_net_exposure_pct: f64,
    /// Yield harvested into the vault, in whole asset units.
    pub harvested: f64,
    pub swaps: u64,
}

impl BacktestResult {
    pub fn print_table(results: &[Self]) {
        println!("\n{}", "═".repeat(118));
        println!("  Backtest Results");
        println!("{}", "═".repeat(118));
        println!(
            "  {:<24} {:>8} {:>7} {:>9} {:>6} {:>6} {:>7} {:>6} {:>9} {:>10}",
            "Vault", "Ret%", "MxDD%", "SharePx", "Rebal", "Reset", "Unwind", "Slip", "MaxExp%", "Harvested",
        );
        println!("  {}", "-".repeat(112));
        for r in results {
            println!(
                "  {:<24} {:>+8.3} {:>7.3} {:>9.5} {:>6} {:>6} {:>7} {:>6} {:>9.2} {:>10.4}",
                r.label,
                r.share_price_return_pct,
                r.max_drawdown_pct,
                r.final_share_price,
                r.rebalances,
                r.resets,
                r.unwind_steps,
                r.slippage_failures,
                r.max_net_exposure_pct,
                r.harvested,
            );
        }
        println!("{}", "═".repeat(118));
        if let Some(r) = results.first() {
            println!("  {} ticks from {} to {}, {} swaps", r.ticks, r.start, r.end, r.swaps);
        }
    }
}
