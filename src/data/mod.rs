use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// One row of a backtest price path.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRow {
    pub timestamp: u64,
    /// Base token price in quote terms (e.g. ETH/USD).
    pub base_price: f64,
    /// Yield asset price in quote terms (e.g. sDAI/USD).
    pub yield_price: f64,
}

/// Load CSV rows of type T from a file.
pub fn load_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening CSV file {}", path.display()))?;
    let rows: Vec<T> = rdr
        .deserialize()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing CSV file {}", path.display()))?;
    Ok(rows)
}

/// Load a price path, sorted by timestamp with duplicate timestamps dropped.
pub fn load_price_path(path: &Path) -> Result<Vec<PriceRow>> {
    let mut rows: Vec<PriceRow> = load_csv(path)?;
    if rows.is_empty() {
        bail!("price file {} has no rows", path.display());
    }
    for row in &rows {
        if !(row.base_price.is_finite() && row.base_price > 0.0) {
            bail!("non-positive base price {} at {}", row.base_price, row.timestamp);
        }
        if !(row.yield_price.is_finite() && row.yield_price > 0.0) {
            bail!("non-positive yield price {} at {}", row.yield_price, row.timestamp);
        }
    }
    rows.sort_by_key(|r| r.timestamp);
    rows.dedup_by_key(|r| r.timestamp);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_sorts_price_path() {
        let path = std::env::temp_dir().join(format!("delta-vault-prices-{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "timestamp,base_price,yield_price\n200,2100.5,1.01\n100,2000,1.0\n100,2000,1.0\n",
        )
        .unwrap();
        let rows = load_price_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let timestamps: Vec<u64> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200]);
        assert_eq!(rows[1].base_price, 2100.5);
    }

    #[test]
    fn rejects_zero_prices() {
        let path = std::env::temp_dir().join(format!("delta-vault-bad-{}.csv", std::process::id()));
        std::fs::write(&path, "timestamp,base_price,yield_price\n1,0,1\n").unwrap();
        let err = load_price_path(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(err.to_string().contains("base price"));
    }
}
