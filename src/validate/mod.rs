mod params;

use std::path::Path;

use thiserror::Error;

use crate::model::VaultConfig;

pub use params::{check_close, check_rebalance, check_sizing};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Vault name is empty")]
    EmptyName,

    #[error("The {role} address is zero")]
    ZeroAddress { role: &'static str },

    #[error("Sqrt price factors must satisfy 0 < lower < 1000000 < upper (got {lower}, {upper})")]
    SqrtFactorBand { lower: u32, upper: u32 },

    #[error("Tick spacing {spacing} outside 1..=16384")]
    TickSpacing { spacing: i32 },

    #[error("`{field}` is {value} bps, allowed {min}..={max}")]
    BpsOutOfRange {
        field: &'static str,
        value: u16,
        min: u16,
        max: u16,
    },

    #[error("`call_timeout_ms` must be positive when set")]
    ZeroTimeout,
}

/// Load and fully validate a vault config from a JSON file.
pub fn load_and_validate(path: &Path) -> Result<VaultConfig, Vec<ConfigError>> {
    let contents = std::fs::read_to_string(path).map_err(|e| vec![ConfigError::Io(e)])?;
    let config: VaultConfig =
        serde_json::from_str(&contents).map_err(|e| vec![ConfigError::Json(e)])?;
    validate(&config)?;
    Ok(config)
}

/// Validate a vault config, collecting all errors.
pub fn validate(config: &VaultConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.name.trim().is_empty() {
        errors.push(ConfigError::EmptyName);
    }
    if config.owner.is_zero() {
        errors.push(ConfigError::ZeroAddress { role: "owner" });
    }
    if config.keeper.is_zero() {
        errors.push(ConfigError::ZeroAddress { role: "keeper" });
    }
    errors.extend(params::check_bps("collateral_share_bps", config.collateral_share_bps, 0, 10_000));
    errors.extend(params::check_bps("withdraw_fee_bps", config.withdraw_fee_bps, 0, 9_999));
    if config.call_timeout_ms == Some(0) {
        errors.push(ConfigError::ZeroTimeout);
    }

    errors.extend(check_sizing(&config.sizing));
    errors.extend(check_rebalance(&config.rebalance));
    errors.extend(check_close(&config.close));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// CLI entry point for the `validate` subcommand.
pub fn run(path: &Path) -> anyhow::Result<()> {
    match load_and_validate(path) {
        Ok(config) => {
            println!(
                "Vault '{}' is valid. pool {}, hedging {} against {}.",
                config.name, config.pool, config.base_asset, config.yield_asset
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("Validation failed with {} error(s):", errors.len());
            for (i, e) in errors.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, e);
            }
            std::process::exit(1);
        }
    }
}
