use std::collections::BTreeMap;
use std::path::Path;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::config::{CloseParams, RebalanceParams, SizingParams, VaultConfig};
use crate::math::tick_math::{MAX_TICK, MIN_TICK};

/// The vault's concentrated-liquidity range in the hedging pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HedgeRange {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
}

impl HedgeRange {
    /// Bounds ordered, multiples of `spacing` and inside the tick domain.
    pub fn is_well_formed(&self, spacing: i32) -> bool {
        spacing > 0
            && self.tick_lower < self.tick_upper
            && self.tick_lower >= MIN_TICK
            && self.tick_upper <= MAX_TICK
            && self.tick_lower % spacing == 0
            && self.tick_upper % spacing == 0
    }

    /// Tick whose price sits at the middle of the range (floored).
    pub fn centre_tick(&self) -> i32 {
        (self.tick_lower + self.tick_upper).div_euclid(2)
    }

    pub fn with_liquidity(self, liquidity: u128) -> Self {
        Self { liquidity, ..self }
    }
}

/// Persisted vault state. Everything the core needs to resume after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VaultState {
    #[schemars(with = "String")]
    pub owner: Address,
    #[schemars(with = "String")]
    pub keeper: Address,
    pub deposit_cap: u128,
    pub total_shares: u128,
    /// Asset units held by the vault outside the collateral venue.
    pub idle_balance: u128,
    /// Set when net exposure exceeded the reset threshold; cleared by the unwind.
    pub is_reset: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<HedgeRange>,
    pub rebalance: RebalanceParams,
    pub close: CloseParams,
    pub sizing: SizingParams,
    /// Shares held per depositor.
    #[serde(default)]
    #[schemars(with = "BTreeMap<String, u128>")]
    pub holders: BTreeMap<Address, u128>,
}

impl VaultState {
    /// Fresh state for a newly deployed vault.
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            owner: config.owner,
            keeper: config.keeper,
            deposit_cap: config.deposit_cap,
            total_shares: 0,
            idle_balance: 0,
            is_reset: false,
            range: None,
            rebalance: config.rebalance.clone(),
            close: config.close.clone(),
            sizing: config.sizing.clone(),
            holders: BTreeMap::new(),
        }
    }

    /// Load state from a JSON file, or start fresh if it doesn't exist.
    pub fn load_or_new(path: &Path, config: &VaultConfig) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("reading vault state file")?;
            let state: VaultState =
                serde_json::from_str(&contents).context("parsing vault state file")?;
            tracing::info!(
                path = %path.display(),
                total_shares = state.total_shares,
                is_reset = state.is_reset,
                "loaded vault state"
            );
            Ok(state)
        } else {
            Ok(VaultState::new(config))
        }
    }

    /// Save state to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).context("writing vault state file")?;
        Ok(())
    }

    pub fn shares_of(&self, holder: &Address) -> u128 {
        self.holders.get(holder).copied().unwrap_or(0)
    }

    pub fn liquidity(&self) -> u128 {
        self.range.map(|r| r.liquidity).unwrap_or(0)
    }
}
