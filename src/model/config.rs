use alloy::primitives::Address;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ids::{AccountId, AssetId, PoolId};

/// Static deployment configuration of a vault plus the initial values of the
/// owner-tunable parameter groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VaultConfig {
    /// Human-readable vault name, used in logs and backtest output.
    pub name: String,
    /// Address allowed to change parameters and roles.
    #[schemars(with = "String")]
    pub owner: Address,
    /// Address allowed to call `rebalance`, `close_token_position` and `harvest`.
    #[schemars(with = "String")]
    pub keeper: Address,
    /// Margin account the vault trades through.
    pub account: AccountId,
    /// Concentrated-liquidity pool holding the hedge range.
    pub pool: PoolId,
    /// Interest-bearing asset the vault accepts (e.g. "sDAI").
    pub yield_asset: AssetId,
    /// Hedged base token, token0 of the pool (e.g. "ETH").
    pub base_asset: AssetId,
    /// Decimals of the yield asset. Reporting only.
    #[serde(default = "default_decimals_18")]
    pub asset_decimals: u8,
    /// Decimals of the base token. Reporting only.
    #[serde(default = "default_decimals_18")]
    pub base_decimals: u8,
    /// Decimals of the quote (settlement) token. Reporting only.
    #[serde(default = "default_quote_decimals")]
    pub quote_decimals: u8,
    /// Upper bound on total assets after a deposit, in asset units.
    pub deposit_cap: u128,
    /// Share of every deposit, in bps, posted as margin collateral.
    #[serde(default = "default_collateral_share_bps")]
    pub collateral_share_bps: u16,
    /// Exit fee retained by the vault on withdrawals, in bps.
    #[serde(default)]
    pub withdraw_fee_bps: u16,
    /// Per-call timeout for collateral venue, price source and yield adapter calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,
    #[serde(default)]
    pub sizing: SizingParams,
    #[serde(default)]
    pub rebalance: RebalanceParams,
    #[serde(default)]
    pub close: CloseParams,
}

/// How snapped range bounds are rounded to the tick spacing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TickRounding {
    /// Lower bound floored, upper bound ceiled: never narrower than the raw band.
    #[default]
    Outward,
    /// Lower bound ceiled, upper bound floored: never wider than the raw band.
    Inward,
}

/// Parameters of the range sizing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SizingParams {
    /// Lower sqrt-price multiplier in pips (1e6 = 1.0).
    #[serde(default = "default_sqrt_factor_lower")]
    pub sqrt_price_factor_lower_pips: u32,
    /// Upper sqrt-price multiplier in pips (1e6 = 1.0).
    #[serde(default = "default_sqrt_factor_upper")]
    pub sqrt_price_factor_upper_pips: u32,
    #[serde(default = "default_tick_spacing")]
    pub tick_spacing: i32,
    #[serde(default)]
    pub tick_rounding: TickRounding,
    /// Share of vault value, in bps, deployed as range liquidity.
    #[serde(default = "default_hedge_share_bps")]
    pub hedge_share_bps: u16,
}

/// Rebalance trigger thresholds plus the timestamp of the last rebalance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RebalanceParams {
    #[serde(default)]
    pub last_rebalance_timestamp: u64,
    /// Seconds after which a rebalance is due regardless of price.
    #[serde(default = "default_rebalance_time_threshold")]
    pub rebalance_time_threshold_secs: u64,
    /// Deviation of the pool price from the range centre, in bps, that makes
    /// a rebalance due.
    #[serde(default = "default_rebalance_price_threshold_bps")]
    pub rebalance_price_threshold_bps: u16,
    /// Re-derive liquidity from market value on every recentre instead of
    /// carrying the current liquidity over.
    #[serde(default)]
    pub resize_liquidity_on_rebalance: bool,
}

/// Parameters of the incremental unwind engine and the reset check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CloseParams {
    /// Maximum sqrt-price move, in bps, a single unwind swap may cause.
    #[serde(default = "default_close_slippage_bps")]
    pub close_position_slippage_sqrt_tolerance_bps: u16,
    /// Net exposure, in bps of market value, above which a reset is flagged.
    #[serde(default = "default_reset_threshold_bps")]
    pub reset_position_threshold_bps: u16,
    /// Remaining notional, in quote units, below which the unwind closes
    /// the position in full.
    #[serde(default = "default_min_notional")]
    pub min_notional_position_to_close_threshold: u128,
}

// ── Defaults ─────────────────────────────────────────────────────────

fn default_decimals_18() -> u8 {
    18
}

fn default_quote_decimals() -> u8 {
    6
}

fn default_collateral_share_bps() -> u16 {
    2_000
}

fn default_sqrt_factor_lower() -> u32 {
    800_000
}

fn default_sqrt_factor_upper() -> u32 {
    1_250_000
}

fn default_tick_spacing() -> i32 {
    10
}

fn default_hedge_share_bps() -> u16 {
    8_000
}

fn default_rebalance_time_threshold() -> u64 {
    86_400
}

fn default_rebalance_price_threshold_bps() -> u16 {
    500
}

fn default_close_slippage_bps() -> u16 {
    100
}

fn default_reset_threshold_bps() -> u16 {
    2_000
}

fn default_min_notional() -> u128 {
    // 100 quote units at 6 decimals
    100_000_000
}

impl Default for SizingParams {
    fn default() -> Self {
        Self {
            sqrt_price_factor_lower_pips: default_sqrt_factor_lower(),
            sqrt_price_factor_upper_pips: default_sqrt_factor_upper(),
            tick_spacing: default_tick_spacing(),
            tick_rounding: TickRounding::default(),
            hedge_share_bps: default_hedge_share_bps(),
        }
    }
}

impl Default for RebalanceParams {
    fn default() -> Self {
        Self {
            last_rebalance_timestamp: 0,
            rebalance_time_threshold_secs: default_rebalance_time_threshold(),
            rebalance_price_threshold_bps: default_rebalance_price_threshold_bps(),
            resize_liquidity_on_rebalance: false,
        }
    }
}

impl Default for CloseParams {
    fn default() -> Self {
        Self {
            close_position_slippage_sqrt_tolerance_bps: default_close_slippage_bps(),
            reset_position_threshold_bps: default_reset_threshold_bps(),
            min_notional_position_to_close_threshold: default_min_notional(),
        }
    }
}

impl VaultConfig {
    /// A config with default parameter groups.
    pub fn new(
        name: impl Into<String>,
        owner: Address,
        keeper: Address,
        yield_asset: AssetId,
        base_asset: AssetId,
        deposit_cap: u128,
    ) -> Self {
        Self {
            name: name.into(),
            owner,
            keeper,
            account: AccountId(1),
            pool: PoolId(1),
            yield_asset,
            base_asset,
            asset_decimals: default_decimals_18(),
            base_decimals: default_decimals_18(),
            quote_decimals: default_quote_decimals(),
            deposit_cap,
            collateral_share_bps: default_collateral_share_bps(),
            withdraw_fee_bps: 0,
            call_timeout_ms: None,
            sizing: SizingParams::default(),
            rebalance: RebalanceParams::default(),
            close: CloseParams::default(),
        }
    }

    pub fn call_timeout(&self) -> Option<std::time::Duration> {
        self.call_timeout_ms.map(std::time::Duration::from_millis)
    }
}
