use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::math::PriceX128;

/// One consistent read of every value stream the vault holds.
///
/// Asset-denominated fields are in yield-asset units; `*_value` fields are in
/// quote units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValueSnapshot {
    pub idle_balance: u128,
    /// Yield accrued in the yield adapter but not yet harvested.
    pub accrued_yield: u128,
    pub margin_collateral: u128,
    /// Mark-to-market of the margin account's token positions and range debt.
    pub net_position_value: i128,
    /// Value of the tokens currently held by the hedge range.
    pub range_value: u128,
    pub yield_asset_price: PriceX128,
    /// Sum of all streams in quote units.
    pub market_value: u128,
    /// Sum of all streams in yield-asset units.
    pub total_assets: u128,
}

impl ValueSnapshot {
    /// Liquid asset units: idle balance plus posted collateral.
    pub fn withdrawable(&self) -> u128 {
        self.idle_balance.saturating_add(self.margin_collateral)
    }
}
