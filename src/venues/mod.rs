pub mod sim;

use alloy::primitives::U256;
use anyhow::Result;
use async_trait::async_trait;

use crate::math::liquidity::TokenAmounts;
use crate::math::tick_math::sqrt_ratio_at_tick;
use crate::math::PriceX128;
use crate::model::{AccountId, AssetId, PoolId};

// ── Value types ─────────────────────────────────────────────────────

/// Identifies a range position inside a margin account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeId {
    pub tick_lower: i32,
    pub tick_upper: i32,
}

/// Liquidity moved into (positive delta) or out of (negative delta) a range,
/// with the token amounts that moved alongside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeChange {
    pub liquidity_delta: i128,
    pub tokens: TokenAmounts,
}

/// Outcome of a swap against the pool, from the trader's point of view.
/// `token_delta` is base received (positive) or sold (negative); `quote_delta`
/// likewise for the quote token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapResult {
    pub token_delta: i128,
    pub quote_delta: i128,
    pub sqrt_price_after: U256,
}

impl SwapResult {
    pub fn empty(sqrt_price: U256) -> Self {
        Self { token_delta: 0, quote_delta: 0, sqrt_price_after: sqrt_price }
    }

    pub fn filled(&self) -> u128 {
        self.token_delta.unsigned_abs()
    }
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Margin venue holding the vault's collateral, its trader token position
/// and its concentrated-liquidity range.
///
/// Mutating calls made between `begin` and `commit` must be undone by
/// `rollback`; the vault brackets every multi-step operation with them.
#[async_trait]
pub trait MarginVenue: Send + Sync {
    /// Collateral posted by `account`, in yield-asset units.
    async fn collateral_balance(&self, account: AccountId) -> Result<u128>;

    async fn deposit_collateral(&mut self, account: AccountId, amount: u128) -> Result<()>;

    async fn withdraw_collateral(&mut self, account: AccountId, amount: u128) -> Result<()>;

    /// Signed base-token exposure: trader balance plus every range's current
    /// token0 holding minus what it borrowed to mint.
    async fn net_token_position(&self, account: AccountId, pool: PoolId) -> Result<i128>;

    /// Quote value of the trader balances net of range mint debt, with the
    /// base token marked at `index_price`.
    async fn net_position_value(
        &self,
        account: AccountId,
        pool: PoolId,
        index_price: PriceX128,
    ) -> Result<i128>;

    /// Add (positive) or remove (negative) liquidity on `[tick_lower, tick_upper)`.
    async fn open_range(
        &mut self,
        account: AccountId,
        pool: PoolId,
        tick_lower: i32,
        tick_upper: i32,
        liquidity_delta: i128,
    ) -> Result<RangeChange>;

    /// Remove all liquidity of a range and settle it into the trader balances.
    async fn close_range(&mut self, account: AccountId, pool: PoolId, range: RangeId) -> Result<RangeChange>;

    /// Move `quote` units of the account's settlement balance into collateral
    /// at `asset_price`, returning the yield-asset units credited (rounded down).
    async fn settle_to_collateral(
        &mut self,
        account: AccountId,
        pool: PoolId,
        quote: u128,
        asset_price: PriceX128,
    ) -> Result<u128>;

    /// Read-only swap simulation: how much of `amount` (signed base units,
    /// negative sells) fills before the price reaches `sqrt_price_limit`.
    async fn quote_swap(&self, pool: PoolId, amount: i128, sqrt_price_limit: U256) -> Result<SwapResult>;

    /// Swap base against quote. Without `partial_allowed` a fill short of
    /// `amount` is an error.
    async fn swap(
        &mut self,
        account: AccountId,
        pool: PoolId,
        amount: i128,
        sqrt_price_limit: U256,
        partial_allowed: bool,
    ) -> Result<SwapResult>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// Pool tick and index prices.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn current_tick(&self, pool: PoolId) -> Result<i32>;

    /// Current pool sqrt price. Defaults to the price at `current_tick`.
    async fn sqrt_price_x96(&self, pool: PoolId) -> Result<U256> {
        let tick = self.current_tick(pool).await?;
        Ok(sqrt_ratio_at_tick(tick)?)
    }

    /// Quote units per base unit of `asset`.
    async fn index_price(&self, asset: &AssetId) -> Result<PriceX128>;
}

/// Source of the yield the vault's deposit asset earns.
#[async_trait]
pub trait YieldAdapter: Send + Sync {
    /// Realise accrued yield, returning it in yield-asset units.
    async fn harvest(&mut self) -> Result<u128>;

    /// Yield accrued but not yet harvested, in yield-asset units.
    async fn pending_yield(&self) -> Result<u128> {
        Ok(0)
    }
}

/// Yield adapter for vaults whose asset accrues in price only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoYield;

#[async_trait]
impl YieldAdapter for NoYield {
    async fn harvest(&mut self) -> Result<u128> {
        Ok(0)
    }
}
