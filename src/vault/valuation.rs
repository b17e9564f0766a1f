use alloy::primitives::U256;

use super::{Vault, VaultError, call};
use crate::math::liquidity::amounts_for_liquidity;
use crate::math::tick_math::sqrt_ratio_at_tick;
use crate::math::{MathError, PriceX128};
use crate::model::{AssetId, HedgeRange, ValueSnapshot, VaultState};

/// Balances read from the collaborators for one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Streams {
    pub idle_balance: u128,
    pub accrued_yield: u128,
    pub margin_collateral: u128,
    pub net_position_value: i128,
    pub range_value: u128,
}

/// Quote value of the tokens a range holds at `sqrt_price`, base leg marked at
/// `base_price`.
pub fn range_value(range: Option<&HedgeRange>, sqrt_price: U256, base_price: PriceX128) -> Result<u128, MathError> {
    let Some(range) = range.filter(|r| r.liquidity > 0) else {
        return Ok(0);
    };
    let held = amounts_for_liquidity(
        sqrt_price,
        sqrt_ratio_at_tick(range.tick_lower)?,
        sqrt_ratio_at_tick(range.tick_upper)?,
        range.liquidity,
    )?;
    base_price
        .value_of(held.amount0)?
        .checked_add(held.amount1)
        .ok_or(MathError::Overflow("range_value"))
}

/// Combine the streams into one snapshot. Asset-denominated streams are summed
/// directly; only the quote-denominated margin PnL is converted at the yield
/// asset price, rounding against the vault.
pub fn aggregate(streams: Streams, yield_asset_price: PriceX128) -> Result<ValueSnapshot, MathError> {
    let asset_streams = streams
        .idle_balance
        .checked_add(streams.accrued_yield)
        .and_then(|x| x.checked_add(streams.margin_collateral))
        .ok_or(MathError::Overflow("asset streams"))?;
    let range_value = i128::try_from(streams.range_value).map_err(|_| MathError::Overflow("range value"))?;
    let position_value = streams
        .net_position_value
        .checked_add(range_value)
        .ok_or(MathError::Overflow("position value"))?;

    let asset_value = i128::try_from(yield_asset_price.value_of(asset_streams)?)
        .map_err(|_| MathError::Overflow("asset value"))?;
    let market_value = asset_value.saturating_add(position_value).max(0) as u128;

    let position_assets = yield_asset_price.signed_amount_for(position_value)?;
    let total_assets = i128::try_from(asset_streams)
        .map_err(|_| MathError::Overflow("asset streams"))?
        .saturating_add(position_assets)
        .max(0) as u128;

    Ok(ValueSnapshot {
        idle_balance: streams.idle_balance,
        accrued_yield: streams.accrued_yield,
        margin_collateral: streams.margin_collateral,
        net_position_value: streams.net_position_value,
        range_value: streams.range_value,
        yield_asset_price,
        market_value,
        total_assets,
    })
}

impl Vault {
    /// Read every value stream once and aggregate them.
    pub async fn snapshot(&self) -> Result<ValueSnapshot, VaultError> {
        self.snapshot_of(&self.state).await
    }

    /// Total value of the vault in quote units.
    pub async fn get_vault_market_value(&self) -> Result<u128, VaultError> {
        Ok(self.snapshot().await?.market_value)
    }

    /// Total value of the vault in yield-asset units.
    pub async fn total_assets(&self) -> Result<u128, VaultError> {
        Ok(self.snapshot().await?.total_assets)
    }

    pub(crate) async fn index_price(&self, asset: &AssetId) -> Result<PriceX128, VaultError> {
        let price = call(self.timeout(), "index_price", self.prices.index_price(asset)).await?;
        if price.is_zero() {
            return Err(VaultError::external(
                "index_price",
                anyhow::anyhow!("zero index price for {asset}"),
            ));
        }
        Ok(price)
    }

    /// Snapshot against `state`, which may be a staged copy.
    pub(crate) async fn snapshot_of(&self, state: &VaultState) -> Result<ValueSnapshot, VaultError> {
        let timeout = self.timeout();
        let (account, pool) = (self.config.account, self.config.pool);

        let sqrt_price = call(timeout, "sqrt_price_x96", self.prices.sqrt_price_x96(pool)).await?;
        let base_price = self.index_price(&self.config.base_asset).await?;
        let yield_asset_price = self.index_price(&self.config.yield_asset).await?;
        let margin_collateral = call(timeout, "collateral_balance", self.venue.collateral_balance(account)).await?;
        let net_position_value = call(
            timeout,
            "net_position_value",
            self.venue.net_position_value(account, pool, base_price),
        )
        .await?;
        let accrued_yield = call(timeout, "pending_yield", self.yield_adapter.pending_yield()).await?;

        let streams = Streams {
            idle_balance: state.idle_balance,
            accrued_yield,
            margin_collateral,
            net_position_value,
            range_value: range_value(state.range.as_ref(), sqrt_price, base_price)?,
        };
        let snapshot = aggregate(streams, yield_asset_price)?;
        tracing::debug!(
            market_value = snapshot.market_value,
            total_assets = snapshot.total_assets,
            net_position_value = snapshot.net_position_value,
            range_value = snapshot.range_value,
            "valued vault"
        );
        Ok(snapshot)
    }
}
