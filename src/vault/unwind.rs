use alloy::primitives::{Address, U256};

use super::{Role, Vault, VaultError, call};
use crate::math::full_math::{mul_div, mul_div_up};
use crate::math::tick_math::{MAX_SQRT_RATIO, MIN_SQRT_RATIO};
use crate::model::VaultState;

const BPS: u64 = 10_000;

/// One call of the incremental unwind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwindStep {
    pub net_before: i128,
    pub net_after: i128,
    /// Base traded: positive bought, negative sold.
    pub traded: i128,
    pub quote_delta: i128,
    /// The remainder was below the dust threshold and closed without a price limit.
    pub forced: bool,
    pub reset_cleared: bool,
}

impl UnwindStep {
    fn neutral(reset_cleared: bool) -> Self {
        Self {
            net_before: 0,
            net_after: 0,
            traded: 0,
            quote_delta: 0,
            forced: false,
            reset_cleared,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.net_after == 0
    }
}

/// Sqrt price limit `tolerance_bps` away from `sqrt_price` in the direction a
/// trade of `amount` moves the pool.
pub fn sqrt_price_limit(sqrt_price: U256, amount: i128, tolerance_bps: u16) -> Result<U256, VaultError> {
    let tolerance = u64::from(tolerance_bps);
    let limit = if amount < 0 {
        mul_div(sqrt_price, U256::from(BPS - tolerance.min(BPS)), U256::from(BPS))?.max(MIN_SQRT_RATIO + U256::from(1u8))
    } else {
        mul_div_up(sqrt_price, U256::from(BPS + tolerance), U256::from(BPS))?.min(MAX_SQRT_RATIO - U256::from(1u8))
    };
    Ok(limit)
}

/// Price limit that never binds for a trade of `amount`.
pub(crate) fn unbounded_limit(amount: i128) -> U256 {
    if amount < 0 {
        MIN_SQRT_RATIO + U256::from(1u8)
    } else {
        MAX_SQRT_RATIO - U256::from(1u8)
    }
}

impl Vault {
    /// Trade the net token position towards zero by at most one
    /// slippage-bounded swap. Keeper only.
    ///
    /// Once the remaining notional drops below the dust threshold the rest is
    /// closed in the same call and the reset flag clears.
    pub async fn close_token_position(&mut self, caller: Address) -> Result<UnwindStep, VaultError> {
        self.require(caller, Role::Keeper)?;
        let timeout = self.timeout();
        let (account, pool) = (self.config.account, self.config.pool);

        let net = call(timeout, "net_token_position", self.venue.net_token_position(account, pool)).await?;
        if net == 0 {
            let reset_cleared = self.state.is_reset;
            if reset_cleared {
                self.state.is_reset = false;
                tracing::info!("net position already neutral, reset cleared");
            }
            return Ok(UnwindStep::neutral(reset_cleared));
        }

        self.begin().await?;
        let staged = self.stage_unwind(net).await;
        let step = self.finish("close_token_position", staged).await?;
        tracing::info!(
            net_before = step.net_before,
            net_after = step.net_after,
            traded = step.traded,
            forced = step.forced,
            reset_cleared = step.reset_cleared,
            "unwind step"
        );
        Ok(step)
    }

    async fn stage_unwind(&mut self, net: i128) -> Result<(VaultState, UnwindStep), VaultError> {
        let timeout = self.timeout();
        let (account, pool) = (self.config.account, self.config.pool);
        let mut staged = self.state.clone();
        let tolerance_bps = staged.close.close_position_slippage_sqrt_tolerance_bps;

        let base_price = self.index_price(&self.config.base_asset).await?;
        let sqrt_price = call(timeout, "sqrt_price_x96", self.prices.sqrt_price_x96(pool)).await?;

        let amount = -net;
        let limit = sqrt_price_limit(sqrt_price, amount, tolerance_bps)?;
        let quote = call(timeout, "quote_swap", self.venue.quote_swap(pool, amount, limit)).await?;
        let fill = quote.filled().min(net.unsigned_abs());

        let remaining = base_price.value_of(net.unsigned_abs() - fill)?;
        let forced = remaining < staged.close.min_notional_position_to_close_threshold;
        let (size, limit) = if forced {
            (net.unsigned_abs(), unbounded_limit(amount))
        } else if fill == 0 {
            return Err(VaultError::SlippageExceeded { net_position: net, tolerance_bps });
        } else {
            (fill, limit)
        };
        let size = i128::try_from(size).map_err(|_| VaultError::InvalidAmount("unwind size exceeds i128"))?;
        let trade = if amount < 0 { -size } else { size };

        let result = call(timeout, "swap", self.venue.swap(account, pool, trade, limit, !forced)).await?;
        let net_after = call(timeout, "net_token_position", self.venue.net_token_position(account, pool)).await?;
        if net_after.unsigned_abs() >= net.unsigned_abs() {
            return Err(VaultError::UnwindStalled { before: net, after: net_after });
        }

        let reset_cleared = forced && staged.is_reset;
        if forced {
            staged.is_reset = false;
        }
        let step = UnwindStep {
            net_before: net,
            net_after,
            traded: result.token_delta,
            quote_delta: result.quote_delta,
            forced,
            reset_cleared,
        };
        Ok((staged, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick_math::sqrt_ratio_at_tick;

    #[test]
    fn limit_moves_with_trade_direction() {
        let sp = sqrt_ratio_at_tick(-192_201).unwrap();
        let sell = sqrt_price_limit(sp, -1, 100).unwrap();
        let buy = sqrt_price_limit(sp, 1, 100).unwrap();
        assert!(sell < sp && buy > sp);
        assert_eq!(sell, sp * U256::from(9_900u64) / U256::from(10_000u64));
    }

    #[test]
    fn limit_stays_inside_price_domain() {
        let sell = sqrt_price_limit(MIN_SQRT_RATIO + U256::from(5u8), -1, 9_999).unwrap();
        assert_eq!(sell, MIN_SQRT_RATIO + U256::from(1u8));
        let buy = sqrt_price_limit(MAX_SQRT_RATIO - U256::from(5u8), 1, 9_999).unwrap();
        assert_eq!(buy, MAX_SQRT_RATIO - U256::from(1u8));
    }
}
