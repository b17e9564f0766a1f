use alloy::primitives::U256;

use super::{Vault, VaultError, call};
use crate::math::full_math::{mul_div, mul_div_u128, to_u128};
use crate::math::liquidity::liquidity_for_value;
use crate::math::price::price_x96;
use crate::math::tick_math::{
    MAX_SQRT_RATIO, MIN_SQRT_RATIO, ceil_to_spacing, floor_to_spacing, sqrt_ratio_at_tick, tick_at_sqrt_ratio,
    usable_bounds,
};
use crate::math::MathError;
use crate::model::{HedgeRange, SizingParams, TickRounding};

const PIPS: u64 = 1_000_000;
const BPS: u128 = 10_000;

/// Range bounds around `current_tick` and the liquidity that deploys the
/// hedge share of `total_value` (quote units) into them.
///
/// The bounds are the current sqrt price scaled by the configured factors,
/// converted back to ticks and snapped to the tick spacing. A zero value
/// yields zero liquidity.
pub fn compute_range(total_value: u128, current_tick: i32, params: &SizingParams) -> Result<HedgeRange, VaultError> {
    let spacing = params.tick_spacing;
    let sqrt_price = sqrt_ratio_at_tick(current_tick)?;
    let scale = |pips: u32| -> Result<U256, MathError> {
        let scaled = mul_div(sqrt_price, U256::from(pips), U256::from(PIPS))?;
        Ok(scaled.clamp(MIN_SQRT_RATIO, MAX_SQRT_RATIO - U256::from(1u8)))
    };
    let raw_lower = tick_at_sqrt_ratio(scale(params.sqrt_price_factor_lower_pips)?)?;
    let raw_upper = tick_at_sqrt_ratio(scale(params.sqrt_price_factor_upper_pips)?)?;

    let (lower, upper) = match params.tick_rounding {
        TickRounding::Outward => (floor_to_spacing(raw_lower, spacing), ceil_to_spacing(raw_upper, spacing)),
        TickRounding::Inward => (ceil_to_spacing(raw_lower, spacing), floor_to_spacing(raw_upper, spacing)),
    };
    let (min_usable, max_usable) = usable_bounds(spacing);
    let (tick_lower, tick_upper) = (lower.max(min_usable), upper.min(max_usable));
    if tick_lower >= tick_upper {
        return Err(VaultError::InvalidRange { tick_lower, tick_upper, spacing });
    }

    let hedge_value = mul_div_u128(total_value, u128::from(params.hedge_share_bps), BPS)?;
    let liquidity = liquidity_for_value(
        sqrt_price,
        sqrt_ratio_at_tick(tick_lower)?,
        sqrt_ratio_at_tick(tick_upper)?,
        hedge_value,
    )?;
    Ok(HedgeRange { tick_lower, tick_upper, liquidity })
}

/// Relative distance between two pool prices in bps, measured against `reference`.
pub fn price_deviation_bps(sqrt_price: U256, reference_sqrt_price: U256) -> Result<u128, MathError> {
    let now = price_x96(sqrt_price)?;
    let reference = price_x96(reference_sqrt_price)?;
    if reference.is_zero() {
        return Err(MathError::DivisionByZero("price_deviation_bps"));
    }
    let diff = if now > reference { now - reference } else { reference - now };
    to_u128(mul_div(diff, U256::from(BPS), reference)?)
}

impl Vault {
    /// Range the vault would hold for `total_value` quote units at the
    /// current pool tick.
    pub async fn compute_range(&self, total_value: u128) -> Result<HedgeRange, VaultError> {
        let tick = call(self.timeout(), "current_tick", self.prices.current_tick(self.config.pool)).await?;
        compute_range(total_value, tick, &self.state.sizing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_snap_outward_around_current_tick() {
        let params = SizingParams::default();
        let r = compute_range(40_000_000, -193_380, &params).unwrap();
        assert_eq!((r.tick_lower, r.tick_upper), (-197_850, -188_910));
        let r = compute_range(40_000_000, -192_201, &params).unwrap();
        assert_eq!((r.tick_lower, r.tick_upper), (-196_670, -187_730));
    }

    #[test]
    fn inward_rounding_never_widens() {
        let outward = compute_range(1, -192_201, &SizingParams::default()).unwrap();
        let params = SizingParams { tick_rounding: TickRounding::Inward, ..SizingParams::default() };
        let inward = compute_range(1, -192_201, &params).unwrap();
        assert!(inward.tick_lower >= outward.tick_lower);
        assert!(inward.tick_upper <= outward.tick_upper);
        assert!(inward.is_well_formed(10));
    }

    #[test]
    fn liquidity_scales_with_value() {
        let params = SizingParams::default();
        assert_eq!(compute_range(0, -193_380, &params).unwrap().liquidity, 0);
        let small = compute_range(1_000_000, -193_380, &params).unwrap().liquidity;
        let large = compute_range(2_000_000, -193_380, &params).unwrap().liquidity;
        assert!(small > 0);
        assert!(large >= 2 * small && large <= 2 * small + 2);
    }

    #[test]
    fn collapsing_band_is_rejected() {
        let params = SizingParams {
            sqrt_price_factor_lower_pips: 999_999,
            sqrt_price_factor_upper_pips: 1_000_001,
            tick_spacing: 200,
            tick_rounding: TickRounding::Inward,
            ..SizingParams::default()
        };
        assert!(matches!(
            compute_range(1, 5, &params),
            Err(VaultError::InvalidRange { .. })
        ));
    }

    #[test]
    fn deviation_is_symmetric_in_magnitude() {
        let centre = sqrt_ratio_at_tick(-193_380).unwrap();
        let moved = sqrt_ratio_at_tick(-192_201).unwrap();
        let bps = price_deviation_bps(moved, centre).unwrap();
        // 1.0001^1179 - 1 is about 12.5%
        assert!((1_240..=1_260).contains(&bps), "{bps}");
        assert_eq!(price_deviation_bps(centre, centre).unwrap(), 0);
    }
}
