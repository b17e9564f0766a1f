use alloy::primitives::U256;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::full_math::{Q96, Q128, isqrt, mul_div, mul_div_up, to_u128};
use super::MathError;

/// Q128.128 price: quote base units per base unit of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PriceX128(#[schemars(with = "String")] pub U256);

impl PriceX128 {
    pub const ZERO: Self = Self(U256::ZERO);

    /// `quote_units / base_units`, rounded down.
    pub fn from_ratio(quote_units: u128, base_units: u128) -> Result<Self, MathError> {
        Ok(Self(mul_div(U256::from(quote_units), Q128, U256::from(base_units))?))
    }

    /// Price implied by a pool sqrt price (token1 per token0).
    pub fn from_sqrt_price_x96(sqrt_price_x96: U256) -> Result<Self, MathError> {
        // (sp^2 / 2^192) * 2^128 = sp^2 / 2^64
        Ok(Self(mul_div(sqrt_price_x96, sqrt_price_x96, U256::from(1u128 << 64))?))
    }

    /// Human-readable price (whole quote per whole base) into a fixed-point price.
    /// Only used at data boundaries (CSV rows, CLI flags).
    pub fn from_decimal(price: f64, base_decimals: u8, quote_decimals: u8) -> Result<Self, MathError> {
        if !price.is_finite() || price < 0.0 {
            return Err(MathError::Overflow("from_decimal"));
        }
        let scaled = (price * 10f64.powi(quote_decimals as i32)).round();
        if scaled >= u128::MAX as f64 {
            return Err(MathError::Overflow("from_decimal"));
        }
        Self::from_ratio(scaled as u128, 10u128.pow(base_decimals as u32))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Quote value of `amount` base units, rounded down.
    pub fn value_of(&self, amount: u128) -> Result<u128, MathError> {
        to_u128(mul_div(U256::from(amount), self.0, Q128)?)
    }

    /// Quote value of a signed amount; the magnitude is rounded down, so
    /// `signed_value_of(-x) == -signed_value_of(x)`.
    pub fn signed_value_of(&self, amount: i128) -> Result<i128, MathError> {
        let magnitude = self.value_of(amount.unsigned_abs())?;
        let magnitude = i128::try_from(magnitude).map_err(|_| MathError::Overflow("signed_value_of"))?;
        Ok(if amount < 0 { -magnitude } else { magnitude })
    }

    /// Base units worth `value` quote units, rounded down.
    pub fn amount_for(&self, value: u128) -> Result<u128, MathError> {
        if self.is_zero() {
            return Err(MathError::DivisionByZero("amount_for"));
        }
        to_u128(mul_div(U256::from(value), Q128, self.0)?)
    }

    /// Base units worth a signed `value`, rounded toward negative infinity.
    pub fn signed_amount_for(&self, value: i128) -> Result<i128, MathError> {
        if self.is_zero() {
            return Err(MathError::DivisionByZero("signed_amount_for"));
        }
        let magnitude = if value < 0 {
            to_u128(mul_div_up(U256::from(value.unsigned_abs()), Q128, self.0)?)?
        } else {
            to_u128(mul_div(U256::from(value.unsigned_abs()), Q128, self.0)?)?
        };
        let magnitude = i128::try_from(magnitude).map_err(|_| MathError::Overflow("signed_amount_for"))?;
        Ok(if value < 0 { -magnitude } else { magnitude })
    }

    /// Sqrt price (Q64.96) equivalent of this price, rounded down.
    pub fn to_sqrt_price_x96(&self) -> U256 {
        // sqrt(p / 2^128) * 2^96 = sqrt(p * 2^64)
        isqrt(self.0 << 64usize)
    }

    /// Lossy float view, for reporting only.
    pub fn to_f64(&self, base_decimals: u8, quote_decimals: u8) -> f64 {
        let limbs = self.0.as_limbs();
        let raw = limbs
            .iter()
            .rev()
            .fold(0.0f64, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64);
        raw / 2f64.powi(128) * 10f64.powi(base_decimals as i32 - quote_decimals as i32)
    }
}

/// Price (token1 per token0, scaled by 2^96) at a sqrt price, rounded down.
pub fn price_x96(sqrt_price_x96: U256) -> Result<U256, MathError> {
    mul_div(sqrt_price_x96, sqrt_price_x96, Q96)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick_math::{sqrt_ratio_at_tick, tick_at_sqrt_ratio};

    #[test]
    fn signed_value_is_symmetric() {
        let p = PriceX128::from_ratio(4_500_672_000, 10u128.pow(18)).unwrap();
        let v = p.signed_value_of(3_333_333_333_333_333).unwrap();
        assert!(v > 0);
        assert_eq!(p.signed_value_of(-3_333_333_333_333_333).unwrap(), -v);
        assert_eq!(p.signed_value_of(0).unwrap(), 0);
    }

    #[test]
    fn signed_amount_rounds_toward_negative_infinity() {
        let p = PriceX128::from_ratio(3, 1).unwrap();
        assert_eq!(p.signed_amount_for(10).unwrap(), 3);
        assert_eq!(p.signed_amount_for(-10).unwrap(), -4);
        assert_eq!(p.signed_amount_for(-9).unwrap(), -3);
    }

    #[test]
    fn unit_price_round_trips_exactly() {
        let p = PriceX128::from_ratio(1, 1).unwrap();
        assert_eq!(p.0, Q128);
        assert_eq!(p.value_of(40 * 10u128.pow(18)).unwrap(), 40 * 10u128.pow(18));
        assert_eq!(p.amount_for(7).unwrap(), 7);
    }

    #[test]
    fn decimal_price_maps_to_expected_tick() {
        // 4500.672 USDC (6 decimals) per ETH (18 decimals)
        let p = PriceX128::from_decimal(4500.672, 18, 6).unwrap();
        let tick = tick_at_sqrt_ratio(p.to_sqrt_price_x96()).unwrap();
        assert!((-192_202..=-192_200).contains(&tick), "tick {tick}");
        let back = PriceX128::from_sqrt_price_x96(sqrt_ratio_at_tick(tick).unwrap()).unwrap();
        let f = back.to_f64(18, 6);
        assert!((f - 4500.672).abs() < 1.0, "price {f}");
    }

    #[test]
    fn zero_price_is_rejected_for_division() {
        assert!(PriceX128::ZERO.amount_for(1).is_err());
    }
}
