//! Liquidity <-> token amount decomposition and single-range swap steps.

use alloy::primitives::U256;

use super::full_math::{Q96, div_up, mul_div, mul_div_up, to_u128};
use super::MathError;

/// Token amounts held by a range position at a given price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenAmounts {
    pub amount0: u128,
    pub amount1: u128,
}

fn ordered(a: U256, b: U256) -> (U256, U256) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Token0 between two sqrt prices for `liquidity`.
pub fn amount0_delta(sqrt_a: U256, sqrt_b: U256, liquidity: u128, round_up: bool) -> Result<U256, MathError> {
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    if lo.is_zero() {
        return Err(MathError::DivisionByZero("amount0_delta"));
    }
    let numerator1 = U256::from(liquidity) << 96usize;
    let numerator2 = hi - lo;
    if round_up {
        div_up(mul_div_up(numerator1, numerator2, hi)?, lo)
    } else {
        Ok(mul_div(numerator1, numerator2, hi)? / lo)
    }
}

/// Token1 between two sqrt prices for `liquidity`.
pub fn amount1_delta(sqrt_a: U256, sqrt_b: U256, liquidity: u128, round_up: bool) -> Result<U256, MathError> {
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    if round_up {
        mul_div_up(U256::from(liquidity), hi - lo, Q96)
    } else {
        mul_div(U256::from(liquidity), hi - lo, Q96)
    }
}

/// Amounts held by `liquidity` spread over `[sqrt_a, sqrt_b]` at `sqrt_price`, rounded down.
pub fn amounts_for_liquidity(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
) -> Result<TokenAmounts, MathError> {
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    let (amount0, amount1) = if sqrt_price <= lo {
        (amount0_delta(lo, hi, liquidity, false)?, U256::ZERO)
    } else if sqrt_price < hi {
        (
            amount0_delta(sqrt_price, hi, liquidity, false)?,
            amount1_delta(lo, sqrt_price, liquidity, false)?,
        )
    } else {
        (U256::ZERO, amount1_delta(lo, hi, liquidity, false)?)
    };
    Ok(TokenAmounts {
        amount0: to_u128(amount0)?,
        amount1: to_u128(amount1)?,
    })
}

/// Largest liquidity whose range value at `sqrt_price` does not exceed `value`,
/// with value expressed in token1 units and token0 priced at the pool price.
///
/// Per unit of liquidity the range holds `(hi - c) / (hi * c)` token0 and
/// `(c - lo)` token1 (scaled by 2^96), where `c` is the price clamped into the
/// range; token0 is worth `sqrt_price^2` token1.
pub fn liquidity_for_value(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    value: u128,
) -> Result<u128, MathError> {
    if value == 0 {
        return Ok(0);
    }
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    let c = sqrt_price.clamp(lo, hi);
    if c.is_zero() {
        return Err(MathError::DivisionByZero("liquidity_for_value"));
    }
    let token0_leg = mul_div(mul_div(hi - c, sqrt_price, hi)?, sqrt_price, c)?;
    let token1_leg = c - lo;
    let per_liquidity = token0_leg
        .checked_add(token1_leg)
        .ok_or(MathError::Overflow("liquidity_for_value"))?;
    to_u128(mul_div(U256::from(value), Q96, per_liquidity)?)
}

/// Price after selling `amount_in` of token0 into `liquidity` (price moves down), rounded up.
pub fn next_sqrt_price_from_amount0_in(sqrt_price: U256, liquidity: u128, amount_in: u128) -> Result<U256, MathError> {
    if amount_in == 0 {
        return Ok(sqrt_price);
    }
    let numerator1 = U256::from(liquidity) << 96usize;
    let product = U256::from(amount_in)
        .checked_mul(sqrt_price)
        .ok_or(MathError::Overflow("next_sqrt_price_from_amount0_in"))?;
    let denominator = numerator1
        .checked_add(product)
        .ok_or(MathError::Overflow("next_sqrt_price_from_amount0_in"))?;
    mul_div_up(numerator1, sqrt_price, denominator)
}

/// Price after taking `amount_out` of token0 out of `liquidity` (price moves up), rounded up.
pub fn next_sqrt_price_from_amount0_out(sqrt_price: U256, liquidity: u128, amount_out: u128) -> Result<U256, MathError> {
    if amount_out == 0 {
        return Ok(sqrt_price);
    }
    let numerator1 = U256::from(liquidity) << 96usize;
    let product = U256::from(amount_out)
        .checked_mul(sqrt_price)
        .ok_or(MathError::Overflow("next_sqrt_price_from_amount0_out"))?;
    if product >= numerator1 {
        return Err(MathError::Overflow("next_sqrt_price_from_amount0_out"));
    }
    mul_div_up(numerator1, sqrt_price, numerator1 - product)
}
