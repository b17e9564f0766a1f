use alloy::primitives::{U256, U512};

use super::MathError;

/// 2^96, the scale of `sqrtPriceX96`.
pub const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);
/// 2^128, the scale of [`PriceX128`](super::PriceX128).
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);

fn widen(x: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(x.as_limbs());
    U512::from_limbs(limbs)
}

fn narrow(x: U512, op: &'static str) -> Result<U256, MathError> {
    let limbs = x.as_limbs();
    if limbs[4..].iter().any(|l| *l != 0) {
        return Err(MathError::Overflow(op));
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// `floor(a * b / denominator)` with a 512-bit intermediate.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero("mul_div"));
    }
    let product = widen(a) * widen(b);
    narrow(product / widen(denominator), "mul_div")
}

/// `ceil(a * b / denominator)` with a 512-bit intermediate.
pub fn mul_div_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero("mul_div_up"));
    }
    let product = widen(a) * widen(b);
    let d = widen(denominator);
    let mut q = product / d;
    if !(product % d).is_zero() {
        q += U512::from_limbs([1, 0, 0, 0, 0, 0, 0, 0]);
    }
    narrow(q, "mul_div_up")
}

/// `ceil(a / b)` for 256-bit operands.
pub fn div_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero("div_up"));
    }
    let q = a / b;
    if (a % b).is_zero() { Ok(q) } else { Ok(q + U256::from(1u8)) }
}

pub fn to_u128(x: U256) -> Result<u128, MathError> {
    let limbs = x.as_limbs();
    if limbs[2] != 0 || limbs[3] != 0 {
        return Err(MathError::Overflow("to_u128"));
    }
    Ok(((limbs[1] as u128) << 64) | limbs[0] as u128)
}

/// Integer square root (floor), Newton iteration.
pub fn isqrt(n: U256) -> U256 {
    if n.is_zero() {
        return U256::ZERO;
    }
    let bits = 256 - n.leading_zeros();
    let mut x = U256::from(1u8) << bits.div_ceil(2);
    loop {
        let y = (x + n / x) >> 1usize;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// `floor(a * b / d)` over u128 operands.
pub fn mul_div_u128(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    to_u128(mul_div(U256::from(a), U256::from(b), U256::from(d))?)
}

/// `ceil(a * b / d)` over u128 operands.
pub fn mul_div_up_u128(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    to_u128(mul_div_up(U256::from(a), U256::from(b), U256::from(d))?)
}
