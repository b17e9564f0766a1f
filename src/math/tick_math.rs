//! Tick <-> sqrt price conversion for a concentrated-liquidity pool.
//!
//! `sqrt_ratio_at_tick` is bit-exact with the canonical Q64.96 implementation
//! (price = 1.0001^tick). The inverse is a binary search over the forward map,
//! which keeps both directions consistent by construction.

use alloy::primitives::U256;

use super::MathError;

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

/// `sqrt_ratio_at_tick(MIN_TICK)`.
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4_295_128_739, 0, 0, 0]);
/// `sqrt_ratio_at_tick(MAX_TICK)`.
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([0x5d95_1d52_6398_8d26, 0xefd1_fc6a_5064_8849, 0xfffd_8963, 0]);

// Q128 multipliers for 1.0001^(-2^i / 2), i = 1..=19.
const MAGIC: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

/// `sqrt(1.0001^tick) * 2^96`, rounded up.
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<U256, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfBounds(tick));
    }
    let abs = tick.unsigned_abs();

    let mut ratio = if abs & 0x1 != 0 {
        U256::from(0xfffcb933bd6fad37aa2d162d1a594001u128)
    } else {
        U256::from_limbs([0, 0, 1, 0])
    };
    for (mask, magic) in MAGIC {
        if abs & mask != 0 {
            ratio = (ratio * U256::from(magic)) >> 128usize;
        }
    }
    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    let round_up = !(ratio & U256::from(u32::MAX)).is_zero();
    let sqrt_price = ratio >> 32usize;
    Ok(if round_up { sqrt_price + U256::from(1u8) } else { sqrt_price })
}

/// Greatest tick whose sqrt ratio is `<= sqrt_price_x96`.
pub fn tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32, MathError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(MathError::SqrtPriceOutOfBounds(sqrt_price_x96));
    }
    let (mut lo, mut hi) = (MIN_TICK, MAX_TICK - 1);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if sqrt_ratio_at_tick(mid)? <= sqrt_price_x96 {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}

/// Largest multiple of `spacing` that is `<= tick`.
pub fn floor_to_spacing(tick: i32, spacing: i32) -> i32 {
    tick.div_euclid(spacing) * spacing
}

/// Smallest multiple of `spacing` that is `>= tick`.
pub fn ceil_to_spacing(tick: i32, spacing: i32) -> i32 {
    -((-tick).div_euclid(spacing) * spacing)
}

/// Lowest and highest ticks usable with `spacing`.
pub fn usable_bounds(spacing: i32) -> (i32, i32) {
    (ceil_to_spacing(MIN_TICK, spacing), floor_to_spacing(MAX_TICK, spacing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_match_reference_constants() {
        assert_eq!(sqrt_ratio_at_tick(MIN_TICK).unwrap(), MIN_SQRT_RATIO);
        assert_eq!(sqrt_ratio_at_tick(MAX_TICK).unwrap(), MAX_SQRT_RATIO);
        assert_eq!(sqrt_ratio_at_tick(0).unwrap(), U256::from(1u8) << 96usize);
    }

    #[test]
    fn out_of_range_ticks_are_rejected() {
        assert_eq!(
            sqrt_ratio_at_tick(MAX_TICK + 1),
            Err(MathError::TickOutOfBounds(MAX_TICK + 1))
        );
        assert!(tick_at_sqrt_ratio(MAX_SQRT_RATIO).is_err());
        assert!(tick_at_sqrt_ratio(MIN_SQRT_RATIO - U256::from(1u8)).is_err());
    }

    #[test]
    fn inverse_is_consistent() {
        for tick in [-887_272, -193_380, -192_201, -1, 0, 1, 50_000, 887_271] {
            let sp = sqrt_ratio_at_tick(tick).unwrap();
            assert_eq!(tick_at_sqrt_ratio(sp).unwrap(), tick);
            if tick < MAX_TICK - 1 {
                let next = sqrt_ratio_at_tick(tick + 1).unwrap();
                assert_eq!(tick_at_sqrt_ratio(next - U256::from(1u8)).unwrap(), tick);
            }
        }
    }

    #[test]
    fn ratio_is_monotonic() {
        let mut prev = sqrt_ratio_at_tick(-200_010).unwrap();
        for tick in -200_000..-199_900 {
            let cur = sqrt_ratio_at_tick(tick).unwrap();
            assert!(cur > prev);
            prev = cur;
        }
    }

    #[test]
    fn spacing_snaps() {
        assert_eq!(floor_to_spacing(-196_665, 10), -196_670);
        assert_eq!(ceil_to_spacing(-196_665, 10), -196_660);
        assert_eq!(floor_to_spacing(-187_738, 10), -187_740);
        assert_eq!(ceil_to_spacing(-187_738, 10), -187_730);
        assert_eq!(floor_to_spacing(-196_670, 10), -196_670);
        assert_eq!(ceil_to_spacing(-196_670, 10), -196_670);
        assert_eq!(floor_to_spacing(15, 10), 10);
        assert_eq!(ceil_to_spacing(15, 10), 20);
        assert_eq!(usable_bounds(10), (-887_270, 887_270));
    }
}
