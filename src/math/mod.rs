//! Fixed-point arithmetic shared by the vault core and the simulated venue.
//!
//! Everything here is integer-only. Rounding direction is always chosen by the
//! caller through an explicit function (`mul_div` vs `mul_div_up`, floor vs ceil
//! tick snapping), never by ad-hoc arithmetic at the call site.

pub mod full_math;
pub mod liquidity;
pub mod price;
pub mod tick_math;

use thiserror::Error;

pub use full_math::{Q96, Q128, mul_div, mul_div_up, to_u128};
pub use price::PriceX128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("tick {0} outside [{min}, {max}]", min = tick_math::MIN_TICK, max = tick_math::MAX_TICK)]
    TickOutOfBounds(i32),

    #[error("sqrt price {0} outside the representable range")]
    SqrtPriceOutOfBounds(alloy::primitives::U256),
}
