//! Pool arithmetic
//!
//! Every product of two token amounts is formed in u128, so no intermediate
//! overflows; only results that leave the u64 range are errors.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("result exceeds u64")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
}

/// Integer square root, rounded down (Newton's method from above)
fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << bits.div_ceil(2);
    loop {
        let next = (x + n / x) / 2;
        if next >= x {
            return x;
        }
        x = next;
    }
}

/// `floor(sqrt(x * y))`; always fits in u64
pub fn geometry_mean(x: u64, y: u64) -> u64 {
    isqrt(u128::from(x) * u128::from(y)) as u64
}

/// `floor(a * b / c)`
pub fn mul_div(a: u64, b: u64, c: u64) -> Result<u64, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero);
    }
    let quotient = u128::from(a) * u128::from(b) / u128::from(c);
    u64::try_from(quotient).map_err(|_| MathError::Overflow)
}

/// Tokens paid out for `amount_in` against reserves `(reserve_in, reserve_out)`
///
/// The remaining output reserve is rounded up, so the product of the reserves
/// never decreases.
pub fn swap_output(reserve_in: u64, reserve_out: u64, amount_in: u64) -> Result<u64, MathError> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = u128::from(reserve_in) * u128::from(reserve_out);
    let remaining = product.div_ceil(u128::from(reserve_in) + u128::from(amount_in));
    u64::try_from(u128::from(reserve_out) - remaining).map_err(|_| MathError::Overflow)
}
