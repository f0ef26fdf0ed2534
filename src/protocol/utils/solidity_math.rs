//! Full-precision 512-bit intermediate multiplication and division,
//! matching the EVM reference (FullMath) bit for bit.

use alloy::primitives::U256;

use crate::protocol::errors::SimulationError;

/// Computes `a * b / denominator` with the 512-bit intermediate product,
/// flooring the result. Errors when the quotient does not fit in 256 bits
/// or the denominator is zero.
pub(crate) fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, SimulationError> {
    if denominator.is_zero() {
        return Err(SimulationError::FatalError("mul_div division by zero".to_string()));
    }

    // 512-bit product as prod1 * 2^256 + prod0
    let mm = a.mul_mod(b, U256::MAX);
    let mut prod0 = a.wrapping_mul(b);
    let (mut prod1, borrow) = mm.overflowing_sub(prod0);
    if borrow {
        prod1 = prod1.wrapping_sub(U256::from(1u64));
    }

    if prod1.is_zero() {
        return Ok(prod0.wrapping_div(denominator));
    }

    if denominator <= prod1 {
        return Err(SimulationError::FatalError("mul_div overflow".to_string()));
    }

    let remainder = a.mul_mod(b, denominator);
    let (sub, borrow) = prod0.overflowing_sub(remainder);
    prod0 = sub;
    if borrow {
        prod1 = prod1.wrapping_sub(U256::from(1u64));
    }

    // factor out powers of two and invert the odd denominator mod 2^256
    let twos = denominator & denominator.wrapping_neg();
    let denominator = denominator.wrapping_div(twos);
    prod0 = prod0.wrapping_div(twos);

    let twos_complement = twos
        .wrapping_neg()
        .wrapping_div(twos)
        .wrapping_add(U256::from(1u64));
    prod0 |= prod1.wrapping_mul(twos_complement);

    // Newton-Raphson: six iterations double the correct bits past 256
    let mut inverse = U256::from(3u64).wrapping_mul(denominator) ^ U256::from(2u64);
    for _ in 0..6 {
        inverse =
            inverse.wrapping_mul(U256::from(2u64).wrapping_sub(denominator.wrapping_mul(inverse)));
    }

    Ok(prod0.wrapping_mul(inverse))
}

/// Like [`mul_div`], but rounds up on a non-zero remainder.
pub(crate) fn mul_div_rounding_up(
    a: U256,
    b: U256,
    denominator: U256,
) -> Result<U256, SimulationError> {
    let mut result = mul_div(a, b, denominator)?;
    if a.mul_mod(b, denominator) > U256::ZERO {
        if result == U256::MAX {
            return Err(SimulationError::FatalError("mul_div_rounding_up overflow".to_string()));
        }
        result += U256::from(1u64);
    }
    Ok(result)
}

/// Divides `a` by `b`, rounding up. `b` must be non-zero.
pub(crate) fn div_rounding_up(a: U256, b: U256) -> U256 {
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::from(1u64)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(U256::from(6u64), U256::from(8u64), U256::from(4u64), U256::from(12u64))]
    #[case(U256::from(7u64), U256::from(11u64), U256::from(9u64), U256::from(8u64))]
    #[case(U256::MAX, U256::MAX, U256::MAX, U256::MAX)]
    fn test_mul_div(#[case] a: U256, #[case] b: U256, #[case] d: U256, #[case] expected: U256) {
        assert_eq!(mul_div(a, b, d).unwrap(), expected);
    }

    #[test]
    fn test_mul_div_errors() {
        assert!(mul_div(U256::from(1u64), U256::from(1u64), U256::ZERO).is_err());
        // 2^256-1 * 2 / 1 cannot fit
        assert!(mul_div(U256::MAX, U256::from(2u64), U256::from(1u64)).is_err());
    }

    #[rstest]
    #[case(U256::from(7u64), U256::from(11u64), U256::from(9u64), U256::from(9u64))]
    #[case(U256::from(6u64), U256::from(8u64), U256::from(4u64), U256::from(12u64))]
    fn test_mul_div_rounding_up(
        #[case] a: U256,
        #[case] b: U256,
        #[case] d: U256,
        #[case] expected: U256,
    ) {
        assert_eq!(mul_div_rounding_up(a, b, d).unwrap(), expected);
    }

    #[rstest]
    #[case(U256::from(10u64), U256::from(5u64), U256::from(2u64))]
    #[case(U256::from(10u64), U256::from(3u64), U256::from(4u64))]
    fn test_div_rounding_up(#[case] a: U256, #[case] b: U256, #[case] expected: U256) {
        assert_eq!(div_rounding_up(a, b), expected);
    }
}
