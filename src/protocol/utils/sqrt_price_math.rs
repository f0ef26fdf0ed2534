//! Price movement and amount-delta formulas over Q64.96 sqrt prices.

use alloy::primitives::U256;

use super::solidity_math::{div_rounding_up, mul_div, mul_div_rounding_up};
use crate::protocol::errors::SimulationError;

pub(crate) const RESOLUTION: u8 = 96;
pub(crate) const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);
pub(crate) const U160_MAX: U256 = U256::from_limbs([u64::MAX, u64::MAX, u64::MAX >> 32, 0]);

/// Next sqrt price after adding (or removing) `amount` of token0, rounding
/// up so the price never undershoots the exact result.
fn get_next_sqrt_price_from_amount0_rounding_up(
    sqrt_price: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, SimulationError> {
    if amount.is_zero() {
        return Ok(sqrt_price);
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION;
    let product = amount.wrapping_mul(sqrt_price);

    if add {
        if product.wrapping_div(amount) == sqrt_price {
            let denominator = numerator1.wrapping_add(product);
            if denominator >= numerator1 {
                return mul_div_rounding_up(numerator1, sqrt_price, denominator);
            }
        }
        Ok(div_rounding_up(numerator1, (numerator1 / sqrt_price) + amount))
    } else {
        if product.wrapping_div(amount) != sqrt_price || numerator1 <= product {
            return Err(SimulationError::MathRangeError(
                "token0 amount exceeds pool reserves".to_string(),
            ));
        }
        let denominator = numerator1 - product;
        mul_div_rounding_up(numerator1, sqrt_price, denominator)
    }
}

/// Next sqrt price after adding (or removing) `amount` of token1, rounding
/// down so the price never overshoots the exact result.
fn get_next_sqrt_price_from_amount1_rounding_down(
    sqrt_price: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, SimulationError> {
    let liquidity = U256::from(liquidity);
    if add {
        let quotient = if amount <= U160_MAX {
            (amount << RESOLUTION) / liquidity
        } else {
            mul_div(amount, Q96, liquidity)?
        };

        let result = sqrt_price + quotient;
        if result <= U160_MAX {
            Ok(result)
        } else {
            Err(SimulationError::MathRangeError("sqrt price exceeds 160 bits".to_string()))
        }
    } else {
        let quotient = if amount <= U160_MAX {
            div_rounding_up(amount << RESOLUTION, liquidity)
        } else {
            mul_div_rounding_up(amount, Q96, liquidity)?
        };

        if sqrt_price <= quotient {
            return Err(SimulationError::MathRangeError(
                "token1 amount exceeds pool reserves".to_string(),
            ));
        }
        Ok(sqrt_price - quotient)
    }
}

/// Next sqrt price when swapping `amount_in` into the pool.
pub(crate) fn get_next_sqrt_price_from_input(
    sqrt_price: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256, SimulationError> {
    if sqrt_price.is_zero() {
        return Err(SimulationError::MathRangeError("sqrt price is zero".to_string()));
    }
    if liquidity == 0 {
        return Err(SimulationError::MathRangeError("liquidity is zero".to_string()));
    }

    if zero_for_one {
        get_next_sqrt_price_from_amount0_rounding_up(sqrt_price, liquidity, amount_in, true)
    } else {
        get_next_sqrt_price_from_amount1_rounding_down(sqrt_price, liquidity, amount_in, true)
    }
}

/// Next sqrt price when swapping `amount_out` out of the pool.
pub(crate) fn get_next_sqrt_price_from_output(
    sqrt_price: U256,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U256, SimulationError> {
    if sqrt_price.is_zero() {
        return Err(SimulationError::MathRangeError("sqrt price is zero".to_string()));
    }
    if liquidity == 0 {
        return Err(SimulationError::MathRangeError("liquidity is zero".to_string()));
    }

    if zero_for_one {
        get_next_sqrt_price_from_amount1_rounding_down(sqrt_price, liquidity, amount_out, false)
    } else {
        get_next_sqrt_price_from_amount0_rounding_up(sqrt_price, liquidity, amount_out, false)
    }
}

/// Token0 amount between two sqrt prices for the given liquidity.
pub(crate) fn get_amount0_delta(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, SimulationError> {
    let (lower, upper) = if sqrt_ratio_a > sqrt_ratio_b {
        (sqrt_ratio_b, sqrt_ratio_a)
    } else {
        (sqrt_ratio_a, sqrt_ratio_b)
    };

    if lower.is_zero() {
        return Err(SimulationError::MathRangeError("sqrt ratio is zero".to_string()));
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION;
    let numerator2 = upper - lower;

    if round_up {
        Ok(div_rounding_up(mul_div_rounding_up(numerator1, numerator2, upper)?, lower))
    } else {
        Ok(mul_div(numerator1, numerator2, upper)? / lower)
    }
}

/// Token1 amount between two sqrt prices for the given liquidity.
pub(crate) fn get_amount1_delta(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, SimulationError> {
    let (lower, upper) = if sqrt_ratio_a > sqrt_ratio_b {
        (sqrt_ratio_b, sqrt_ratio_a)
    } else {
        (sqrt_ratio_a, sqrt_ratio_b)
    };

    if round_up {
        mul_div_rounding_up(U256::from(liquidity), upper - lower, Q96)
    } else {
        mul_div(U256::from(liquidity), upper - lower, Q96)
    }
}
