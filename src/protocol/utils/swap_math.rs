//! Single-step swap computation within one tick range.

use alloy::primitives::{I256, U256};

use super::{
    solidity_math::{mul_div, mul_div_rounding_up},
    sqrt_price_math,
};
use crate::protocol::errors::SimulationError;

const FEE_DENOMINATOR: u64 = 1_000_000;

/// Moves the price from `sqrt_ratio_current` towards `sqrt_ratio_target` as
/// far as `amount_remaining` (positive for exact input, negative for exact
/// output) allows, at `fee_pips` parts per million taken from the input.
///
/// Returns `(sqrt_ratio_next, amount_in, amount_out, fee_amount)`.
pub(crate) fn compute_swap_step(
    sqrt_ratio_current: U256,
    sqrt_ratio_target: U256,
    liquidity: u128,
    amount_remaining: I256,
    fee_pips: u32,
) -> Result<(U256, U256, U256, U256), SimulationError> {
    let zero_for_one = sqrt_ratio_current >= sqrt_ratio_target;
    let exact_in = amount_remaining >= I256::ZERO;

    let sqrt_ratio_next: U256;
    let mut amount_in = U256::ZERO;
    let mut amount_out = U256::ZERO;

    if exact_in {
        let amount_remaining_less_fee = mul_div(
            amount_remaining.into_raw(),
            U256::from(FEE_DENOMINATOR - fee_pips as u64),
            U256::from(FEE_DENOMINATOR),
        )?;
        amount_in = if zero_for_one {
            sqrt_price_math::get_amount0_delta(
                sqrt_ratio_target,
                sqrt_ratio_current,
                liquidity,
                true,
            )?
        } else {
            sqrt_price_math::get_amount1_delta(
                sqrt_ratio_current,
                sqrt_ratio_target,
                liquidity,
                true,
            )?
        };
        sqrt_ratio_next = if amount_remaining_less_fee >= amount_in {
            sqrt_ratio_target
        } else {
            sqrt_price_math::get_next_sqrt_price_from_input(
                sqrt_ratio_current,
                liquidity,
                amount_remaining_less_fee,
                zero_for_one,
            )?
        };
    } else {
        amount_out = if zero_for_one {
            sqrt_price_math::get_amount1_delta(
                sqrt_ratio_target,
                sqrt_ratio_current,
                liquidity,
                false,
            )?
        } else {
            sqrt_price_math::get_amount0_delta(
                sqrt_ratio_current,
                sqrt_ratio_target,
                liquidity,
                false,
            )?
        };
        sqrt_ratio_next = if amount_remaining.abs().into_raw() >= amount_out {
            sqrt_ratio_target
        } else {
            sqrt_price_math::get_next_sqrt_price_from_output(
                sqrt_ratio_current,
                liquidity,
                amount_remaining.abs().into_raw(),
                zero_for_one,
            )?
        };
    }

    let max = sqrt_ratio_target == sqrt_ratio_next;

    if zero_for_one {
        if !(max && exact_in) {
            amount_in = sqrt_price_math::get_amount0_delta(
                sqrt_ratio_next,
                sqrt_ratio_current,
                liquidity,
                true,
            )?;
        }
        if !(max && !exact_in) {
            amount_out = sqrt_price_math::get_amount1_delta(
                sqrt_ratio_next,
                sqrt_ratio_current,
                liquidity,
                false,
            )?;
        }
    } else {
        if !(max && exact_in) {
            amount_in = sqrt_price_math::get_amount1_delta(
                sqrt_ratio_current,
                sqrt_ratio_next,
                liquidity,
                true,
            )?;
        }
        if !(max && !exact_in) {
            amount_out = sqrt_price_math::get_amount0_delta(
                sqrt_ratio_current,
                sqrt_ratio_next,
                liquidity,
                false,
            )?;
        }
    }

    if !exact_in && amount_out > amount_remaining.abs().into_raw() {
        amount_out = amount_remaining.abs().into_raw();
    }

    let fee_amount = if exact_in && sqrt_ratio_next != sqrt_ratio_target {
        // the target was not reached, take the entire remainder as fee
        amount_remaining.into_raw() - amount_in
    } else {
        mul_div_rounding_up(
            amount_in,
            U256::from(fee_pips),
            U256::from(FEE_DENOMINATOR - fee_pips as u64),
        )?
    };

    Ok((sqrt_ratio_next, amount_in, amount_out, fee_amount))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    struct TestCase {
        price: U256,
        target: U256,
        liquidity: u128,
        remaining: I256,
        fee: u32,
        expected: (U256, U256, U256, U256),
    }

    #[rstest]
    #[case::exact_in_partial(TestCase {
        price: U256::from_str("1917240610156820439288675683655550").unwrap(),
        target: U256::from_str("1919023616462402511535565081385034").unwrap(),
        liquidity: 23130341825817804069,
        remaining: I256::from_raw(U256::from_str("1000000000000000000").unwrap()),
        fee: 500,
        expected: (
            U256::from_str("1917244033735642980420262835667387").unwrap(),
            U256::from_str("999500000000000000").unwrap(),
            U256::from_str("1706820897").unwrap(),
            U256::from_str("500000000000000").unwrap(),
        ),
    })]
    #[case::exact_out_reaches_target(TestCase {
        price: U256::from_str("1917240610156820439288675683655550").unwrap(),
        target: U256::from_str("1919023616462402511535565081385034").unwrap(),
        liquidity: 23130341825817804069,
        remaining: I256::from_str("-1000000000000000000").unwrap(),
        fee: 500,
        expected: (
            U256::from_str("1919023616462402511535565081385034").unwrap(),
            U256::from_str("520541484453545253034").unwrap(),
            U256::from_str("888091216672").unwrap(),
            U256::from_str("260400942698121688").unwrap(),
        ),
    })]
    #[case::exact_out_partial(TestCase {
        price: U256::from_str("1917240610156820439288675683655550").unwrap(),
        target: U256::from_str("1908498483466244238266951834509291").unwrap(),
        liquidity: 23130341825817804069,
        remaining: I256::from_str("-1000000000000000000").unwrap(),
        fee: 500,
        expected: (
            U256::from_str("1917237184865352164019453920762266").unwrap(),
            U256::from_str("1707680836").unwrap(),
            U256::from_str("1000000000000000000").unwrap(),
            U256::from_str("854268").unwrap(),
        ),
    })]
    #[case::exact_in_reaches_target(TestCase {
        price: U256::from_str("1917240610156820439288675683655550").unwrap(),
        target: U256::from_str("1908498483466244238266951834509291").unwrap(),
        liquidity: 23130341825817804069,
        remaining: I256::from_raw(U256::from_str("1000000000000000000").unwrap()),
        fee: 500,
        expected: (
            U256::from_str("1908498483466244238266951834509291").unwrap(),
            U256::from_str("4378348149175").unwrap(),
            U256::from_str("2552228553845698906796").unwrap(),
            U256::from_str("2190269210").unwrap(),
        ),
    })]
    #[case::zero_liquidity(TestCase {
        price: U256::from_str("1917240610156820439288675683655550").unwrap(),
        target: U256::from_str("1908498483466244238266951834509291").unwrap(),
        liquidity: 0,
        remaining: I256::from_raw(U256::from_str("1000000000000000000").unwrap()),
        fee: 500,
        expected: (
            U256::from_str("1908498483466244238266951834509291").unwrap(),
            U256::ZERO,
            U256::ZERO,
            U256::ZERO,
        ),
    })]
    fn test_compute_swap_step(#[case] case: TestCase) {
        let res = compute_swap_step(
            case.price,
            case.target,
            case.liquidity,
            case.remaining,
            case.fee,
        )
        .unwrap();
        assert_eq!(res, case.expected);
    }

    #[test]
    fn test_zero_remaining_input() {
        let price = U256::from_str("1917240610156820439288675683655550").unwrap();
        let target = U256::from_str("1919023616462402511535565081385034").unwrap();
        let (next, amount_in, amount_out, fee) =
            compute_swap_step(price, target, 23130341825817804069, I256::ZERO, 500).unwrap();
        assert_eq!(next, price);
        assert_eq!(amount_in, U256::ZERO);
        assert_eq!(amount_out, U256::ZERO);
        assert_eq!(fee, U256::ZERO);
    }
}
