pub mod liquidity_math;
pub(crate) mod solidity_math;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_list;
pub mod tick_math;

use alloy::primitives::{I256, U256};

/// Running accumulators of the swap loop.
#[derive(Debug)]
pub(crate) struct SwapState {
    pub amount_remaining: I256,
    pub amount_calculated: I256,
    pub sqrt_price: U256,
    pub tick: i32,
    pub liquidity: u128,
}

/// Per-iteration intermediates of the swap loop.
#[derive(Debug)]
pub(crate) struct StepComputation {
    pub sqrt_price_start: U256,
    pub tick_next: i32,
    pub initialized: bool,
    pub sqrt_price_next: U256,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
}

/// Picks the per-step price target: the next tick boundary, clamped so the
/// step never overshoots the caller's limit.
pub(crate) fn get_sqrt_ratio_target(
    sqrt_price_next: U256,
    sqrt_price_limit: U256,
    zero_for_one: bool,
) -> U256 {
    let cross_limit = (zero_for_one && sqrt_price_next < sqrt_price_limit) ||
        (!zero_for_one && sqrt_price_next > sqrt_price_limit);
    if cross_limit {
        sqrt_price_limit
    } else {
        sqrt_price_next
    }
}
