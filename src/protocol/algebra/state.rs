//! Pool state and the swap engine.

use alloy::primitives::{Sign, I256, U256};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{
    adaptive_fee::{self, FeeConfiguration},
    timepoints::{Timepoint, TimepointStorage},
};
use crate::protocol::{
    errors::{SimulationError, TransitionError},
    safe_math::{
        safe_add_i256, safe_add_u256, safe_div_u256, safe_mul_u256, safe_sub_i256, sqrt_u256,
    },
    u256_num::{u256_to_biguint, u256_to_f64},
    utils::{
        get_sqrt_ratio_target, liquidity_math, sqrt_price_math::U160_MAX, swap_math,
        tick_list::TickList, tick_math, SwapState, StepComputation,
    },
};

/// Upper bound on the per-block volume per liquidity accumulator, Q64.64.
const MAX_VOLUME_PER_LIQUIDITY: U256 = U256::from_limbs([0, 100_000, 0, 0]);

/// Hot slot of the pool: current price, tick, fee and oracle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    /// Current sqrt price as Q64.96.
    pub price: U256,
    /// Tick the current price falls in.
    pub tick: i32,
    /// Swap fee in hundredths of a bip.
    pub fee: u16,
    /// Ring index of the newest written timepoint.
    pub timepoint_index: u16,
}

/// State changes produced by a simulated swap, tagged with the pool they
/// belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub pool_id: String,
    pub liquidity: u128,
    pub global_state: GlobalState,
    pub volume_per_liquidity_in_block: U256,
    pub timepoints: Vec<(u16, Timepoint)>,
}

/// Outcome of a quote, including the update needed to chain further swaps
/// on top of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAmountOutResult {
    pub amount_out: BigUint,
    pub fee_amount: BigUint,
    /// The trade only filled partially because the price ran into the
    /// outermost initialized tick.
    pub price_limit_reached: bool,
    pub state_update: StateUpdate,
}

#[derive(Debug)]
struct SwapResults {
    amount0: I256,
    amount1: I256,
    sqrt_price: U256,
    liquidity: u128,
    tick: i32,
    fee: u32,
    fee_amount: U256,
    timepoint_index: u16,
    volume_per_liquidity_in_block: U256,
    written_timepoint: Option<(u16, Timepoint)>,
    price_limit_reached: bool,
}

/// Full off-chain image of one Algebra V1 pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgebraPoolState {
    pub pool_id: String,
    /// Liquidity active in the current tick range.
    pub liquidity: u128,
    pub global_state: GlobalState,
    /// Volume per liquidity accumulated by swaps in the current block.
    pub volume_per_liquidity_in_block: U256,
    /// Timestamp the simulation runs at; swaps in the same timestamp share
    /// one oracle timepoint.
    pub block_timestamp: u32,
    pub ticks: TickList,
    pub timepoints: TimepointStorage,
    pub fee_config: FeeConfiguration,
}

impl AlgebraPoolState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool_id: String,
        liquidity: u128,
        global_state: GlobalState,
        volume_per_liquidity_in_block: U256,
        block_timestamp: u32,
        ticks: TickList,
        timepoints: TimepointStorage,
        fee_config: FeeConfiguration,
    ) -> Self {
        AlgebraPoolState {
            pool_id,
            liquidity,
            global_state,
            volume_per_liquidity_in_block,
            block_timestamp,
            ticks,
            timepoints,
            fee_config,
        }
    }

    /// Marginal price of token0 in units of token1, ignoring decimals.
    pub fn spot_price(&self) -> Result<f64, SimulationError> {
        let sqrt = u256_to_f64(self.global_state.price)? / 2.0f64.powi(96);
        Ok(sqrt * sqrt)
    }

    /// Quotes a sell of `amount_in` of one token for the other, optionally
    /// bounded by a caller supplied sqrt price limit.
    ///
    /// A zero input returns a zero quote with an empty state update. A trade
    /// that cannot produce any output errors with `NoLiquidityForTrade`; one
    /// that fills only partially succeeds with `price_limit_reached` set.
    pub fn get_amount_out(
        &self,
        amount_in: BigUint,
        zero_for_one: bool,
        sqrt_price_limit: Option<U256>,
    ) -> Result<GetAmountOutResult, SimulationError> {
        if amount_in.is_zero() {
            return Ok(GetAmountOutResult {
                amount_out: BigUint::zero(),
                fee_amount: BigUint::zero(),
                price_limit_reached: false,
                state_update: StateUpdate {
                    pool_id: self.pool_id.clone(),
                    liquidity: self.liquidity,
                    global_state: self.global_state,
                    volume_per_liquidity_in_block: self.volume_per_liquidity_in_block,
                    timepoints: vec![],
                },
            });
        }

        if amount_in.bits() > 255 {
            return Err(SimulationError::InvalidInput(
                "sell amount does not fit in 255 bits".to_string(),
            ));
        }
        let amount_specified = I256::checked_from_sign_and_abs(
            Sign::Positive,
            crate::protocol::u256_num::biguint_to_u256(&amount_in),
        )
        .ok_or_else(|| {
            SimulationError::InvalidInput("sell amount does not fit in 255 bits".to_string())
        })?;

        let results = self.swap(zero_for_one, amount_specified, sqrt_price_limit)?;

        let received = if zero_for_one { results.amount1 } else { results.amount0 };
        let amount_out = received.unsigned_abs();
        if amount_out.is_zero() {
            return Err(SimulationError::NoLiquidityForTrade(
                "trade produces no output at the current price".to_string(),
            ));
        }

        let fee = match &self.fee_config {
            FeeConfiguration::Dynamic(_) => results.fee as u16,
            FeeConfiguration::Fixed(_) => self.global_state.fee,
        };

        Ok(GetAmountOutResult {
            amount_out: u256_to_biguint(amount_out),
            fee_amount: u256_to_biguint(results.fee_amount),
            price_limit_reached: results.price_limit_reached,
            state_update: StateUpdate {
                pool_id: self.pool_id.clone(),
                liquidity: results.liquidity,
                global_state: GlobalState {
                    price: results.sqrt_price,
                    tick: results.tick,
                    fee,
                    timepoint_index: results.timepoint_index,
                },
                volume_per_liquidity_in_block: results.volume_per_liquidity_in_block,
                timepoints: results.written_timepoint.into_iter().collect(),
            },
        })
    }

    /// Largest sellable input and the output it buys, per direction.
    pub fn get_limits(&self, zero_for_one: bool) -> Result<(BigUint, BigUint), SimulationError> {
        let max_amount = I256::checked_from_sign_and_abs(Sign::Positive, U160_MAX).ok_or_else(
            || SimulationError::FatalError("max swap amount out of range".to_string()),
        )?;
        let results = self.swap(zero_for_one, max_amount, None)?;

        let (amount_in, amount_out) = if zero_for_one {
            (results.amount0, results.amount1)
        } else {
            (results.amount1, results.amount0)
        };
        Ok((
            u256_to_biguint(amount_in.unsigned_abs()),
            u256_to_biguint(amount_out.unsigned_abs()),
        ))
    }

    /// Returns a copy of this state with `update` applied. Rejects updates
    /// tagged with a different pool.
    pub fn apply_state_update(&self, update: &StateUpdate) -> Result<Self, TransitionError> {
        if update.pool_id != self.pool_id {
            return Err(TransitionError::StateMismatch {
                expected: self.pool_id.clone(),
                actual: update.pool_id.clone(),
            });
        }

        let mut new_state = self.clone();
        new_state.liquidity = update.liquidity;
        new_state.global_state = update.global_state;
        new_state.volume_per_liquidity_in_block = update.volume_per_liquidity_in_block;
        new_state
            .timepoints
            .insert_all(&update.timepoints);
        Ok(new_state)
    }

    fn swap(
        &self,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit: Option<U256>,
    ) -> Result<SwapResults, SimulationError> {
        let price_limit = match sqrt_price_limit {
            Some(limit) => limit,
            None => self.ticks.price_limit_bound(zero_for_one)?,
        };
        if zero_for_one {
            if price_limit >= self.global_state.price || price_limit < tick_math::MIN_SQRT_RATIO {
                return Err(SimulationError::InvalidInput(format!(
                    "price limit {price_limit} not below the current price"
                )));
            }
        } else if price_limit <= self.global_state.price || price_limit >= tick_math::MAX_SQRT_RATIO
        {
            return Err(SimulationError::InvalidInput(format!(
                "price limit {price_limit} not above the current price"
            )));
        }

        // one oracle observation per block, written before the trade moves
        // the price
        let mut timepoints = self.timepoints.clone();
        let mut timepoint_index = self.global_state.timepoint_index;
        let mut volume_per_liquidity_in_block = self.volume_per_liquidity_in_block;
        let mut fee = match &self.fee_config {
            FeeConfiguration::Fixed(fee) => *fee,
            FeeConfiguration::Dynamic(_) => self.global_state.fee as u32,
        };
        let mut written_timepoint = None;

        if let Some(new_index) = timepoints.write(
            timepoint_index,
            self.block_timestamp,
            self.global_state.tick,
            self.liquidity,
            volume_per_liquidity_in_block,
        )? {
            timepoint_index = new_index;
            volume_per_liquidity_in_block = U256::ZERO;
            written_timepoint = Some((new_index, timepoints.get(new_index)));

            if let FeeConfiguration::Dynamic(config) = &self.fee_config {
                let (volatility_avg, volume_avg) = timepoints.get_averages(
                    self.block_timestamp,
                    self.global_state.tick,
                    new_index,
                    self.liquidity,
                )?;
                fee = adaptive_fee::get_fee(
                    volatility_avg / U256::from(15u64),
                    volume_avg,
                    config,
                ) as u32;
            }
        }

        let exact_input = amount_specified > I256::ZERO;
        let mut state = SwapState {
            amount_remaining: amount_specified,
            amount_calculated: I256::ZERO,
            sqrt_price: self.global_state.price,
            tick: self.global_state.tick,
            liquidity: self.liquidity,
        };
        let mut total_fee_amount = U256::ZERO;

        while !state.amount_remaining.is_zero() && state.sqrt_price != price_limit {
            let (tick_next, initialized, liquidity_net) =
                match self.ticks.next_initialized(state.tick, zero_for_one) {
                    Some(info) => (info.index, true, info.liquidity_net),
                    None => {
                        if zero_for_one {
                            (tick_math::MIN_TICK, false, 0)
                        } else {
                            (tick_math::MAX_TICK, false, 0)
                        }
                    }
                };

            let sqrt_price_next = tick_math::get_sqrt_ratio_at_tick(tick_next)?;
            let (sqrt_price, amount_in, amount_out, fee_amount) = swap_math::compute_swap_step(
                state.sqrt_price,
                get_sqrt_ratio_target(sqrt_price_next, price_limit, zero_for_one),
                state.liquidity,
                state.amount_remaining,
                fee,
            )?;
            let step = StepComputation {
                sqrt_price_start: state.sqrt_price,
                tick_next,
                initialized,
                sqrt_price_next,
                amount_in,
                amount_out,
                fee_amount,
            };
            state.sqrt_price = sqrt_price;
            total_fee_amount = safe_add_u256(total_fee_amount, fee_amount)?;

            if exact_input {
                state.amount_remaining = safe_sub_i256(
                    state.amount_remaining,
                    i256_from_abs(safe_add_u256(step.amount_in, step.fee_amount)?)?,
                )?;
                state.amount_calculated =
                    safe_sub_i256(state.amount_calculated, i256_from_abs(step.amount_out)?)?;
            } else {
                state.amount_remaining =
                    safe_add_i256(state.amount_remaining, i256_from_abs(step.amount_out)?)?;
                state.amount_calculated = safe_add_i256(
                    state.amount_calculated,
                    i256_from_abs(safe_add_u256(step.amount_in, step.fee_amount)?)?,
                )?;
            }

            if state.sqrt_price == step.sqrt_price_next {
                if step.initialized {
                    let delta = if zero_for_one {
                        liquidity_net.checked_neg().ok_or_else(|| {
                            SimulationError::MathRangeError(
                                "net liquidity out of range".to_string(),
                            )
                        })?
                    } else {
                        liquidity_net
                    };
                    state.liquidity = liquidity_math::add_liquidity_delta(state.liquidity, delta)?;
                }
                // moving down lands just below the crossed tick; the lowest
                // representable price still maps to MIN_TICK itself
                state.tick = if zero_for_one {
                    (step.tick_next - 1).max(tick_math::MIN_TICK)
                } else {
                    step.tick_next
                };
            } else if state.sqrt_price != step.sqrt_price_start {
                state.tick = tick_math::get_tick_at_sqrt_ratio(state.sqrt_price)?;
            }

            trace!(
                tick = state.tick,
                sqrt_price = %state.sqrt_price,
                liquidity = state.liquidity,
                amount_remaining = %state.amount_remaining,
                "swap step"
            );
        }

        let (amount0, amount1) = if zero_for_one == exact_input {
            (
                safe_sub_i256(amount_specified, state.amount_remaining)?,
                state.amount_calculated,
            )
        } else {
            (
                state.amount_calculated,
                safe_sub_i256(amount_specified, state.amount_remaining)?,
            )
        };

        volume_per_liquidity_in_block = safe_add_u256(
            volume_per_liquidity_in_block,
            calculate_volume_per_liquidity(state.liquidity, amount0, amount1)?,
        )?;

        Ok(SwapResults {
            amount0,
            amount1,
            sqrt_price: state.sqrt_price,
            liquidity: state.liquidity,
            tick: state.tick,
            fee,
            fee_amount: total_fee_amount,
            timepoint_index,
            volume_per_liquidity_in_block,
            written_timepoint,
            price_limit_reached: !state.amount_remaining.is_zero() &&
                state.sqrt_price == price_limit,
        })
    }
}

fn i256_from_abs(value: U256) -> Result<I256, SimulationError> {
    I256::checked_from_sign_and_abs(Sign::Positive, value).ok_or_else(|| {
        SimulationError::MathRangeError("amount does not fit in 255 bits".to_string())
    })
}

/// Volume per liquidity contribution of one swap, Q64.64, capped so a
/// single trade cannot dominate the accumulator.
fn calculate_volume_per_liquidity(
    liquidity: u128,
    amount0: I256,
    amount1: I256,
) -> Result<U256, SimulationError> {
    let volume =
        safe_mul_u256(sqrt_u256(amount0.unsigned_abs()), sqrt_u256(amount1.unsigned_abs()))?;
    let denominator = U256::from(std::cmp::max(liquidity, 1));
    let shifted = if volume >= U256::from_limbs([0, 0, 0, 1]) {
        safe_div_u256(U256::MAX, denominator)?
    } else {
        safe_div_u256(volume << 64, denominator)?
    };
    Ok(std::cmp::min(shifted, MAX_VOLUME_PER_LIQUIDITY))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, str::FromStr};

    use approx::assert_relative_eq;
    use num_bigint::ToBigUint;
    use rstest::rstest;

    use super::*;
    use crate::protocol::algebra::adaptive_fee::AdaptiveFeeConfiguration;
    use crate::protocol::utils::tick_list::TickInfo;

    fn fixed_fee_pool(
        liquidity: u128,
        price: &str,
        fee: u16,
        tick: i32,
        ticks: Vec<TickInfo>,
    ) -> AlgebraPoolState {
        let block_timestamp = 1000u32;
        let timepoints = TimepointStorage::new(HashMap::from([(
            0u16,
            Timepoint {
                initialized: true,
                block_timestamp,
                average_tick: tick,
                ..Default::default()
            },
        )]));
        AlgebraPoolState::new(
            "test_pool".to_string(),
            liquidity,
            GlobalState {
                price: U256::from_str(price).unwrap(),
                tick,
                fee,
                timepoint_index: 0,
            },
            U256::ZERO,
            block_timestamp,
            TickList::from_ticks(10, ticks).unwrap(),
            timepoints,
            FeeConfiguration::Fixed(fee as u32),
        )
    }

    fn wbtc_weth_pool() -> AlgebraPoolState {
        // the nets of the snapshot window must balance; the far tick closes
        // the overhang and is never reached by these trades
        let overhang: i128 = 113223497437152033;
        fixed_fee_pool(
            377952820878029838,
            "28437325270877025820973479874632004",
            500,
            255830,
            vec![
                TickInfo::new(255760, 1759015528199933, 1759015528199933),
                TickInfo::new(255770, 6393138051835308, 6393138051835308),
                TickInfo::new(255780, 228206673808681, 228206673808681),
                TickInfo::new(255820, 1319490609195820, 1319490609195820),
                TickInfo::new(255830, 678916926147901, 678916926147901),
                TickInfo::new(255840, 12208947683433103, 12208947683433103),
                TickInfo::new(255850, 1177970713095301, 1177970713095301),
                TickInfo::new(255860, 8752304680520407, 8752304680520407),
                TickInfo::new(255880, 1486478248067104, 1486478248067104),
                TickInfo::new(255890, 1878744276123248, 1878744276123248),
                TickInfo::new(255900, 77340284046725227, 77340284046725227),
                TickInfo::new(887270, overhang as u128, -overhang),
            ],
        )
    }

    #[test]
    fn test_get_amount_out_full_range_liquidity() {
        let pool = fixed_fee_pool(
            8330443394424070888454257,
            "188562464004052255423565206602",
            3000,
            17342,
            vec![TickInfo::new(0, 1, 0), TickInfo::new(46080, 1, 0)],
        );
        let sell_amount = BigUint::from_str("11000000000000000000000").unwrap();
        let expected = BigUint::from_str("61927070842678722935941").unwrap();

        let res = pool
            .get_amount_out(sell_amount, true, None)
            .unwrap();

        assert_eq!(res.amount_out, expected);
        assert!(!res.price_limit_reached);
    }

    struct SwapTestCase {
        zero_for_one: bool,
        sell: BigUint,
        exp: BigUint,
    }

    #[test]
    fn test_get_amount_out() {
        let pool = wbtc_weth_pool();
        let cases = vec![
            SwapTestCase {
                zero_for_one: true,
                sell: 500000000u64.to_biguint().unwrap(),
                exp: BigUint::from_str("64352395915550406461").unwrap(),
            },
            SwapTestCase {
                zero_for_one: true,
                sell: 550000000u64.to_biguint().unwrap(),
                exp: BigUint::from_str("70784271504035662865").unwrap(),
            },
            SwapTestCase {
                zero_for_one: true,
                sell: 600000000u64.to_biguint().unwrap(),
                exp: BigUint::from_str("77215534856185613494").unwrap(),
            },
            SwapTestCase {
                zero_for_one: true,
                sell: 1000000000u64.to_biguint().unwrap(),
                exp: BigUint::from_str("128643569649663616249").unwrap(),
            },
            SwapTestCase {
                zero_for_one: true,
                sell: 3000000000u64.to_biguint().unwrap(),
                exp: BigUint::from_str("385196519076234662939").unwrap(),
            },
            SwapTestCase {
                zero_for_one: false,
                sell: BigUint::from_str("64000000000000000000").unwrap(),
                exp: BigUint::from_str("496294784").unwrap(),
            },
            SwapTestCase {
                zero_for_one: false,
                sell: BigUint::from_str("70000000000000000000").unwrap(),
                exp: BigUint::from_str("542798479").unwrap(),
            },
            SwapTestCase {
                zero_for_one: false,
                sell: BigUint::from_str("77000000000000000000").unwrap(),
                exp: BigUint::from_str("597047757").unwrap(),
            },
            SwapTestCase {
                zero_for_one: false,
                sell: BigUint::from_str("128000000000000000000").unwrap(),
                exp: BigUint::from_str("992129037").unwrap(),
            },
            SwapTestCase {
                zero_for_one: false,
                sell: BigUint::from_str("385000000000000000000").unwrap(),
                exp: BigUint::from_str("2978713582").unwrap(),
            },
        ];

        for case in cases {
            let res = pool
                .get_amount_out(case.sell.clone(), case.zero_for_one, None)
                .unwrap();
            assert_eq!(res.amount_out, case.exp);
            assert!(res.fee_amount > BigUint::zero());
        }
    }

    #[test]
    fn test_get_amount_out_is_monotone() {
        let pool = wbtc_weth_pool();
        let mut previous = BigUint::zero();
        for sell in [100000000u64, 200000000, 400000000, 800000000] {
            let res = pool
                .get_amount_out(sell.to_biguint().unwrap(), true, None)
                .unwrap();
            assert!(res.amount_out > previous);
            previous = res.amount_out;
        }
    }

    #[test]
    fn test_get_amount_out_is_deterministic() {
        let pool = wbtc_weth_pool();
        let first = pool
            .get_amount_out(500000000u64.to_biguint().unwrap(), true, None)
            .unwrap();
        let second = pool
            .get_amount_out(500000000u64.to_biguint().unwrap(), true, None)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_amount_in_is_identity() {
        let pool = wbtc_weth_pool();
        let res = pool
            .get_amount_out(BigUint::zero(), true, None)
            .unwrap();
        assert_eq!(res.amount_out, BigUint::zero());
        assert_eq!(res.fee_amount, BigUint::zero());
        assert!(!res.price_limit_reached);
        assert_eq!(res.state_update.global_state, pool.global_state);
        assert_eq!(res.state_update.liquidity, pool.liquidity);
        assert!(res.state_update.timepoints.is_empty());
    }

    #[test]
    fn test_partial_fill_reports_price_limit() {
        let pool = wbtc_weth_pool();
        // far more WBTC than the listed ticks can absorb
        let res = pool
            .get_amount_out(BigUint::from_str("100000000000000").unwrap(), true, None)
            .unwrap();
        assert!(res.price_limit_reached);
        assert!(res.amount_out > BigUint::zero());
        assert_eq!(
            res.state_update.global_state.price,
            tick_math::get_sqrt_ratio_at_tick(255760).unwrap()
        );
    }

    fn boundary_pool() -> AlgebraPoolState {
        fixed_fee_pool(
            0,
            "79228162514264337593543950336",
            3000,
            0,
            vec![TickInfo::new(-200, 10, -10), TickInfo::new(200, 10, 10)],
        )
    }

    #[test]
    fn test_no_liquidity_for_trade() {
        let pool = boundary_pool();
        let res = pool.get_amount_out(1000000u64.to_biguint().unwrap(), true, None);
        assert!(matches!(res, Err(SimulationError::NoLiquidityForTrade(_))));
    }

    #[rstest]
    #[case(true, -200)]
    #[case(false, 200)]
    fn test_empty_range_walks_to_boundary(#[case] zero_for_one: bool, #[case] boundary: i32) {
        let pool = boundary_pool();
        let amount = I256::unchecked_from(1_000_000i64);
        let res = pool
            .swap(zero_for_one, amount, None)
            .unwrap();

        // the boundary tick is crossed with no amounts exchanged, liquidity
        // outside the empty range becomes active
        assert_eq!(res.sqrt_price, tick_math::get_sqrt_ratio_at_tick(boundary).unwrap());
        assert_eq!(res.liquidity, 10);
        assert!(res.price_limit_reached);
        assert_eq!(res.amount0, I256::ZERO);
        assert_eq!(res.amount1, I256::ZERO);
    }

    #[test]
    fn test_caller_price_limit_stops_the_swap() {
        let pool = wbtc_weth_pool();
        let limit = tick_math::get_sqrt_ratio_at_tick(255820).unwrap();
        let res = pool
            .get_amount_out(BigUint::from_str("100000000000000").unwrap(), true, Some(limit))
            .unwrap();

        assert!(res.price_limit_reached);
        assert_eq!(res.state_update.global_state.price, limit);
        // tighter limit, smaller fill
        let unbounded = pool
            .get_amount_out(BigUint::from_str("100000000000000").unwrap(), true, None)
            .unwrap();
        assert!(res.amount_out < unbounded.amount_out);
    }

    #[test]
    fn test_swap_to_lowest_tick_keeps_tick_in_range() {
        let pool = fixed_fee_pool(
            0,
            "79228162514264337593543950336",
            3000,
            0,
            vec![TickInfo::new(tick_math::MIN_TICK, 10, -10), TickInfo::new(200, 10, 10)],
        );
        let res = pool
            .swap(true, I256::unchecked_from(1_000_000i64), None)
            .unwrap();

        assert_eq!(res.sqrt_price, tick_math::MIN_SQRT_RATIO);
        assert_eq!(res.tick, tick_math::MIN_TICK);
        assert!(res.price_limit_reached);
    }

    #[test]
    fn test_caller_limit_beyond_listed_ticks() {
        let pool = wbtc_weth_pool();
        // below the lowest initialized tick: after the last crossing the
        // walk keeps stepping on the remaining liquidity down to the limit
        let limit = tick_math::get_sqrt_ratio_at_tick(255000).unwrap();
        let res = pool.swap(true, I256::exp10(18), Some(limit)).unwrap();

        assert_eq!(res.sqrt_price, limit);
        assert_eq!(res.tick, 255000);
        assert!(res.price_limit_reached);
        assert!(res.liquidity > 0 && res.liquidity < pool.liquidity);
        assert!(res.amount0 > I256::ZERO);
        assert!(res.amount1 < I256::ZERO);
    }

    #[test]
    fn test_swap_rejects_bad_price_limit() {
        let pool = wbtc_weth_pool();
        let above = pool.global_state.price + U256::from(1u64);
        let res = pool.swap(true, I256::unchecked_from(1000), Some(above));
        assert!(matches!(res, Err(SimulationError::InvalidInput(_))));
    }

    #[test]
    fn test_spot_price() {
        let tick = 17342;
        let price = tick_math::get_sqrt_ratio_at_tick(tick).unwrap();
        let pool = fixed_fee_pool(
            8330443394424070888454257,
            &price.to_string(),
            3000,
            tick,
            vec![TickInfo::new(0, 1, 0), TickInfo::new(46080, 1, 0)],
        );
        // (sqrt_price / 2^96)^2 ~ 1.0001^tick
        assert_relative_eq!(pool.spot_price().unwrap(), 1.0001f64.powi(tick), max_relative = 1e-6);
    }

    #[test]
    fn test_get_limits() {
        let pool = wbtc_weth_pool();
        let (max_in, max_out) = pool.get_limits(true).unwrap();
        assert!(max_in > BigUint::zero());
        assert!(max_out > BigUint::zero());

        // the largest quote is reachable through get_amount_out as well
        let res = pool
            .get_amount_out(max_in.clone(), true, None)
            .unwrap();
        assert_eq!(res.amount_out, max_out);
    }

    #[test]
    fn test_apply_state_update() {
        let pool = wbtc_weth_pool();
        let res = pool
            .get_amount_out(500000000u64.to_biguint().unwrap(), true, None)
            .unwrap();

        let updated = pool
            .apply_state_update(&res.state_update)
            .unwrap();
        assert_eq!(updated.liquidity, res.state_update.liquidity);
        assert_eq!(updated.global_state, res.state_update.global_state);
        // ticks and fee configuration are untouched
        assert_eq!(updated.ticks, pool.ticks);
        assert_eq!(updated.fee_config, pool.fee_config);

        // applying the same update twice settles on the same state
        let twice = updated
            .apply_state_update(&res.state_update)
            .unwrap();
        assert_eq!(twice, updated);
    }

    #[test]
    fn test_apply_state_update_rejects_other_pool() {
        let pool = wbtc_weth_pool();
        let res = pool
            .get_amount_out(500000000u64.to_biguint().unwrap(), true, None)
            .unwrap();
        let mut update = res.state_update;
        update.pool_id = "another_pool".to_string();

        let err = pool.apply_state_update(&update).unwrap_err();
        assert!(matches!(err, TransitionError::StateMismatch { .. }));
    }

    #[test]
    fn test_chained_swaps_match_one_swap() {
        let pool = wbtc_weth_pool();
        let first = pool
            .get_amount_out(250000000u64.to_biguint().unwrap(), true, None)
            .unwrap();
        let intermediate = pool
            .apply_state_update(&first.state_update)
            .unwrap();
        let second = intermediate
            .get_amount_out(250000000u64.to_biguint().unwrap(), true, None)
            .unwrap();
        let combined = pool
            .get_amount_out(500000000u64.to_biguint().unwrap(), true, None)
            .unwrap();

        // two half trades cannot beat one full trade
        let chained = first.amount_out + second.amount_out;
        assert!(chained <= combined.amount_out);
        // and stay within a few wei of it
        assert!(&combined.amount_out - &chained < BigUint::from_str("1000000").unwrap());
    }

    fn dynamic_fee_pool() -> AlgebraPoolState {
        let config = AdaptiveFeeConfiguration {
            alpha1: 2900,
            alpha2: 15000,
            beta1: 360,
            beta2: 60000,
            gamma1: 59,
            gamma2: 8500,
            volume_beta: 0,
            volume_gamma: 10,
            base_fee: 100,
        };
        let mut pool = wbtc_weth_pool();
        pool.fee_config = FeeConfiguration::Dynamic(config);
        // the previous observation is one block behind, so the swap writes a
        // fresh timepoint and refreshes the fee
        pool.timepoints = TimepointStorage::new(HashMap::from([(
            0u16,
            Timepoint {
                initialized: true,
                block_timestamp: 988,
                average_tick: pool.global_state.tick,
                ..Default::default()
            },
        )]));
        pool
    }

    #[test]
    fn test_dynamic_fee_refreshes_on_new_block() {
        let pool = dynamic_fee_pool();
        let res = pool
            .get_amount_out(500000000u64.to_biguint().unwrap(), true, None)
            .unwrap();

        let update = res.state_update;
        assert_eq!(update.global_state.timepoint_index, 1);
        assert_eq!(update.timepoints.len(), 1);
        assert_eq!(update.timepoints[0].0, 1);
        // the tick never moved away from its average, volatility is zero and
        // the fee settles at the base rate
        assert_eq!(update.global_state.fee, 100);
    }

    #[test]
    fn test_same_block_swap_coalesces_timepoint() {
        let pool = dynamic_fee_pool();
        let res = pool
            .get_amount_out(500000000u64.to_biguint().unwrap(), true, None)
            .unwrap();
        let next = pool.apply_state_update(&res.state_update).unwrap();

        let second = next
            .get_amount_out(500000000u64.to_biguint().unwrap(), true, None)
            .unwrap();
        // same timestamp, no new observation, volume keeps accumulating
        assert!(second.state_update.timepoints.is_empty());
        assert_eq!(second.state_update.global_state.timepoint_index, 1);
        assert!(
            second.state_update.volume_per_liquidity_in_block >
                res.state_update.volume_per_liquidity_in_block
        );
    }

    #[test]
    fn test_volume_per_liquidity_is_capped() {
        let amount = I256::from_raw(U256::from(10u64).pow(U256::from(30)));
        let vpl = calculate_volume_per_liquidity(1, amount, amount).unwrap();
        assert_eq!(vpl, U256::from_limbs([0, 100_000, 0, 0]));
    }
}
