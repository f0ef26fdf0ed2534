//! Circular oracle storage of cumulative observations.
//!
//! Up to 65536 timepoints live in a ring indexed by `u16`; each entry stores
//! running totals of tick, seconds per liquidity, tick volatility and volume
//! per liquidity since pool creation. Timestamps are `u32` seconds and
//! compare through overflow-aware ordering, so the ring stays consistent
//! across the 2^32 wrap. Cumulative adds wrap on purpose, only differences
//! between timepoints are meaningful.

use std::collections::HashMap;

use alloy::primitives::{I256, U256};
use serde::{Deserialize, Serialize};

use crate::protocol::{errors::SimulationError, safe_math::safe_sub_u256};

/// Averaging window of the volatility oracle, in seconds.
pub const WINDOW: u32 = 86400;

/// One oracle observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timepoint {
    pub initialized: bool,
    pub block_timestamp: u32,
    pub tick_cumulative: i64,
    pub seconds_per_liquidity_cumulative: U256,
    pub volatility_cumulative: U256,
    pub average_tick: i32,
    pub volume_per_liquidity_cumulative: U256,
}

/// Sparse view of the oracle ring. Slots never observed read as the zero
/// timepoint, matching the uninitialized storage of the reference contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimepointStorage {
    timepoints: HashMap<u16, Timepoint>,
}

impl TimepointStorage {
    pub fn new(timepoints: HashMap<u16, Timepoint>) -> Self {
        TimepointStorage { timepoints }
    }

    pub fn get(&self, index: u16) -> Timepoint {
        self.timepoints
            .get(&index)
            .copied()
            .unwrap_or_default()
    }

    fn set(&mut self, index: u16, timepoint: Timepoint) {
        self.timepoints.insert(index, timepoint);
    }

    pub fn insert_all(&mut self, entries: &[(u16, Timepoint)]) {
        for (index, timepoint) in entries {
            self.timepoints.insert(*index, *timepoint);
        }
    }

    /// Whether `a <= b` when both are timestamps at or before `current_time`,
    /// allowing for one 2^32 overflow between them.
    fn lte_considering_overflow(a: u32, b: u32, current_time: u32) -> bool {
        let a_wrapped = a > current_time;
        if a_wrapped == (b > current_time) {
            a <= b
        } else {
            a_wrapped
        }
    }

    /// Interpolated volatility accumulated over `dt` seconds while the tick
    /// moved linearly from `tick0` to `tick1` and the average moved from
    /// `avg_tick0` to `avg_tick1`.
    fn volatility_on_range(dt: i64, tick0: i32, tick1: i32, avg_tick0: i32, avg_tick1: i32) -> U256 {
        // sum of squared deviations of a linear tick path from a linear
        // average path, in closed form
        let dt = I256::unchecked_from(dt);
        let k = I256::unchecked_from(tick1 as i64 - tick0 as i64) -
            I256::unchecked_from(avg_tick1 as i64 - avg_tick0 as i64);
        let b = I256::unchecked_from(tick0 as i64 - avg_tick0 as i64) * dt;
        let two = I256::unchecked_from(2);
        let sum_of_squares = dt * (dt + I256::ONE) * (two * dt + I256::ONE);
        let sum_of_sequence = dt * (dt + I256::ONE);

        let six = I256::unchecked_from(6);
        let volatility =
            (k * k * sum_of_squares + six * b * k * sum_of_sequence + six * dt * b * b) /
                (six * dt * dt);
        volatility.into_raw()
    }

    fn create_new_timepoint(
        last: &Timepoint,
        block_timestamp: u32,
        tick: i32,
        prev_tick: i32,
        liquidity: u128,
        average_tick: i32,
        volume_per_liquidity: U256,
    ) -> Timepoint {
        let delta = block_timestamp.wrapping_sub(last.block_timestamp);

        Timepoint {
            initialized: true,
            block_timestamp,
            tick_cumulative: last
                .tick_cumulative
                .wrapping_add(tick as i64 * delta as i64),
            seconds_per_liquidity_cumulative: last
                .seconds_per_liquidity_cumulative
                .wrapping_add(
                    (U256::from(delta) << 128) / U256::from(std::cmp::max(liquidity, 1)),
                ),
            volatility_cumulative: last.volatility_cumulative.wrapping_add(
                Self::volatility_on_range(
                    delta as i64,
                    prev_tick,
                    tick,
                    last.average_tick,
                    average_tick,
                ),
            ),
            average_tick,
            volume_per_liquidity_cumulative: last
                .volume_per_liquidity_cumulative
                .wrapping_add(volume_per_liquidity),
        }
    }

    /// Average tick over the trailing window ending at `time`, derived from
    /// stored cumulatives.
    fn get_average_tick(
        &self,
        time: u32,
        tick: i32,
        index: u16,
        oldest_index: u16,
        last_timestamp: u32,
        last_tick_cumulative: i64,
    ) -> Result<i64, SimulationError> {
        let oldest = self.get(oldest_index);
        let oldest_timestamp = oldest.block_timestamp;
        let oldest_tick_cumulative = oldest.tick_cumulative;

        let window_start = time.wrapping_sub(WINDOW);
        if Self::lte_considering_overflow(oldest_timestamp, window_start, time) {
            if Self::lte_considering_overflow(last_timestamp, window_start, time) {
                let index = index.wrapping_sub(1);
                let before_last = self.get(index);
                if before_last.initialized {
                    let delta = last_timestamp.wrapping_sub(before_last.block_timestamp);
                    Ok((last_tick_cumulative - before_last.tick_cumulative) / delta as i64)
                } else {
                    Ok(tick as i64)
                }
            } else {
                let start_of_window =
                    self.get_single_timepoint(time, WINDOW, tick, index, oldest_index, 0)?;
                let delta = last_timestamp.wrapping_sub(window_start);
                Ok((last_tick_cumulative - start_of_window.tick_cumulative) / delta as i64)
            }
        } else if last_timestamp != oldest_timestamp {
            let delta = last_timestamp.wrapping_sub(oldest_timestamp);
            Ok((last_tick_cumulative - oldest_tick_cumulative) / delta as i64)
        } else {
            Ok(tick as i64)
        }
    }

    /// Finds the stored timepoints straddling `target` by binary search over
    /// the ring, skipping slots that were never written.
    fn binary_search(
        &self,
        time: u32,
        target: u32,
        last_index: u16,
        oldest_index: u16,
    ) -> (Timepoint, Timepoint) {
        let mut left = oldest_index as u32;
        // one lap of the ring when the search range wraps
        let mut right = if oldest_index <= last_index {
            last_index as u32
        } else {
            last_index as u32 + 65536
        };

        let mut before_or_at;
        let mut at_or_after;

        loop {
            let current = (left + right) >> 1;
            before_or_at = self.get(current as u16);
            if !before_or_at.initialized {
                left = current + 1;
                continue;
            }

            let before_ts = before_or_at.block_timestamp;
            if Self::lte_considering_overflow(before_ts, target, time) {
                at_or_after = self.get(current.wrapping_add(1) as u16);
                if Self::lte_considering_overflow(target, at_or_after.block_timestamp, time) {
                    return (before_or_at, at_or_after);
                }
                left = current + 1;
            } else {
                at_or_after = before_or_at;
                right = current.saturating_sub(1);
            }

            if left > right {
                return (before_or_at, at_or_after);
            }
        }
    }

    /// Reconstructs the cumulative state `seconds_ago` before `time`, either
    /// from a stored timepoint, by extrapolating past the newest one, or by
    /// linear interpolation between the two straddling ones.
    pub fn get_single_timepoint(
        &self,
        time: u32,
        seconds_ago: u32,
        tick: i32,
        index: u16,
        oldest_index: u16,
        liquidity: u128,
    ) -> Result<Timepoint, SimulationError> {
        let target = time.wrapping_sub(seconds_ago);

        let last = self.get(index);
        if seconds_ago == 0 ||
            Self::lte_considering_overflow(last.block_timestamp, target, time)
        {
            if last.block_timestamp == target {
                return Ok(last);
            }
            // extrapolate from the newest stored timepoint
            let avg_tick = self.get_average_tick(
                target,
                tick,
                index,
                oldest_index,
                last.block_timestamp,
                last.tick_cumulative,
            )? as i32;
            let prev_tick = if index != oldest_index {
                let prev = self.get(index.wrapping_sub(1));
                let delta = last.block_timestamp.wrapping_sub(prev.block_timestamp);
                ((last.tick_cumulative - prev.tick_cumulative) / delta as i64) as i32
            } else {
                tick
            };
            return Ok(Self::create_new_timepoint(
                &last,
                target,
                tick,
                prev_tick,
                liquidity,
                avg_tick,
                U256::ZERO,
            ));
        }

        let oldest = self.get(oldest_index);
        if !Self::lte_considering_overflow(oldest.block_timestamp, target, time) {
            return Err(SimulationError::InvalidInput(
                "requested timepoint predates the oracle history".to_string(),
            ));
        }

        let (before_or_at, at_or_after) = self.binary_search(time, target, index, oldest_index);

        if at_or_after.block_timestamp == target {
            return Ok(at_or_after);
        }
        if before_or_at.block_timestamp == target {
            return Ok(before_or_at);
        }

        let timepoint_time_delta =
            at_or_after.block_timestamp.wrapping_sub(before_or_at.block_timestamp) as i64;
        let target_delta = target.wrapping_sub(before_or_at.block_timestamp) as i64;

        let mut result = before_or_at;
        result.tick_cumulative += (at_or_after.tick_cumulative - before_or_at.tick_cumulative) /
            timepoint_time_delta *
            target_delta;
        result.seconds_per_liquidity_cumulative += (at_or_after
            .seconds_per_liquidity_cumulative -
            before_or_at.seconds_per_liquidity_cumulative) *
            U256::from(target_delta as u64) /
            U256::from(timepoint_time_delta as u64);
        result.volatility_cumulative += (at_or_after.volatility_cumulative -
            before_or_at.volatility_cumulative) *
            U256::from(target_delta as u64) /
            U256::from(timepoint_time_delta as u64);
        result.volume_per_liquidity_cumulative += (at_or_after.volume_per_liquidity_cumulative -
            before_or_at.volume_per_liquidity_cumulative) *
            U256::from(target_delta as u64) /
            U256::from(timepoint_time_delta as u64);
        Ok(result)
    }

    /// Average volatility and volume per liquidity over the trailing window.
    pub fn get_averages(
        &self,
        time: u32,
        tick: i32,
        index: u16,
        liquidity: u128,
    ) -> Result<(U256, U256), SimulationError> {
        let next_slot = self.get(index.wrapping_add(1));
        let oldest_index = if next_slot.initialized { index.wrapping_add(1) } else { 0 };
        let oldest = self.get(oldest_index);

        let end_of_window = self.get_single_timepoint(time, 0, tick, index, oldest_index, liquidity)?;

        let window_start = time.wrapping_sub(WINDOW);
        if Self::lte_considering_overflow(oldest.block_timestamp, window_start, time) {
            let start_of_window =
                self.get_single_timepoint(time, WINDOW, tick, index, oldest_index, liquidity)?;
            Ok((
                safe_sub_u256(
                    end_of_window.volatility_cumulative,
                    start_of_window.volatility_cumulative,
                )? / U256::from(WINDOW),
                safe_sub_u256(
                    end_of_window.volume_per_liquidity_cumulative,
                    start_of_window.volume_per_liquidity_cumulative,
                )? >> 57,
            ))
        } else if time != oldest.block_timestamp {
            let elapsed = time.wrapping_sub(oldest.block_timestamp);
            Ok((
                safe_sub_u256(
                    end_of_window.volatility_cumulative,
                    oldest.volatility_cumulative,
                )? / U256::from(elapsed),
                safe_sub_u256(
                    end_of_window.volume_per_liquidity_cumulative,
                    oldest.volume_per_liquidity_cumulative,
                )? >> 57,
            ))
        } else {
            Ok((U256::ZERO, U256::ZERO))
        }
    }

    /// Records an observation for the current block. At most one timepoint
    /// is stored per timestamp, a repeated call within the same block is a
    /// no-op. Returns the updated ring index when a new entry was written.
    pub fn write(
        &mut self,
        index: u16,
        block_timestamp: u32,
        tick: i32,
        liquidity: u128,
        volume_per_liquidity: U256,
    ) -> Result<Option<u16>, SimulationError> {
        let last = self.get(index);
        if last.block_timestamp == block_timestamp {
            return Ok(None);
        }

        let index_updated = index.wrapping_add(1);
        let oldest_index = if self.get(index_updated).initialized { index_updated } else { 0 };

        let avg_tick = self.get_average_tick(
            block_timestamp,
            tick,
            index,
            oldest_index,
            last.block_timestamp,
            last.tick_cumulative,
        )? as i32;
        let prev_tick = if index != oldest_index {
            let prev = self.get(index.wrapping_sub(1));
            let delta = last.block_timestamp.wrapping_sub(prev.block_timestamp);
            ((last.tick_cumulative - prev.tick_cumulative) / delta as i64) as i32
        } else {
            tick
        };

        let timepoint = Self::create_new_timepoint(
            &last,
            block_timestamp,
            tick,
            prev_tick,
            liquidity,
            avg_tick,
            volume_per_liquidity,
        );
        self.set(index_updated, timepoint);
        Ok(Some(index_updated))
    }
}
