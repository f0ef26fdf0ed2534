//! Sorted tick array with binary-search lookups.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::tick_math;
use crate::protocol::errors::SimulationError;

/// Liquidity bookkeeping at one initialized tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInfo {
    pub index: i32,
    /// Total position liquidity referencing this tick.
    pub liquidity_gross: u128,
    /// Liquidity added when the tick is crossed left to right.
    pub liquidity_net: i128,
}

impl TickInfo {
    pub fn new(index: i32, liquidity_gross: u128, liquidity_net: i128) -> Self {
        TickInfo { index, liquidity_gross, liquidity_net }
    }
}

/// All initialized ticks of a pool, kept sorted by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickList {
    tick_spacing: u16,
    ticks: Vec<TickInfo>,
}

impl TickList {
    /// Builds the list from unordered tick data.
    ///
    /// The set must be non-empty, free of duplicate indices, and its net
    /// liquidity changes must sum to zero; liquidity entering below the
    /// current price always leaves again above it.
    pub fn from_ticks(tick_spacing: u16, mut ticks: Vec<TickInfo>) -> Result<Self, SimulationError> {
        if ticks.is_empty() {
            return Err(SimulationError::MissingTickData(
                "pool has no initialized ticks".to_string(),
            ));
        }

        ticks.sort_by_key(|t| t.index);

        for pair in ticks.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(SimulationError::InvalidInput(format!(
                    "duplicate tick index {}",
                    pair[0].index
                )));
            }
        }

        let net_sum: i128 = ticks.iter().map(|t| t.liquidity_net).sum();
        if net_sum != 0 {
            return Err(SimulationError::InvalidInput(format!(
                "net liquidity changes sum to {net_sum}, expected 0"
            )));
        }

        Ok(TickList { tick_spacing, ticks })
    }

    pub fn tick_spacing(&self) -> u16 {
        self.tick_spacing
    }

    pub fn ticks(&self) -> &[TickInfo] {
        &self.ticks
    }

    pub fn min_tick(&self) -> i32 {
        // from_ticks guarantees at least one entry
        self.ticks[0].index
    }

    pub fn max_tick(&self) -> i32 {
        self.ticks[self.ticks.len() - 1].index
    }

    /// Next initialized tick in trade direction: at or below `tick` when
    /// selling token0, strictly above it otherwise. `None` past the last
    /// initialized tick.
    pub fn next_initialized(&self, tick: i32, zero_for_one: bool) -> Option<&TickInfo> {
        let idx = self.ticks.partition_point(|t| t.index <= tick);
        if zero_for_one {
            idx.checked_sub(1).map(|i| &self.ticks[i])
        } else {
            self.ticks.get(idx)
        }
    }

    /// Sqrt price at the outermost initialized tick in trade direction, used
    /// as the default swap price limit.
    pub fn price_limit_bound(&self, zero_for_one: bool) -> Result<U256, SimulationError> {
        let tick = if zero_for_one { self.min_tick() } else { self.max_tick() };
        tick_math::get_sqrt_ratio_at_tick(tick)
    }
}
