//! Raw pool snapshots as delivered by an indexer, and their conversion
//! into a simulatable state.

use std::collections::HashMap;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::{
    adaptive_fee::{AdaptiveFeeConfiguration, FeeConfiguration},
    state::{AlgebraPoolState, GlobalState},
    timepoints::{Timepoint, TimepointStorage},
};
use crate::protocol::{
    errors::SimulationError,
    utils::tick_list::{TickInfo, TickList},
};

/// Global state as indexed, before validation. A pool that was never
/// initialized on chain carries no tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStateSnapshot {
    pub price: U256,
    pub tick: Option<i32>,
    pub fee: u16,
    pub timepoint_index: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub index: i32,
    pub liquidity_gross: u128,
    pub liquidity_net: i128,
}

/// Everything needed to reconstruct one pool at a fixed block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub pool_id: String,
    pub global_state: GlobalStateSnapshot,
    pub liquidity: u128,
    pub volume_per_liquidity_in_block: U256,
    pub tick_spacing: u16,
    pub block_timestamp: u32,
    pub ticks: Vec<TickSnapshot>,
    pub timepoints: HashMap<u16, Timepoint>,
    /// Present on pools running the adaptive fee, absent on fixed fee forks.
    pub fee_config: Option<AdaptiveFeeConfiguration>,
}

impl TryFrom<PoolSnapshot> for AlgebraPoolState {
    type Error = SimulationError;

    fn try_from(snapshot: PoolSnapshot) -> Result<Self, Self::Error> {
        let tick = snapshot.global_state.tick.ok_or_else(|| {
            SimulationError::InvalidGlobalState(format!(
                "pool {} was never initialized",
                snapshot.pool_id
            ))
        })?;
        if snapshot.global_state.price.is_zero() {
            return Err(SimulationError::InvalidGlobalState(format!(
                "pool {} has a zero price",
                snapshot.pool_id
            )));
        }

        // ticks whose positions were fully withdrawn stay indexed with a
        // zero gross, they no longer exist for the swap path
        let ticks: Vec<TickInfo> = snapshot
            .ticks
            .into_iter()
            .filter(|t| t.liquidity_gross != 0)
            .map(|t| TickInfo::new(t.index, t.liquidity_gross, t.liquidity_net))
            .collect();
        let ticks = TickList::from_ticks(snapshot.tick_spacing, ticks)?;

        let fee_config = match snapshot.fee_config {
            Some(config) => {
                config.validate()?;
                FeeConfiguration::Dynamic(config)
            }
            None => FeeConfiguration::Fixed(snapshot.global_state.fee as u32),
        };

        Ok(AlgebraPoolState::new(
            snapshot.pool_id,
            snapshot.liquidity,
            GlobalState {
                price: snapshot.global_state.price,
                tick,
                fee: snapshot.global_state.fee,
                timepoint_index: snapshot.global_state.timepoint_index,
            },
            snapshot.volume_per_liquidity_in_block,
            snapshot.block_timestamp,
            ticks,
            TimepointStorage::new(snapshot.timepoints),
            fee_config,
        ))
    }
}
