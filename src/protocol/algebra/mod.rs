//! Algebra V1 concentrated liquidity pool simulation.

pub mod adaptive_fee;
pub mod snapshot;
pub mod state;
pub mod timepoints;
