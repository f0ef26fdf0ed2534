//! Off-chain swap simulation for Algebra-style concentrated liquidity pools.
//!
//! The crate reproduces, bit-exactly, the outcome of a swap against a pool
//! snapshot: the Q64.96 sqrt-price tick walk, the adaptive (volatility and
//! volume driven) fee, and the oracle timepoint cadence. A simulation never
//! mutates the pool it runs against; it returns the traded amounts together
//! with a [`protocol::algebra::state::StateUpdate`] that the owning caller
//! may commit through a pure state transition.
//!
//! # Example
//!
//! ```no_run
//! use algebra_simulation::{AlgebraPoolState, PoolSnapshot};
//! use num_bigint::BigUint;
//!
//! # let raw = "{}";
//! let snapshot: PoolSnapshot = serde_json::from_str(raw).unwrap();
//! let pool = AlgebraPoolState::try_from(snapshot).unwrap();
//! let res = pool
//!     .get_amount_out(BigUint::from(1_000_000u64), true, None)
//!     .unwrap();
//! let committed = pool.apply_state_update(&res.state_update).unwrap();
//! ```

pub mod protocol;

pub use protocol::{
    algebra::{
        adaptive_fee::{AdaptiveFeeConfiguration, FeeConfiguration},
        snapshot::PoolSnapshot,
        state::{AlgebraPoolState, GetAmountOutResult, GlobalState, StateUpdate},
        timepoints::{Timepoint, TimepointStorage},
    },
    errors::{SimulationError, TransitionError},
};
