use thiserror::Error;

/// Errors surfaced while constructing a pool from a snapshot or while
/// simulating a swap against it.
///
/// Unfillable trades and malformed snapshots are ordinary, explicitly
/// modeled outcomes; only `FatalError` signals a broken internal invariant
/// (e.g. an arithmetic overflow that the reference protocol proves cannot
/// happen on valid state).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// The snapshot has no initialized ticks left after filtering; the pool
    /// cannot be swapped against.
    #[error("Missing tick data: {0}")]
    MissingTickData(String),
    /// The snapshot lacks a usable current price or tick.
    #[error("Invalid global state: {0}")]
    InvalidGlobalState(String),
    /// A price or tick conversion fell outside the representable range.
    #[error("Math range error: {0}")]
    MathRangeError(String),
    /// The swap loop terminated with zero output: unfillable at this size.
    #[error("No liquidity for trade: {0}")]
    NoLiquidityForTrade(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Fatal simulation error: {0}")]
    FatalError(String),
}

/// Errors raised when committing a [`StateUpdate`] to a pool.
///
/// [`StateUpdate`]: crate::protocol::algebra::state::StateUpdate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The update was produced by a different pool instance. Commits are
    /// tagged and validated; a mismatch is a hard rejection.
    #[error("State update for pool {actual} cannot be applied to pool {expected}")]
    StateMismatch { expected: String, actual: String },
}
