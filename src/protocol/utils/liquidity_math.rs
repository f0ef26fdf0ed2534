use crate::protocol::errors::SimulationError;

/// Applies a signed liquidity change, erroring on overflow or on a removal
/// larger than the current amount.
pub(crate) fn add_liquidity_delta(liquidity: u128, delta: i128) -> Result<u128, SimulationError> {
    if delta >= 0 {
        liquidity
            .checked_add(delta as u128)
            .ok_or_else(|| SimulationError::MathRangeError("liquidity overflow".to_string()))
    } else {
        liquidity
            .checked_sub(delta.unsigned_abs())
            .ok_or_else(|| SimulationError::MathRangeError("liquidity underflow".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_liquidity_delta() {
        assert_eq!(add_liquidity_delta(100, 50).unwrap(), 150);
        assert_eq!(add_liquidity_delta(100, -50).unwrap(), 50);
        assert_eq!(add_liquidity_delta(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_add_liquidity_delta_out_of_range() {
        assert!(add_liquidity_delta(u128::MAX, 1).is_err());
        assert!(add_liquidity_delta(10, -11).is_err());
    }
}
