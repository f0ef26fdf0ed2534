//! Numeric conversions for the U256 type.

use alloy::primitives::U256;
use num_bigint::BigUint;

use crate::protocol::errors::SimulationError;

/// Converts a U256 into its closest `f64` representation.
///
/// The significand is truncated to 53 bits with round-to-nearest-even:
/// the bit after the cut decides the direction, any set bit below it forces
/// a round up, and exact ties round towards the value with an even least
/// significant bit.
pub fn u256_to_f64(x: U256) -> Result<f64, SimulationError> {
    if x.is_zero() {
        return Ok(0.0);
    }

    let x_bits = x.bit_len();
    let n_shifts = 53i32 - x_bits as i32;
    let mut exponent = (1023 + 52 - n_shifts) as u64;

    let mut significand = if n_shifts >= 0 {
        let shifted = x << n_shifts as u32;
        u64::try_from(shifted).map_err(|_| {
            SimulationError::FatalError(format!("f64 conversion: {shifted} does not fit in u64"))
        })?
    } else {
        let shift = n_shifts.unsigned_abs();

        // least significant surviving bit breaks ties
        let lsb = (x >> shift) & U256::from(1u64);
        let round_bit = (x >> (shift - 1)) & U256::from(1u64);
        let sticky_bits = if shift < 2 {
            U256::ZERO
        } else {
            x & ((U256::from(1u64) << (shift - 2)) - U256::from(1u64))
        };

        let truncated = x >> shift;
        let truncated: u64 = truncated.try_into().map_err(|_| {
            SimulationError::FatalError(format!("f64 conversion: {truncated} does not fit in u64"))
        })?;

        if round_bit.is_zero() {
            truncated
        } else if !sticky_bits.is_zero() || lsb == U256::from(1u64) {
            truncated + 1
        } else {
            truncated
        }
    };

    // rounding may carry into a 54th bit
    if significand & (1 << 53) > 0 {
        significand >>= 1;
        exponent += 1;
    }

    let merged = (exponent << 52) | (significand & 0xFFFFFFFFFFFFFu64);
    Ok(f64::from_bits(merged))
}

pub fn u256_to_biguint(value: U256) -> BigUint {
    let bytes: [u8; 32] = value.to_le_bytes();
    BigUint::from_bytes_le(&bytes)
}

pub fn biguint_to_u256(value: &BigUint) -> U256 {
    let bytes = value.to_bytes_le();
    U256::from_le_slice(&bytes)
}
