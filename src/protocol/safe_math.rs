//! Checked arithmetic helpers for the alloy integer types.
//!
//! Overflow in non-wrapping positions is an internal invariant breach and
//! is reported as [`SimulationError::FatalError`].

use alloy::primitives::{I256, U256};

use crate::protocol::errors::SimulationError;

pub fn safe_add_u256(a: U256, b: U256) -> Result<U256, SimulationError> {
    a.checked_add(b)
        .ok_or_else(|| SimulationError::FatalError(format!("U256 addition overflow: {a} + {b}")))
}

pub fn safe_sub_u256(a: U256, b: U256) -> Result<U256, SimulationError> {
    a.checked_sub(b)
        .ok_or_else(|| SimulationError::FatalError(format!("U256 subtraction underflow: {a} - {b}")))
}

pub fn safe_mul_u256(a: U256, b: U256) -> Result<U256, SimulationError> {
    a.checked_mul(b)
        .ok_or_else(|| SimulationError::FatalError(format!("U256 multiplication overflow: {a} * {b}")))
}

pub fn safe_div_u256(a: U256, b: U256) -> Result<U256, SimulationError> {
    if b.is_zero() {
        return Err(SimulationError::FatalError("Division by zero".to_string()));
    }
    Ok(a / b)
}

pub fn safe_add_i256(a: I256, b: I256) -> Result<I256, SimulationError> {
    a.checked_add(b)
        .ok_or_else(|| SimulationError::FatalError(format!("I256 addition overflow: {a} + {b}")))
}

pub fn safe_sub_i256(a: I256, b: I256) -> Result<I256, SimulationError> {
    a.checked_sub(b)
        .ok_or_else(|| SimulationError::FatalError(format!("I256 subtraction overflow: {a} - {b}")))
}

/// Floor of the integer square root of a U256.
///
/// Newton's method with a bit-length based initial guess; converges in a
/// handful of iterations for 256-bit inputs.
pub fn sqrt_u256(value: U256) -> U256 {
    if value <= U256::from(1u64) {
        return value;
    }

    let bits = 256 - value.leading_zeros();
    let mut x = U256::from(1u64) << bits.div_ceil(2);

    loop {
        let next = (x + value / x) >> 1;
        if next >= x {
            return x;
        }
        x = next;
    }
}
