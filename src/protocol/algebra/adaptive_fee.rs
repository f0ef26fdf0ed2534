//! Volatility and volume driven dynamic fee.
//!
//! The fee is a base rate plus two sigmoids over the average volatility,
//! whose combined amplitude is in turn scaled by a sigmoid over traded
//! volume per unit of liquidity. All intermediate math is integer only,
//! with `e^x` approximated by its Taylor expansion to the eighth order.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::protocol::errors::SimulationError;

/// Parameters of the fee curve. Volatility is measured in ticks, volume per
/// liquidity as a Q64.64 fixed point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveFeeConfiguration {
    /// Amplitude of the first volatility sigmoid, in hundredths of a bip.
    pub alpha1: u16,
    /// Amplitude of the second volatility sigmoid.
    pub alpha2: u16,
    /// Volatility midpoint of the first sigmoid.
    pub beta1: u32,
    /// Volatility midpoint of the second sigmoid.
    pub beta2: u32,
    /// Horizontal stretch of the first sigmoid.
    pub gamma1: u16,
    /// Horizontal stretch of the second sigmoid.
    pub gamma2: u16,
    /// Volume per liquidity midpoint of the outer sigmoid.
    pub volume_beta: u32,
    /// Horizontal stretch of the outer sigmoid.
    pub volume_gamma: u16,
    /// Fee charged when both sigmoids are at zero.
    pub base_fee: u16,
}

impl AdaptiveFeeConfiguration {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.gamma1 == 0 || self.gamma2 == 0 || self.volume_gamma == 0 {
            return Err(SimulationError::InvalidInput(
                "fee configuration gammas must be non-zero".to_string(),
            ));
        }
        if self.alpha1 as u32 + self.alpha2 as u32 + self.base_fee as u32 > u16::MAX as u32 {
            return Err(SimulationError::InvalidInput(
                "maximum fee exceeds the 16 bit range".to_string(),
            ));
        }
        Ok(())
    }
}

/// How the pool determines its swap fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeConfiguration {
    /// Constant fee in hundredths of a bip.
    Fixed(u32),
    /// Fee recomputed from oracle averages on every new block.
    Dynamic(AdaptiveFeeConfiguration),
}

/// Evaluates the fee curve at the given average volatility and volume per
/// liquidity. Saturates at `u16::MAX` hundredths of a bip.
pub fn get_fee(
    volatility: U256,
    volume_per_liquidity: U256,
    config: &AdaptiveFeeConfiguration,
) -> u16 {
    let sum_of_sigmoids = sigmoid(
        volatility,
        config.gamma1,
        U256::from(config.alpha1),
        U256::from(config.beta1),
    ) + sigmoid(
        volatility,
        config.gamma2,
        U256::from(config.alpha2),
        U256::from(config.beta2),
    );
    let sum_of_sigmoids = if sum_of_sigmoids > U256::from(u16::MAX) {
        U256::from(u16::MAX)
    } else {
        sum_of_sigmoids
    };

    let fee = U256::from(config.base_fee) +
        sigmoid(
            volume_per_liquidity,
            config.volume_gamma,
            sum_of_sigmoids,
            U256::from(config.volume_beta),
        );
    fee.saturating_to::<u16>()
}

/// `alpha / (1 + e^((beta - x) / gamma))`, exact past six gammas from the
/// midpoint where the curve is flat to within integer precision.
fn sigmoid(x: U256, gamma: u16, alpha: U256, beta: U256) -> U256 {
    let gamma = U256::from(gamma);
    if x > beta {
        let x = x - beta;
        if x >= U256::from(6u64) * gamma {
            return alpha;
        }
        let g8 = gamma.pow(U256::from(8));
        let ex = exp(x, gamma, g8);
        // ex cannot overflow against g8 below the 6 gamma cutoff
        alpha * ex / (g8 + ex)
    } else {
        let x = beta - x;
        if x >= U256::from(6u64) * gamma {
            return U256::ZERO;
        }
        let g8 = gamma.pow(U256::from(8));
        alpha * g8 / (g8 + exp(x, gamma, g8))
    }
}

/// `e^(x / gamma)` scaled by `gamma^8`, via the Taylor series up to the
/// eighth power. Valid for `x < 6 * gamma`.
fn exp(x: U256, gamma: U256, g8: U256) -> U256 {
    let x2 = x * x;
    let x3 = x2 * x;
    let x4 = x3 * x;
    let x5 = x4 * x;
    let x6 = x5 * x;
    let x7 = x6 * x;
    let x8 = x7 * x;

    let g2 = gamma * gamma;
    let g3 = g2 * gamma;
    let g4 = g3 * gamma;
    let g5 = g4 * gamma;
    let g6 = g5 * gamma;
    let g7 = g6 * gamma;

    g8 + x * g7 +
        x2 * g6 / U256::from(2u64) +
        x3 * g5 / U256::from(6u64) +
        x4 * g4 / U256::from(24u64) +
        x5 * g3 / U256::from(120u64) +
        x6 * g2 / U256::from(720u64) +
        x7 * gamma / U256::from(5040u64) +
        x8 / U256::from(40320u64)
}
