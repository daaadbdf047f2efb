//! Gas cost accounting from EIP-1559 receipts.
//!
//! `effectiveGasPrice` is what the sender actually paid post-London and wins
//! whenever it is present and non-zero; the legacy `gasPrice` is the fallback.
//! A zero price is only accepted when it was explicitly reported and no gas
//! was burned, so "missing" never silently becomes "free".

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::error::SettlementError;

/// The subset of a transaction receipt the accountant needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GasReceipt {
    pub gas_used: U256,
    pub effective_gas_price: Option<U256>,
    pub gas_price: Option<U256>,
}

/// Current network fee data used for pre-submission estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeData {
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
}

/// Gas cost of a mined transaction, in wei and in token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasSettlement {
    pub gas_used: U256,
    pub gas_price: U256,
    pub gas_cost_wei: U256,
    /// Rate used for the conversion (token per 1e18 wei).
    pub rate: U256,
    pub gas_cost_token: U256,
}

/// Pick the per-unit price the receipt was charged at.
pub fn resolve_gas_price(receipt: &GasReceipt) -> Result<U256, SettlementError> {
    let price = match (receipt.effective_gas_price, receipt.gas_price) {
        (Some(effective), _) if !effective.is_zero() => effective,
        (_, Some(legacy)) => legacy,
        (Some(zero), None) => zero,
        (None, None) => {
            return Err(SettlementError::IndeterminateGasPrice {
                gas_used: receipt.gas_used,
            });
        }
    };

    if price.is_zero() && !receipt.gas_used.is_zero() {
        return Err(SettlementError::IndeterminateGasPrice {
            gas_used: receipt.gas_used,
        });
    }
    Ok(price)
}

/// `gas_used * price` in wei.
pub fn compute_cost(receipt: &GasReceipt) -> Result<U256, SettlementError> {
    let price = resolve_gas_price(receipt)?;
    receipt
        .gas_used
        .checked_mul(price)
        .ok_or(SettlementError::ArithmeticOverflow {
            context: "gas cost",
        })
}

/// Estimated wei cost of `gas_units` at the current network price.
pub fn estimate_cost_wei(gas_units: U256, fees: &FeeData) -> Result<U256, SettlementError> {
    let price = fees
        .gas_price
        .filter(|p| !p.is_zero())
        .or(fees.max_fee_per_gas)
        .filter(|p| !p.is_zero())
        .ok_or(SettlementError::IndeterminateGasPrice {
            gas_used: gas_units,
        })?;
    gas_units
        .checked_mul(price)
        .ok_or(SettlementError::ArithmeticOverflow {
            context: "gas estimate",
        })
}
