//! Exact token amount helpers.
//!
//! All balances, prices and gas costs are `U256` in the smallest unit.
//! Nothing here ever goes through `f64`.

use alloy::primitives::U256;
use alloy::primitives::utils::{format_ether, parse_units};
use rust_decimal::Decimal;

use super::error::SettlementError;

/// 1e18, the fixed-point scale used for token amounts and exchange rates.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Parse a stored balance string (base-10, no sign, no decimals).
pub fn parse_amount(value: &str) -> Result<U256, SettlementError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SettlementError::InvalidAmount {
            value: value.to_string(),
        });
    }
    U256::from_str_radix(trimmed, 10).map_err(|_| SettlementError::InvalidAmount {
        value: value.to_string(),
    })
}

/// Render an 18-decimal amount in human units.
pub fn format_units18(amount: &U256) -> String {
    format_ether(*amount)
}

/// Convert a human-unit decimal (e.g. `1000.5` tokens) to 18-decimal base units.
pub fn decimal_to_units(value: Decimal) -> Result<U256, SettlementError> {
    if value.is_sign_negative() {
        return Err(SettlementError::InvalidAmount {
            value: value.to_string(),
        });
    }
    let text = value.normalize().to_string();
    parse_units(&text, 18u8)
        .map(|units| units.get_absolute())
        .map_err(|_| SettlementError::InvalidAmount { value: text })
}

/// `a * b / denom`, rounded down.
pub fn mul_div(
    a: U256,
    b: U256,
    denom: U256,
    context: &'static str,
) -> Result<U256, SettlementError> {
    let product = a
        .checked_mul(b)
        .ok_or(SettlementError::ArithmeticOverflow { context })?;
    product
        .checked_div(denom)
        .ok_or(SettlementError::ArithmeticOverflow { context })
}

/// `a * b / denom`, rounded up.
pub fn mul_div_ceil(
    a: U256,
    b: U256,
    denom: U256,
    context: &'static str,
) -> Result<U256, SettlementError> {
    let product = a
        .checked_mul(b)
        .ok_or(SettlementError::ArithmeticOverflow { context })?;
    if denom.is_zero() {
        return Err(SettlementError::ArithmeticOverflow { context });
    }
    let (quotient, remainder) = product.div_rem(denom);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        quotient
            .checked_add(U256::from(1))
            .ok_or(SettlementError::ArithmeticOverflow { context })
    }
}
