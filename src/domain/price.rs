//! Exchange rate quotes between the mined token and the gas-paying currency.
//!
//! A rate is "token base units per 1 native unit", scaled by 1e18, i.e. the
//! token amount equivalent to exactly 1e18 wei.

use alloy::primitives::U256;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::amount::{WAD, mul_div, mul_div_ceil};
use super::error::SettlementError;

/// An immutable observed exchange rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Token base units per 1e18 wei.
    pub rate: U256,
    /// When the rate was read from the source.
    pub observed_at: DateTime<Utc>,
}

impl PriceQuote {
    pub const fn new(rate: U256, observed_at: DateTime<Utc>) -> Self {
        Self { rate, observed_at }
    }

    /// Age of the quote relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.observed_at
    }

    /// Strictly younger than `window`.
    pub fn is_within(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.age(now) < window
    }

    /// Convert a native-currency amount (wei) to token base units, rounded down.
    pub fn native_to_token(&self, wei: U256) -> Result<U256, SettlementError> {
        mul_div(wei, self.rate, WAD, "native to token conversion")
    }

    /// Same as [`Self::native_to_token`], rounded up. Used when buying a target amount.
    pub fn native_to_token_ceil(&self, wei: U256) -> Result<U256, SettlementError> {
        mul_div_ceil(wei, self.rate, WAD, "native to token conversion")
    }
}

/// Derive the rate from constant-product pool reserves.
///
/// Fails with `NoLiquidity` when either side is empty.
pub fn rate_from_reserves(
    token_reserve: U256,
    native_reserve: U256,
) -> Result<U256, SettlementError> {
    if token_reserve.is_zero() || native_reserve.is_zero() {
        return Err(SettlementError::NoLiquidity {
            token_reserve,
            native_reserve,
        });
    }
    mul_div(token_reserve, WAD, native_reserve, "reserve rate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_from_reserves() {
        // 50_000 tokens per 1 native unit
        let rate = rate_from_reserves(U256::from(5_000_000u64) * WAD, U256::from(100u64) * WAD)
            .unwrap();
        assert_eq!(rate, U256::from(50_000u64) * WAD);
    }

    #[test]
    fn test_zero_native_reserve_is_no_liquidity() {
        let err = rate_from_reserves(U256::from(1_000_000u64), U256::ZERO).unwrap_err();
        assert!(matches!(err, SettlementError::NoLiquidity { .. }));
        assert!(err.to_string().contains("no liquidity"));
    }

    #[test]
    fn test_both_reserves_zero_is_no_liquidity() {
        let err = rate_from_reserves(U256::ZERO, U256::ZERO).unwrap_err();
        assert!(matches!(err, SettlementError::NoLiquidity { .. }));
    }

    #[test]
    fn test_quote_window_is_strict() {
        let now = Utc::now();
        let quote = PriceQuote::new(WAD, now - TimeDelta::seconds(60));
        assert!(!quote.is_within(now, TimeDelta::seconds(60)));
        assert!(quote.is_within(now, TimeDelta::seconds(61)));
    }

    #[test]
    fn test_native_to_token() {
        let quote = PriceQuote::new(U256::from(2u64) * WAD, Utc::now());
        assert_eq!(quote.native_to_token(U256::from(5u64)).unwrap(), U256::from(10u64));
    }
}
