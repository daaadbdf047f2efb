//! Price Source Port - Live Exchange Rate Reads
//!
//! The oracle cache sits in front of this port. Implementations do a
//! live read every call; caching and staleness policy live in
//! `usecases::price_oracle`.

use alloy::primitives::U256;
use async_trait::async_trait;

use crate::domain::SettlementError;

/// Live source for the token-per-native exchange rate.
#[async_trait]
pub trait PriceSource: Send + Sync + 'static {
  /// Read the current rate (token base units per 1e18 wei).
  ///
  /// Must fail with `SettlementError::NoLiquidity` when either side of
  /// the pair is empty, never return a zero rate.
  async fn fetch_rate(&self) -> Result<U256, SettlementError>;
}
