//! Gas Cost Accountant - Receipt Settlement and Estimates in Token Units
//!
//! Joins the pure gas rules in `domain::gas` with the cached exchange rate:
//! - `settle`: real cost of a mined transaction from its receipt
//! - `estimate`: expected cost of a transaction not yet sent
//!
//! Settlement converts with the floor, estimates with the ceiling, so an
//! estimate never undershoots the settled cost at the same rate.

use std::sync::Arc;

use alloy::primitives::U256;
use tracing::{debug, instrument};

use crate::domain::amount::format_units18;
use crate::domain::gas::{estimate_cost_wei, resolve_gas_price};
use crate::domain::{FeeData, GasReceipt, GasSettlement, SettlementError, compute_cost};
use crate::ports::price_source::PriceSource;

use super::price_oracle::PriceOracle;

pub struct GasAccountant<P: PriceSource> {
    oracle: Arc<PriceOracle<P>>,
}

impl<P: PriceSource> GasAccountant<P> {
    pub const fn new(oracle: Arc<PriceOracle<P>>) -> Self {
        Self { oracle }
    }

    pub fn oracle(&self) -> &Arc<PriceOracle<P>> {
        &self.oracle
    }

    /// Cost of a mined transaction, converted at the current cached rate.
    #[instrument(skip(self, receipt), fields(gas_used = %receipt.gas_used))]
    pub async fn settle(&self, receipt: &GasReceipt) -> Result<GasSettlement, SettlementError> {
        // Price errors surface before any oracle access.
        let gas_price = resolve_gas_price(receipt)?;
        let gas_cost_wei = compute_cost(receipt)?;

        let quote = self.oracle.get_rate().await?;
        let gas_cost_token = quote.native_to_token(gas_cost_wei)?;

        debug!(
            gas_price = %gas_price,
            gas_cost_wei = %gas_cost_wei,
            gas_cost_token = %format_units18(&gas_cost_token),
            "Gas settled"
        );

        Ok(GasSettlement {
            gas_used: receipt.gas_used,
            gas_price,
            gas_cost_wei,
            rate: quote.rate,
            gas_cost_token,
        })
    }

    /// Token cost of spending `gas_units` at the current network price.
    pub async fn estimate(&self, gas_units: u64, fees: &FeeData) -> Result<U256, SettlementError> {
        let wei = estimate_cost_wei(U256::from(gas_units), fees)?;
        let quote = self.oracle.get_rate().await?;
        quote.native_to_token_ceil(wei)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use chrono::TimeDelta;

    use crate::domain::amount::WAD;

    struct FixedSource {
        rate: U256,
        calls: AtomicU64,
    }

    #[async_trait]
    impl PriceSource for FixedSource {
        async fn fetch_rate(&self) -> Result<U256, SettlementError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rate)
        }
    }

    fn accountant(rate: U256) -> (GasAccountant<FixedSource>, Arc<FixedSource>) {
        let source = Arc::new(FixedSource {
            rate,
            calls: AtomicU64::new(0),
        });
        let oracle = Arc::new(PriceOracle::new(
            Arc::clone(&source),
            TimeDelta::seconds(60),
            TimeDelta::seconds(300),
        ));
        (GasAccountant::new(oracle), source)
    }

    #[tokio::test]
    async fn test_settle_converts_at_rate() {
        // 50_000 tokens per native unit
        let (accountant, _) = accountant(U256::from(50_000u64) * WAD);
        let receipt = GasReceipt {
            gas_used: U256::from(100_000u64),
            effective_gas_price: Some(U256::from(50_000_000u64)),
            gas_price: Some(U256::from(25_000_000u64)),
        };

        let s = accountant.settle(&receipt).await.unwrap();
        assert_eq!(s.gas_price, U256::from(50_000_000u64));
        assert_eq!(s.gas_cost_wei, U256::from(5_000_000_000_000u64));
        // 5e12 wei * 50_000 = 2.5e17 token base units
        assert_eq!(s.gas_cost_token, U256::from(250_000_000_000_000_000u64));
    }

    #[tokio::test]
    async fn test_indeterminate_price_skips_oracle() {
        let (accountant, source) = accountant(WAD);
        let receipt = GasReceipt {
            gas_used: U256::from(21_000u64),
            effective_gas_price: None,
            gas_price: None,
        };

        let err = accountant.settle(&receipt).await.unwrap_err();
        assert!(matches!(err, SettlementError::IndeterminateGasPrice { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_estimate_rounds_up() {
        // 1 wei of gas at a rate of 1.5 tokens per native unit -> 1.5 base units -> 2
        let (accountant, _) = accountant(WAD + WAD / U256::from(2u64));
        let fees = FeeData {
            gas_price: Some(U256::from(1u64)),
            max_fee_per_gas: None,
        };
        assert_eq!(accountant.estimate(1, &fees).await.unwrap(), U256::from(2u64));
    }

    #[tokio::test]
    async fn test_estimate_uses_max_fee_fallback() {
        let (accountant, _) = accountant(WAD);
        let fees = FeeData {
            gas_price: None,
            max_fee_per_gas: Some(U256::from(10u64)),
        };
        assert_eq!(
            accountant.estimate(200_000, &fees).await.unwrap(),
            U256::from(2_000_000u64)
        );
    }
}
