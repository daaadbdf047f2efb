//! Float Manager - Native Gas Float Top-up Planning
//!
//! The operator wallet pays gas in the native currency and earns the
//! mined token. When the native float runs low, a token-to-native swap
//! tops it back up to the target, but only out of tokens above the
//! protected reserve. This module plans the swap; executing it on a DEX
//! is left to the operator tooling.

use std::sync::Arc;

use alloy::primitives::U256;
use tracing::{info, instrument, warn};

use crate::config::ReserveConfig;
use crate::domain::amount::format_units18;
use crate::domain::{SettlementError, check_swap_possible};
use crate::ports::chain_client::ChainClient;
use crate::ports::price_source::PriceSource;

use super::price_oracle::PriceOracle;

/// A guarded token-to-native conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPlan {
    /// Native amount (wei) that brings the float back to target.
    pub native_needed: U256,
    /// Tokens to sell, rounded up.
    pub token_to_swap: U256,
    /// Rate the plan was priced at.
    pub rate: U256,
    /// Tokens above the reserve before the swap.
    pub token_available: U256,
}

pub struct FloatManager<C: ChainClient, P: PriceSource> {
    chain: Arc<C>,
    oracle: Arc<PriceOracle<P>>,
    min_native_float: U256,
    target_native_float: U256,
    min_token_reserve: U256,
}

impl<C: ChainClient, P: PriceSource> FloatManager<C, P> {
    pub fn new(
        chain: Arc<C>,
        oracle: Arc<PriceOracle<P>>,
        config: &ReserveConfig,
    ) -> Result<Self, SettlementError> {
        Ok(Self {
            chain,
            oracle,
            min_native_float: config.min_native_float_units()?,
            target_native_float: config.target_native_float_units()?,
            min_token_reserve: config.min_token_reserve_units()?,
        })
    }

    /// Plan a top-up if the float is below the minimum.
    ///
    /// `Ok(None)` when no top-up is needed. Fails with a reserve error when
    /// the swap would dip into the protected token reserve.
    #[instrument(skip(self))]
    pub async fn plan_top_up(&self) -> Result<Option<SwapPlan>, SettlementError> {
        let balances = self.chain.operator_balances().await?;
        if balances.native >= self.min_native_float {
            return Ok(None);
        }

        let native_needed = self.target_native_float.saturating_sub(balances.native);
        let quote = self.oracle.get_rate().await?;
        let token_to_swap = quote.native_to_token_ceil(native_needed)?;

        let token_available =
            match check_swap_possible(balances.token, token_to_swap, self.min_token_reserve) {
                Ok(available) => available,
                Err(e) => {
                    warn!(
                        native = %format_units18(&balances.native),
                        token = %format_units18(&balances.token),
                        error = %e,
                        "Float top-up blocked by reserve"
                    );
                    return Err(e);
                }
            };

        info!(
            native = %format_units18(&balances.native),
            native_needed = %format_units18(&native_needed),
            token_to_swap = %format_units18(&token_to_swap),
            "Float top-up planned"
        );

        Ok(Some(SwapPlan {
            native_needed,
            token_to_swap,
            rate: quote.rate,
            token_available,
        }))
    }
}
