//! Uniswap V2 Price Source - Spot Rate from Pair Reserves
//!
//! Implements the `PriceSource` port by reading `getReserves()` on a
//! token / wrapped-native constant-product pair. The pair's `token0()`
//! decides which reserve is the token; it never changes, so it is read
//! once and kept.
//!
//! Spot reserves are trivially movable within one block. The oracle cache
//! in front of this source limits how often a skewed read can be taken.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::config::OracleConfig;
use crate::domain::{SettlementError, rate_from_reserves};
use crate::ports::price_source::PriceSource;

use super::contracts::{pair_reserves, pair_token0};
use super::provider::RpcProvider;

pub struct UniswapV2PriceSource {
    provider: Arc<RpcProvider>,
    pair: Address,
    token: Address,
    token_is_token0: OnceCell<bool>,
}

impl UniswapV2PriceSource {
    pub fn new(provider: Arc<RpcProvider>, config: &OracleConfig) -> Self {
        Self {
            provider,
            pair: config.pair_address,
            token: config.token_address,
            token_is_token0: OnceCell::new(),
        }
    }

    async fn token_is_token0(&self) -> Result<bool, SettlementError> {
        self.token_is_token0
            .get_or_try_init(|| async {
                let token0 = pair_token0(&self.provider.inner(), self.pair)
                    .await
                    .map_err(SettlementError::chain)?;
                Ok(token0 == self.token)
            })
            .await
            .copied()
    }
}

/// Order `(reserve0, reserve1)` as `(token, native)`.
pub const fn orient_reserves(reserves: (U256, U256), token_is_token0: bool) -> (U256, U256) {
    if token_is_token0 {
        reserves
    } else {
        (reserves.1, reserves.0)
    }
}

#[async_trait]
impl PriceSource for UniswapV2PriceSource {
    #[instrument(skip(self), fields(pair = %self.pair))]
    async fn fetch_rate(&self) -> Result<U256, SettlementError> {
        let token_is_token0 = self.token_is_token0().await?;
        let reserves = pair_reserves(&self.provider.inner(), self.pair)
            .await
            .map_err(SettlementError::chain)?;

        let (token_reserve, native_reserve) = orient_reserves(reserves, token_is_token0);
        debug!(%token_reserve, %native_reserve, "Pair reserves read");
        rate_from_reserves(token_reserve, native_reserve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orient_reserves() {
        let r = (U256::from(1u64), U256::from(2u64));
        assert_eq!(orient_reserves(r, true), r);
        assert_eq!(orient_reserves(r, false), (U256::from(2u64), U256::from(1u64)));
    }
}
