//! Settlement Chain Client - ChainClient Port over alloy-rs 0.9
//!
//! Reads everything the settlement engine needs from the chain where
//! deposits land and tasks are submitted:
//! - head block, receipts and fee data
//! - token `Transfer` logs into the custody wallet
//! - custody and operator wallet balances

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::config::ChainConfig;
use crate::domain::{DepositEvent, FeeData, GasReceipt, SettlementError};
use crate::ports::chain_client::{ChainClient, OperatorBalances};

use super::contracts::{erc20_balance_of, transfer_topic, word_at};
use super::gas::{fetch_fee_data, fetch_gas_receipt};
use super::provider::RpcProvider;

#[derive(Debug, Clone, Copy)]
pub struct WalletAddresses {
    pub token: Address,
    pub custody: Address,
    pub operator: Address,
}

impl From<&ChainConfig> for WalletAddresses {
    fn from(config: &ChainConfig) -> Self {
        Self {
            token: config.token_address,
            custody: config.custody_wallet,
            operator: config.operator_wallet,
        }
    }
}

pub struct RpcChainClient {
    provider: Arc<RpcProvider>,
    addresses: WalletAddresses,
}

impl RpcChainClient {
    pub const fn new(provider: Arc<RpcProvider>, addresses: WalletAddresses) -> Self {
        Self {
            provider,
            addresses,
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64, SettlementError> {
        self.provider
            .inner()
            .get_block_number()
            .await
            .context("eth_blockNumber failed")
            .map_err(SettlementError::chain)
    }

    #[instrument(skip(self))]
    async fn receipt(&self, tx_hash: &str) -> Result<Option<GasReceipt>, SettlementError> {
        fetch_gas_receipt(&self.provider.inner(), tx_hash)
            .await
            .map_err(SettlementError::chain)
    }

    async fn fee_data(&self) -> Result<FeeData, SettlementError> {
        fetch_fee_data(&self.provider.inner())
            .await
            .map_err(SettlementError::chain)
    }

    #[instrument(skip(self))]
    async fn deposit_transfers(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<DepositEvent>, SettlementError> {
        let filter = Filter::new()
            .address(self.addresses.token)
            .event_signature(transfer_topic())
            .topic2(self.addresses.custody.into_word())
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .provider
            .inner()
            .get_logs(&filter)
            .await
            .context("eth_getLogs failed")
            .map_err(SettlementError::chain)?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let (Some(tx_hash), Some(block_number)) = (log.transaction_hash, log.block_number)
            else {
                // Pending logs have neither; they show up again once mined.
                continue;
            };
            let Some(from_topic) = log.topics().get(1) else {
                warn!(tx_hash = %tx_hash, "Transfer log without sender topic");
                continue;
            };
            let amount = match word_at(&log.data().data, 0) {
                Ok(amount) => amount,
                Err(e) => {
                    warn!(tx_hash = %tx_hash, error = %e, "Malformed Transfer data");
                    continue;
                }
            };

            events.push(DepositEvent {
                tx_hash: tx_hash.to_string(),
                block_number,
                from: Address::from_word(*from_topic),
                amount,
            });
        }

        debug!(from_block, to_block, transfers = events.len(), "Custody transfers fetched");
        Ok(events)
    }

    async fn custody_token_balance(&self) -> Result<U256, SettlementError> {
        erc20_balance_of(
            &self.provider.inner(),
            self.addresses.token,
            self.addresses.custody,
        )
        .await
        .map_err(SettlementError::chain)
    }

    async fn operator_balances(&self) -> Result<OperatorBalances, SettlementError> {
        let provider = self.provider.inner();
        let native = provider
            .get_balance(self.addresses.operator)
            .await
            .context("eth_getBalance failed")
            .map_err(SettlementError::chain)?;
        let token = erc20_balance_of(&provider, self.addresses.token, self.addresses.operator)
            .await
            .map_err(SettlementError::chain)?;
        Ok(OperatorBalances { native, token })
    }

    async fn is_healthy(&self) -> bool {
        self.provider.is_healthy().await
    }
}
