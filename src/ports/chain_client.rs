//! Chain Client Port - On-chain Reads for Settlement
//!
//! The chain is the source of truth for deposits, gas receipts and the
//! custody balance that backs the off-chain ledger. Implementations may
//! be slow, fail transiently or return lagging data; callers apply the
//! confirmation and caching policies on top.

use alloy::primitives::U256;
use async_trait::async_trait;

use crate::domain::{DepositEvent, FeeData, GasReceipt, SettlementError};

/// Native and token balances of the operator (gas-paying) wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorBalances {
  /// Native currency balance in wei.
  pub native: U256,
  /// Token balance in base units.
  pub token: U256,
}

/// Trait for on-chain interactions via alloy-rs.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
  /// Current head block number.
  async fn block_number(&self) -> Result<u64, SettlementError>;

  /// Gas fields of a mined transaction's receipt. `None` if not yet mined.
  async fn receipt(&self, tx_hash: &str) -> Result<Option<GasReceipt>, SettlementError>;

  /// Current network fee data for estimates.
  async fn fee_data(&self) -> Result<FeeData, SettlementError>;

  /// Token transfers into the custody wallet in `[from_block, to_block]`.
  async fn deposit_transfers(
    &self,
    from_block: u64,
    to_block: u64,
  ) -> Result<Vec<DepositEvent>, SettlementError>;

  /// Token balance of the custody wallet that backs user balances.
  async fn custody_token_balance(&self) -> Result<U256, SettlementError>;

  /// Balances of the operator wallet that pays gas.
  async fn operator_balances(&self) -> Result<OperatorBalances, SettlementError>;

  /// Check if the chain client connection is healthy.
  async fn is_healthy(&self) -> bool;
}
