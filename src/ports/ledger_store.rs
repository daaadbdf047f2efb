//! Ledger Store Port - Balance and Deposit Persistence
//!
//! Abstracts the persistent ledger (balances, journal, deposit records,
//! wallet links). The store does not serialize callers itself beyond
//! keeping each method atomic; per-user ordering of balance writes is
//! enforced by `usecases::reservation`.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{BalanceRow, DepositRecord, LedgerEntry, SettlementError, UserId};

/// Trait for ledger persistence providers.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
  /// Current balance; zero for users never credited.
  async fn balance(&self, user_id: UserId) -> Result<U256, SettlementError>;

  /// Write a new balance and its journal entry as one atomic change.
  async fn apply_entry(
    &self,
    new_balance: U256,
    entry: &LedgerEntry,
  ) -> Result<(), SettlementError>;

  /// Credit a recorded deposit: balance, journal entry and `credited_at`
  /// in one atomic change. Fails if the deposit was already credited.
  async fn commit_deposit_credit(
    &self,
    deposit_id: Uuid,
    new_balance: U256,
    entry: &LedgerEntry,
    credited_at: DateTime<Utc>,
  ) -> Result<(), SettlementError>;

  /// All balances as decimal strings, one row per account.
  async fn balance_rows(&self) -> Result<Vec<BalanceRow>, SettlementError>;

  /// Journal entries for one user, oldest first.
  async fn entries_for(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, SettlementError>;

  /// Insert a deposit record.
  ///
  /// Fails with `DuplicateDepositHash` if a record with the same non-null
  /// hash exists. Records without a hash never collide.
  async fn insert_deposit(&self, record: &DepositRecord) -> Result<(), SettlementError>;

  /// Whether a deposit with this hash was already recorded.
  async fn deposit_exists(&self, tx_hash: &str) -> Result<bool, SettlementError>;

  /// Chain deposits not yet credited (claimed and unclaimed).
  async fn uncredited_deposits(&self) -> Result<Vec<DepositRecord>, SettlementError>;

  /// Link a wallet to a user and attach that wallet's unclaimed deposits.
  ///
  /// Returns how many unclaimed deposits were attached. A wallet already
  /// linked to a different user fails with `WalletAlreadyLinked`.
  async fn link_wallet(&self, user_id: UserId, wallet: Address) -> Result<usize, SettlementError>;

  /// User linked to a wallet, if any.
  async fn user_for_wallet(&self, wallet: Address) -> Result<Option<UserId>, SettlementError>;

  /// Accumulate gas revenue retained by the operator inside custody.
  async fn add_operator_revenue(&self, amount: U256) -> Result<(), SettlementError>;

  /// Total retained operator revenue not yet swept out of custody.
  async fn operator_revenue(&self) -> Result<U256, SettlementError>;

  /// Check if the store is healthy (disk space, permissions).
  async fn is_healthy(&self) -> bool;
}
