//! Deposit records.
//!
//! Chain deposits carry the transaction hash that produced them; admin
//! credits carry none. Uniqueness applies to non-null hashes only, the same
//! semantics as a partial unique index (`WHERE tx_hash IS NOT NULL`).

use std::collections::HashSet;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SettlementError;
use super::ledger::UserId;

/// Where a credit originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositKind {
    /// Token transfer into the custody wallet.
    Chain,
    /// Manual operator credit with no on-chain transaction.
    AdminCredit,
}

/// A token transfer observed on-chain, before it becomes a ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub tx_hash: String,
    pub block_number: u64,
    pub from: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub id: Uuid,
    pub kind: DepositKind,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub from: Option<Address>,
    /// `None` while the sending wallet is not linked to any user.
    pub user_id: Option<UserId>,
    pub amount: U256,
    pub observed_at: DateTime<Utc>,
    /// Set exactly once, when the deposit is credited.
    pub credited_at: Option<DateTime<Utc>>,
}

impl DepositRecord {
    /// Record an observed chain transfer, not yet credited.
    pub fn from_event(
        event: &DepositEvent,
        user_id: Option<UserId>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: DepositKind::Chain,
            tx_hash: Some(normalize_tx_hash(&event.tx_hash)),
            block_number: Some(event.block_number),
            from: Some(event.from),
            user_id,
            amount: event.amount,
            observed_at,
            credited_at: None,
        }
    }

    /// Record an operator credit. Admin credits are final on creation.
    pub fn admin_credit(user_id: UserId, amount: U256, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: DepositKind::AdminCredit,
            tx_hash: None,
            block_number: None,
            from: None,
            user_id: Some(user_id),
            amount,
            observed_at: at,
            credited_at: None,
        }
    }

    pub const fn is_credited(&self) -> bool {
        self.credited_at.is_some()
    }

    pub const fn is_unclaimed(&self) -> bool {
        self.user_id.is_none()
    }
}

/// Canonical form for hash comparisons.
pub fn normalize_tx_hash(tx_hash: &str) -> String {
    tx_hash.trim().to_ascii_lowercase()
}

/// Fail on the first non-null hash that appears twice. Null hashes never collide.
pub fn ensure_unique_tx_hashes(records: &[DepositRecord]) -> Result<(), SettlementError> {
    let mut seen = HashSet::new();
    for hash in records.iter().filter_map(|r| r.tx_hash.as_deref()) {
        let hash = normalize_tx_hash(hash);
        if !seen.insert(hash.clone()) {
            return Err(SettlementError::DuplicateDepositHash { tx_hash: hash });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(hash: &str) -> DepositRecord {
        DepositRecord::from_event(
            &DepositEvent {
                tx_hash: hash.to_string(),
                block_number: 1,
                from: Address::ZERO,
                amount: U256::from(1u64),
            },
            Some(1),
            Utc::now(),
        )
    }

    #[test]
    fn test_multiple_null_hashes_allowed() {
        let records = vec![
            chain("0xabc"),
            DepositRecord::admin_credit(2, U256::from(5u64), Utc::now()),
            DepositRecord::admin_credit(3, U256::from(5u64), Utc::now()),
            chain("0xdef"),
        ];
        assert!(ensure_unique_tx_hashes(&records).is_ok());
    }

    #[test]
    fn test_duplicate_non_null_hash_detected() {
        let records = vec![chain("0xabc"), chain("0xabc")];
        let err = ensure_unique_tx_hashes(&records).unwrap_err();
        assert!(matches!(err, SettlementError::DuplicateDepositHash { ref tx_hash } if tx_hash == "0xabc"));
    }

    #[test]
    fn test_hash_comparison_is_case_insensitive() {
        let records = vec![chain("0xABC"), chain("0xabc")];
        assert!(ensure_unique_tx_hashes(&records).is_err());
    }
}
