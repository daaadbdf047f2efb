//! Ledger Store Implementation - Concrete Adapter for the LedgerStore Port
//!
//! Wraps `SnapshotFile` (atomic JSON state) and `JournalWriter` (JSONL
//! audit trail) behind the `LedgerStore` trait. State lives in memory
//! under a `RwLock`; each mutation is applied to a copy, persisted, and
//! only then swapped in, so a failed write leaves the ledger unchanged.
//!
//! `JsonLedgerStore::in_memory()` skips the files entirely (tests, dry runs).

use std::path::Path;

use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use super::journal::JournalWriter;
use super::snapshot::{LedgerState, SNAPSHOT_VERSION, SnapshotFile};
use crate::domain::deposit::{ensure_unique_tx_hashes, normalize_tx_hash};
use crate::domain::{BalanceRow, DepositKind, DepositRecord, LedgerEntry, SettlementError, UserId};
use crate::ports::ledger_store::LedgerStore;

struct StoreFiles {
    snapshot: SnapshotFile,
    journal: JournalWriter,
}

struct Inner {
    state: LedgerState,
    entries: Vec<LedgerEntry>,
}

pub struct JsonLedgerStore {
    inner: RwLock<Inner>,
    files: Option<StoreFiles>,
}

impl JsonLedgerStore {
    /// Store without any file backing.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: LedgerState {
                    version: SNAPSHOT_VERSION,
                    ..LedgerState::default()
                },
                entries: Vec::new(),
            }),
            files: None,
        }
    }

    /// Open (or create) a store in `data_dir`, restoring the last snapshot
    /// and the journal.
    pub async fn open(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        let snapshot = SnapshotFile::new(dir).await?;
        let journal = JournalWriter::new(dir).await?;

        let state = snapshot.load().await?.unwrap_or(LedgerState {
            version: SNAPSHOT_VERSION,
            ..LedgerState::default()
        });
        let entries = journal.load_all().await?;

        info!(
            data_dir,
            accounts = state.balances.len(),
            journal_entries = entries.len(),
            "Ledger store opened"
        );

        Ok(Self {
            inner: RwLock::new(Inner { state, entries }),
            files: Some(StoreFiles { snapshot, journal }),
        })
    }

    /// Apply `change` to a copy of the state, persist it, then publish it.
    async fn commit<F>(&self, entry: Option<&LedgerEntry>, change: F) -> Result<(), SettlementError>
    where
        F: FnOnce(&mut LedgerState) -> Result<(), SettlementError> + Send,
    {
        let mut inner = self.inner.write().await;
        let mut next = inner.state.clone();
        change(&mut next)?;
        next.updated_at = Some(Utc::now());

        if let Some(files) = &self.files {
            files
                .snapshot
                .save(&next)
                .await
                .map_err(SettlementError::storage)?;
            if let Some(entry) = entry {
                // The snapshot is authoritative; a lost journal line is an audit gap only.
                if let Err(e) = files.journal.append(entry).await {
                    warn!(entry_id = %entry.id, error = %e, "Journal append failed");
                }
            }
        }

        inner.state = next;
        if let Some(entry) = entry {
            inner.entries.push(entry.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for JsonLedgerStore {
    async fn balance(&self, user_id: UserId) -> Result<U256, SettlementError> {
        let inner = self.inner.read().await;
        Ok(inner.state.balances.get(&user_id).copied().unwrap_or_default())
    }

    async fn apply_entry(
        &self,
        new_balance: U256,
        entry: &LedgerEntry,
    ) -> Result<(), SettlementError> {
        let user_id = entry.user_id;
        self.commit(Some(entry), move |state| {
            state.balances.insert(user_id, new_balance);
            Ok(())
        })
        .await
    }

    async fn commit_deposit_credit(
        &self,
        deposit_id: Uuid,
        new_balance: U256,
        entry: &LedgerEntry,
        credited_at: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        let user_id = entry.user_id;
        self.commit(Some(entry), move |state| {
            let record = state
                .deposits
                .iter_mut()
                .find(|d| d.id == deposit_id)
                .ok_or_else(|| SettlementError::Storage(format!("unknown deposit {deposit_id}")))?;
            if record.is_credited() {
                return Err(SettlementError::Storage(format!(
                    "deposit {deposit_id} already credited"
                )));
            }
            record.credited_at = Some(credited_at);
            record.user_id = Some(user_id);
            state.balances.insert(user_id, new_balance);
            Ok(())
        })
        .await
    }

    async fn balance_rows(&self) -> Result<Vec<BalanceRow>, SettlementError> {
        let inner = self.inner.read().await;
        Ok(inner
            .state
            .balances
            .iter()
            .map(|(user_id, balance)| BalanceRow {
                user_id: *user_id,
                balance: balance.to_string(),
            })
            .collect())
    }

    async fn entries_for(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, SettlementError> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_deposit(&self, record: &DepositRecord) -> Result<(), SettlementError> {
        let record = record.clone();
        self.commit(None, move |state| {
            state.deposits.push(record);
            ensure_unique_tx_hashes(&state.deposits)
        })
        .await
    }

    async fn deposit_exists(&self, tx_hash: &str) -> Result<bool, SettlementError> {
        let wanted = normalize_tx_hash(tx_hash);
        let inner = self.inner.read().await;
        Ok(inner
            .state
            .deposits
            .iter()
            .filter_map(|d| d.tx_hash.as_deref())
            .any(|h| normalize_tx_hash(h) == wanted))
    }

    async fn uncredited_deposits(&self) -> Result<Vec<DepositRecord>, SettlementError> {
        let inner = self.inner.read().await;
        Ok(inner
            .state
            .deposits
            .iter()
            .filter(|d| d.kind == DepositKind::Chain && !d.is_credited())
            .cloned()
            .collect())
    }

    async fn link_wallet(&self, user_id: UserId, wallet: Address) -> Result<usize, SettlementError> {
        let mut attached = 0;
        let attached_ref = &mut attached;
        self.commit(None, move |state| {
            if let Some(&linked_to) = state.wallet_links.get(&wallet) {
                if linked_to != user_id {
                    return Err(SettlementError::WalletAlreadyLinked { wallet, linked_to });
                }
            }
            state.wallet_links.insert(wallet, user_id);
            for deposit in state
                .deposits
                .iter_mut()
                .filter(|d| d.is_unclaimed() && !d.is_credited() && d.from == Some(wallet))
            {
                deposit.user_id = Some(user_id);
                *attached_ref += 1;
            }
            Ok(())
        })
        .await?;
        Ok(attached)
    }

    async fn user_for_wallet(&self, wallet: Address) -> Result<Option<UserId>, SettlementError> {
        let inner = self.inner.read().await;
        Ok(inner.state.wallet_links.get(&wallet).copied())
    }

    async fn add_operator_revenue(&self, amount: U256) -> Result<(), SettlementError> {
        self.commit(None, move |state| {
            state.operator_revenue = state
                .operator_revenue
                .checked_add(amount)
                .ok_or(SettlementError::ArithmeticOverflow {
                    context: "operator revenue",
                })?;
            Ok(())
        })
        .await
    }

    async fn operator_revenue(&self) -> Result<U256, SettlementError> {
        Ok(self.inner.read().await.state.operator_revenue)
    }

    async fn is_healthy(&self) -> bool {
        match &self.files {
            Some(files) => files.snapshot.is_healthy().await && files.journal.is_healthy().await,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DepositEvent, EntryKind};

    fn event(hash: &str, from: Address) -> DepositEvent {
        DepositEvent {
            tx_hash: hash.to_string(),
            block_number: 100,
            from,
            amount: U256::from(1_000u64),
        }
    }

    #[tokio::test]
    async fn test_duplicate_hash_rejected_null_hashes_allowed() {
        let store = JsonLedgerStore::in_memory();
        let wallet = Address::repeat_byte(0xaa);

        store
            .insert_deposit(&DepositRecord::from_event(&event("0xABC", wallet), None, Utc::now()))
            .await
            .unwrap();
        let err = store
            .insert_deposit(&DepositRecord::from_event(&event("0xabc", wallet), None, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::DuplicateDepositHash { .. }));

        for _ in 0..3 {
            store
                .insert_deposit(&DepositRecord::admin_credit(1, U256::from(5u64), Utc::now()))
                .await
                .unwrap();
        }
        assert!(store.deposit_exists("0xabc").await.unwrap());
    }

    #[tokio::test]
    async fn test_link_wallet_claims_only_matching_unclaimed() {
        let store = JsonLedgerStore::in_memory();
        let mine = Address::repeat_byte(0x01);
        let other = Address::repeat_byte(0x02);

        for (hash, from) in [("0x1", mine), ("0x2", mine), ("0x3", other)] {
            store
                .insert_deposit(&DepositRecord::from_event(&event(hash, from), None, Utc::now()))
                .await
                .unwrap();
        }

        assert_eq!(store.link_wallet(42, mine).await.unwrap(), 2);
        assert_eq!(store.user_for_wallet(mine).await.unwrap(), Some(42));

        let pending = store.uncredited_deposits().await.unwrap();
        let claimed = pending.iter().filter(|d| d.user_id == Some(42)).count();
        assert_eq!(claimed, 2);
        assert_eq!(pending.iter().filter(|d| d.is_unclaimed()).count(), 1);
    }

    #[tokio::test]
    async fn test_wallet_linked_to_one_user_only() {
        let store = JsonLedgerStore::in_memory();
        let wallet = Address::repeat_byte(0x07);
        store
            .insert_deposit(&DepositRecord::from_event(&event("0x7", wallet), None, Utc::now()))
            .await
            .unwrap();

        assert_eq!(store.link_wallet(1, wallet).await.unwrap(), 1);

        let err = store.link_wallet(2, wallet).await.unwrap_err();
        assert!(matches!(
            err,
            SettlementError::WalletAlreadyLinked { linked_to: 1, .. }
        ));
        assert_eq!(err.code(), "wallet_already_linked");
        assert_eq!(store.user_for_wallet(wallet).await.unwrap(), Some(1));

        let pending = store.uncredited_deposits().await.unwrap();
        assert_eq!(pending[0].user_id, Some(1));

        // Linking again to the same user is a no-op.
        assert_eq!(store.link_wallet(1, wallet).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deposit_credit_is_once_only() {
        let store = JsonLedgerStore::in_memory();
        let record = DepositRecord::from_event(&event("0xfeed", Address::ZERO), Some(7), Utc::now());
        store.insert_deposit(&record).await.unwrap();

        let entry = LedgerEntry::new(7, EntryKind::Deposit, record.amount, record.amount);
        store
            .commit_deposit_credit(record.id, record.amount, &entry, Utc::now())
            .await
            .unwrap();
        assert!(
            store
                .commit_deposit_credit(record.id, record.amount, &entry, Utc::now())
                .await
                .is_err()
        );
        assert_eq!(store.balance(7).await.unwrap(), record.amount);
        assert!(store.uncredited_deposits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();

        {
            let store = JsonLedgerStore::open(&path).await.unwrap();
            let big = U256::from_str_radix("1123456789012345678901234", 10).unwrap();
            let entry = LedgerEntry::new(3, EntryKind::AdminCredit, big, big);
            store.apply_entry(big, &entry).await.unwrap();
            store.link_wallet(3, Address::repeat_byte(0x33)).await.unwrap();
            store.add_operator_revenue(U256::from(9u64)).await.unwrap();
        }

        let store = JsonLedgerStore::open(&path).await.unwrap();
        let rows = store.balance_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].balance, "1123456789012345678901234");
        assert_eq!(store.entries_for(3).await.unwrap().len(), 1);
        assert_eq!(
            store.user_for_wallet(Address::repeat_byte(0x33)).await.unwrap(),
            Some(3)
        );
        assert_eq!(store.operator_revenue().await.unwrap(), U256::from(9u64));
        assert!(store.is_healthy().await);
    }
}
