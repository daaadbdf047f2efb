//! Balance Reservation Lock - Per-user Serialized Balance Mutation
//!
//! Every write to a user's balance happens while holding that user's
//! lock, so two task submissions racing for the same funds can never both
//! pass the balance check (no double-spend).
//!
//! Per-user state machine: UNLOCKED -> LOCKED on acquisition, LOCKED ->
//! UNLOCKED when the guard drops (success, error, panic or cancellation).
//! Locks are one `tokio::sync::Mutex` per user key; tokio mutexes are
//! FIFO-fair, so waiters acquire in arrival order. Different users never
//! contend. Waiting is bounded by `lock_timeout`.
//!
//! Funds are debited before the reserved action runs. A failed action is
//! not refunded here: the error carries the debited amount and the caller
//! decides whether to call [`BalanceReservations::refund`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::amount::format_units18;
use crate::domain::{DepositKind, DepositRecord, EntryKind, LedgerEntry, SettlementError, UserId};
use crate::ports::ledger_store::LedgerStore;

/// Funds held by an in-flight submission. Lives only while the lock is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReservation {
    pub id: Uuid,
    pub user_id: UserId,
    pub amount: U256,
    pub acquired_at: DateTime<Utc>,
}

/// Result of a partial debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDebit {
    pub charged: U256,
    pub uncollected: U256,
    pub balance_after: U256,
}

/// Per-user balance lock table over a [`LedgerStore`].
pub struct BalanceReservations<S: LedgerStore> {
    store: Arc<S>,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
    lock_timeout: Duration,
}

impl<S: LedgerStore> BalanceReservations<S> {
    pub fn new(store: Arc<S>, lock_timeout: Duration) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            lock_timeout,
        }
    }

    /// Shared store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Acquire the user's lock, waiting at most `lock_timeout`.
    async fn lock_user(&self, user_id: UserId) -> Result<OwnedMutexGuard<()>, SettlementError> {
        // Clone the Arc out so the map shard is not held across the await.
        let lock = Arc::clone(
            self.locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| SettlementError::LockTimeout {
                user_id,
                waited_ms: u64::try_from(self.lock_timeout.as_millis()).unwrap_or(u64::MAX),
            })
    }

    /// Current balance, read under the user's lock.
    pub async fn balance(&self, user_id: UserId) -> Result<U256, SettlementError> {
        let _guard = self.lock_user(user_id).await?;
        self.store.balance(user_id).await
    }

    /// Debit `cost` and run `action` while holding the user's lock.
    ///
    /// Fails with `InsufficientBalance` (nothing debited) if the balance
    /// read after acquiring the lock is below `cost`. If `action` fails the
    /// debit stands and `SubmissionFailed` reports it.
    #[instrument(skip(self, action), fields(cost = %cost))]
    pub async fn submit_with_reserved_funds<T, F, Fut>(
        &self,
        user_id: UserId,
        cost: U256,
        action: F,
    ) -> Result<T, SettlementError>
    where
        F: FnOnce(PendingReservation) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
        T: Send,
    {
        let _guard = self.lock_user(user_id).await?;

        let balance = self.store.balance(user_id).await?;
        if balance < cost {
            warn!(
                user_id,
                balance = %format_units18(&balance),
                required = %format_units18(&cost),
                "Reservation denied: insufficient balance"
            );
            return Err(SettlementError::InsufficientBalance {
                user_id,
                balance,
                required: cost,
            });
        }

        let reservation = PendingReservation {
            id: Uuid::new_v4(),
            user_id,
            amount: cost,
            acquired_at: Utc::now(),
        };

        let balance_after = balance - cost;
        let entry = LedgerEntry::new(user_id, EntryKind::TaskCharge, cost, balance_after)
            .with_memo(format!("reservation {}", reservation.id));
        self.store.apply_entry(balance_after, &entry).await?;

        info!(
            user_id,
            reservation = %reservation.id,
            amount = %format_units18(&cost),
            balance_after = %format_units18(&balance_after),
            "Funds reserved"
        );

        action(reservation).await.map_err(|e| {
            warn!(user_id, error = %e, "Reserved action failed; debit kept for caller compensation");
            SettlementError::SubmissionFailed {
                user_id,
                debited: cost,
                reason: format!("{e:#}"),
                refund_error: None,
            }
        })
    }

    /// Add `amount` to the user's balance and journal it as `kind`.
    #[instrument(skip(self, entry_builder))]
    pub async fn credit<B>(
        &self,
        user_id: UserId,
        amount: U256,
        kind: EntryKind,
        entry_builder: B,
    ) -> Result<U256, SettlementError>
    where
        B: FnOnce(LedgerEntry) -> LedgerEntry + Send,
    {
        let _guard = self.lock_user(user_id).await?;

        let balance = self.store.balance(user_id).await?;
        let balance_after = balance
            .checked_add(amount)
            .ok_or(SettlementError::ArithmeticOverflow { context: "credit" })?;
        let entry = entry_builder(LedgerEntry::new(user_id, kind, amount, balance_after));
        self.store.apply_entry(balance_after, &entry).await?;

        info!(
            user_id,
            kind = ?kind,
            amount = %format_units18(&amount),
            balance_after = %format_units18(&balance_after),
            "Balance credited"
        );
        Ok(balance_after)
    }

    /// Compensate a previous charge.
    pub async fn refund(
        &self,
        user_id: UserId,
        amount: U256,
        task_id: Option<&str>,
        memo: &str,
    ) -> Result<U256, SettlementError> {
        let task_id = task_id.map(str::to_string);
        let memo = memo.to_string();
        self.credit(user_id, amount, EntryKind::Refund, move |entry| {
            let entry = entry.with_memo(memo);
            match task_id {
                Some(task) => entry.with_task(task),
                None => entry,
            }
        })
        .await
    }

    /// Credit a recorded deposit and stamp `credited_at`, under the lock.
    #[instrument(skip(self, record, memo), fields(deposit = %record.id))]
    pub async fn credit_deposit(
        &self,
        user_id: UserId,
        record: &DepositRecord,
        memo: Option<&str>,
        credited_at: DateTime<Utc>,
    ) -> Result<U256, SettlementError> {
        let _guard = self.lock_user(user_id).await?;

        let balance = self.store.balance(user_id).await?;
        let balance_after = balance
            .checked_add(record.amount)
            .ok_or(SettlementError::ArithmeticOverflow {
                context: "deposit credit",
            })?;

        let kind = match record.kind {
            DepositKind::Chain => EntryKind::Deposit,
            DepositKind::AdminCredit => EntryKind::AdminCredit,
        };
        let mut entry = LedgerEntry::new(user_id, kind, record.amount, balance_after);
        if let Some(hash) = &record.tx_hash {
            entry = entry.with_tx_hash(hash.clone());
        }
        if let Some(memo) = memo {
            entry = entry.with_memo(memo);
        }

        self.store
            .commit_deposit_credit(record.id, balance_after, &entry, credited_at)
            .await?;

        info!(
            user_id,
            amount = %format_units18(&record.amount),
            balance_after = %format_units18(&balance_after),
            "Deposit credited"
        );
        Ok(balance_after)
    }

    /// Debit as much of `amount` as the balance allows.
    ///
    /// Used to collect a cost overrun after the fact; never fails on
    /// insufficient funds, it reports what stayed uncollected.
    pub async fn debit_up_to(
        &self,
        user_id: UserId,
        amount: U256,
        task_id: &str,
    ) -> Result<PartialDebit, SettlementError> {
        let _guard = self.lock_user(user_id).await?;

        let balance = self.store.balance(user_id).await?;
        let charged = amount.min(balance);
        let balance_after = balance - charged;

        if !charged.is_zero() {
            let entry = LedgerEntry::new(user_id, EntryKind::GasAdjustment, charged, balance_after)
                .with_task(task_id);
            self.store.apply_entry(balance_after, &entry).await?;
        }

        Ok(PartialDebit {
            charged,
            uncollected: amount - charged,
            balance_after,
        })
    }
}
