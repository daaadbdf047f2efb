//! Ledger entries and exact reconciliation.
//!
//! Balances routinely exceed 2^53, so every aggregate is a `U256` sum.
//! Summing through `f64` (or a database `SUM()` that returns a double) is a
//! correctness bug here, not a rounding detail.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::amount::parse_amount;
use super::error::SettlementError;

/// Ledger account owner (the chat-platform user id).
pub type UserId = u64;

/// Kind of balance movement recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deposit,
    AdminCredit,
    /// Pessimistic debit taken when a task is reserved.
    TaskCharge,
    /// Extra charge when the real gas cost exceeded the estimate.
    GasAdjustment,
    Refund,
}

impl EntryKind {
    pub const fn is_credit(self) -> bool {
        matches!(self, Self::Deposit | Self::AdminCredit | Self::Refund)
    }
}

/// One append-only journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: EntryKind,
    pub amount: U256,
    pub balance_after: U256,
    pub tx_hash: Option<String>,
    pub task_id: Option<String>,
    pub memo: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(user_id: UserId, kind: EntryKind, amount: U256, balance_after: U256) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            amount,
            balance_after,
            tx_hash: None,
            task_id: None,
            memo: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    #[must_use]
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// A balance row as the store returns it: the amount as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub user_id: UserId,
    pub balance: String,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub total: U256,
    pub expected: U256,
    pub accounts: usize,
    pub taken_at: DateTime<Utc>,
}

/// Exact sum of decimal balance strings. Zero terms are ordinary terms.
pub fn sum_balances<I, S>(balances: I) -> Result<U256, SettlementError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    balances.into_iter().try_fold(U256::ZERO, |acc, raw| {
        let value = parse_amount(raw.as_ref())?;
        acc.checked_add(value)
            .ok_or(SettlementError::ArithmeticOverflow {
                context: "ledger total",
            })
    })
}

/// Sum `balances` and compare against the independently derived `expected`.
pub fn reconcile<S: AsRef<str>>(
    balances: &[S],
    expected: U256,
) -> Result<LedgerSnapshot, SettlementError> {
    let total = sum_balances(balances)?;
    if total != expected {
        return Err(SettlementError::ReconciliationMismatch {
            computed: total,
            expected,
        });
    }
    Ok(LedgerSnapshot {
        total,
        expected,
        accounts: balances.len(),
        taken_at: Utc::now(),
    })
}
