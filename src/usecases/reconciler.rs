//! Ledger Reconciler - Scheduled Audit of Off-chain Balances
//!
//! Sums every user balance exactly and compares it to what custody should
//! be holding on their behalf:
//!
//! ```text
//! expected = custody token balance
//!          - uncredited deposits (on-chain, not yet owed to anyone)
//!          - retained operator revenue (task charges kept in custody)
//! ```
//!
//! A mismatch is reported, never auto-corrected.

use std::sync::Arc;

use alloy::primitives::U256;
use tracing::{error, info, instrument};

use crate::domain::amount::format_units18;
use crate::domain::{LedgerSnapshot, SettlementError, reconcile};
use crate::ports::chain_client::ChainClient;
use crate::ports::ledger_store::LedgerStore;

pub struct LedgerAuditor<C: ChainClient, S: LedgerStore> {
    chain: Arc<C>,
    store: Arc<S>,
}

impl<C: ChainClient, S: LedgerStore> LedgerAuditor<C, S> {
    pub const fn new(chain: Arc<C>, store: Arc<S>) -> Self {
        Self { chain, store }
    }

    /// Backing the ledger total must equal.
    pub async fn expected_total(&self) -> Result<U256, SettlementError> {
        let custody = self.chain.custody_token_balance().await?;
        let pending = self
            .store
            .uncredited_deposits()
            .await?
            .iter()
            .fold(U256::ZERO, |acc, d| acc.saturating_add(d.amount));
        let revenue = self.store.operator_revenue().await?;

        Ok(custody.saturating_sub(pending).saturating_sub(revenue))
    }

    /// One audit pass.
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> Result<LedgerSnapshot, SettlementError> {
        let expected = self.expected_total().await?;
        let rows = self.store.balance_rows().await?;
        let balances: Vec<&str> = rows.iter().map(|r| r.balance.as_str()).collect();

        match reconcile(&balances, expected) {
            Ok(snapshot) => {
                info!(
                    total = %format_units18(&snapshot.total),
                    accounts = snapshot.accounts,
                    "Ledger reconciled"
                );
                Ok(snapshot)
            }
            Err(e) => {
                error!(error = %e, code = e.code(), accounts = rows.len(), "Ledger reconciliation failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy::primitives::Address;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::adapters::persistence::JsonLedgerStore;
    use crate::domain::{DepositEvent, DepositRecord, EntryKind, FeeData, GasReceipt, LedgerEntry};
    use crate::ports::chain_client::OperatorBalances;

    struct Custody(U256);

    #[async_trait]
    impl ChainClient for Custody {
        async fn block_number(&self) -> Result<u64, SettlementError> {
            Ok(0)
        }
        async fn receipt(&self, _tx_hash: &str) -> Result<Option<GasReceipt>, SettlementError> {
            Ok(None)
        }
        async fn fee_data(&self) -> Result<FeeData, SettlementError> {
            Ok(FeeData::default())
        }
        async fn deposit_transfers(
            &self,
            _from_block: u64,
            _to_block: u64,
        ) -> Result<Vec<DepositEvent>, SettlementError> {
            Ok(Vec::new())
        }
        async fn custody_token_balance(&self) -> Result<U256, SettlementError> {
            Ok(self.0)
        }
        async fn operator_balances(&self) -> Result<OperatorBalances, SettlementError> {
            Ok(OperatorBalances {
                native: U256::ZERO,
                token: U256::ZERO,
            })
        }
        async fn is_healthy(&self) -> bool {
            true
        }
    }

    fn big(v: &str) -> U256 {
        U256::from_str_radix(v, 10).unwrap()
    }

    async fn credit(store: &JsonLedgerStore, user: u64, amount: U256) {
        let entry = LedgerEntry::new(user, EntryKind::AdminCredit, amount, amount);
        store.apply_entry(amount, &entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_large_balances_reconcile_exactly() {
        let store = Arc::new(JsonLedgerStore::in_memory());
        credit(&store, 1, big("1000000000000000000000000")).await;
        credit(&store, 2, big("123456789012345678901234")).await;
        credit(&store, 3, U256::ZERO).await;

        let auditor = LedgerAuditor::new(
            Arc::new(Custody(big("1123456789012345678901234"))),
            store,
        );
        let snapshot = auditor.run_pass().await.unwrap();
        assert_eq!(snapshot.total, big("1123456789012345678901234"));
        assert_eq!(snapshot.accounts, 3);
    }

    #[tokio::test]
    async fn test_pending_deposits_and_revenue_excluded() {
        let store = Arc::new(JsonLedgerStore::in_memory());
        credit(&store, 1, U256::from(700u64)).await;
        store.add_operator_revenue(U256::from(50u64)).await.unwrap();
        let pending = DepositRecord::from_event(
            &DepositEvent {
                tx_hash: "0xpending".to_string(),
                block_number: 10,
                from: Address::ZERO,
                amount: U256::from(250u64),
            },
            None,
            Utc::now(),
        );
        store.insert_deposit(&pending).await.unwrap();

        let auditor = LedgerAuditor::new(Arc::new(Custody(U256::from(1_000u64))), store);
        assert_eq!(auditor.expected_total().await.unwrap(), U256::from(700u64));
        assert!(auditor.run_pass().await.is_ok());
    }

    #[tokio::test]
    async fn test_mismatch_reported_with_both_totals() {
        let store = Arc::new(JsonLedgerStore::in_memory());
        credit(&store, 1, U256::from(500u64)).await;

        let auditor = LedgerAuditor::new(Arc::new(Custody(U256::from(400u64))), store);
        match auditor.run_pass().await.unwrap_err() {
            SettlementError::ReconciliationMismatch { computed, expected } => {
                assert_eq!(computed, U256::from(500u64));
                assert_eq!(expected, U256::from(400u64));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
