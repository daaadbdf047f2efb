//! Deposit Monitor - Custody Transfers to Ledger Credits
//!
//! Polls the chain for token transfers into the custody wallet and moves
//! each one through:
//!
//! ```text
//! observed -> recorded (unique tx hash) -> [unclaimed until wallet linked]
//!          -> confirmed (gate passes) -> credited (exactly once)
//! ```
//!
//! `tick` only scans up to the safe head (`head - required_confirmations`)
//! and its cursor never moves past it, so a transfer dropped by a reorg is
//! never recorded and one re-included in a later block is picked up when
//! that block is deep enough.
//!
//! Credits go through the per-user reservation lock like every other
//! balance mutation. Admin credits skip the chain and are credited on
//! creation.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::DepositConfig;
use crate::domain::amount::format_units18;
use crate::domain::{ConfirmationGate, DepositRecord, SettlementError, UserId};
use crate::ports::chain_client::ChainClient;
use crate::ports::ledger_store::LedgerStore;

use super::reservation::BalanceReservations;

/// Outcome of one `scan` over a block range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub recorded: usize,
    pub unclaimed: usize,
    pub duplicates: usize,
}

/// Outcome of one `credit_confirmed` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreditReport {
    pub credited: usize,
    pub amount: U256,
    /// Linked deposits still short of the confirmation depth.
    pub waiting: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub head: u64,
    pub scan: ScanReport,
    pub credit: CreditReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimReport {
    pub attached: usize,
    pub credit: CreditReport,
}

pub struct DepositMonitor<C: ChainClient, S: LedgerStore> {
    chain: Arc<C>,
    reservations: Arc<BalanceReservations<S>>,
    gate: ConfirmationGate,
    max_block_range: u64,
    /// Next block to scan; `None` until the first tick picks a start.
    /// Never ahead of the safe head plus one.
    cursor: Mutex<Option<u64>>,
}

impl<C: ChainClient, S: LedgerStore> DepositMonitor<C, S> {
    pub fn new(
        chain: Arc<C>,
        reservations: Arc<BalanceReservations<S>>,
        config: &DepositConfig,
    ) -> Self {
        Self {
            chain,
            reservations,
            gate: ConfirmationGate::new(config.required_confirmations),
            max_block_range: config.max_block_range.max(1),
            cursor: Mutex::new(config.start_block),
        }
    }

    fn store(&self) -> &Arc<S> {
        self.reservations.store()
    }

    /// Record custody transfers in `[from_block, to_block]`.
    ///
    /// Already-recorded hashes are skipped, never errors: overlapping scans
    /// after a restart are expected.
    #[instrument(skip(self))]
    pub async fn scan(&self, from_block: u64, to_block: u64) -> Result<ScanReport, SettlementError> {
        let mut report = ScanReport::default();
        let mut start = from_block;

        while start <= to_block {
            let end = to_block.min(start.saturating_add(self.max_block_range - 1));
            let events = self.chain.deposit_transfers(start, end).await?;
            debug!(from = start, to = end, events = events.len(), "Scanned block range");

            for event in events {
                if self.store().deposit_exists(&event.tx_hash).await? {
                    report.duplicates += 1;
                    continue;
                }

                let user_id = self.store().user_for_wallet(event.from).await?;
                let record = DepositRecord::from_event(&event, user_id, Utc::now());
                match self.store().insert_deposit(&record).await {
                    Ok(()) => {
                        report.recorded += 1;
                        if user_id.is_none() {
                            report.unclaimed += 1;
                        }
                        info!(
                            tx_hash = %event.tx_hash,
                            block = event.block_number,
                            from = %event.from,
                            user_id = ?user_id,
                            amount = %format_units18(&event.amount),
                            "Deposit recorded"
                        );
                    }
                    Err(SettlementError::DuplicateDepositHash { .. }) => report.duplicates += 1,
                    Err(e) => return Err(e),
                }
            }

            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }

        Ok(report)
    }

    /// Credit every linked, uncredited deposit that passes the gate at `current_block`.
    ///
    /// A failure on one deposit is logged and does not stop the others.
    #[instrument(skip(self))]
    pub async fn credit_confirmed(&self, current_block: u64) -> Result<CreditReport, SettlementError> {
        let mut report = CreditReport::default();

        for record in self.store().uncredited_deposits().await? {
            let (Some(user_id), Some(block)) = (record.user_id, record.block_number) else {
                continue;
            };
            if !self.gate.should_credit(block, current_block) {
                report.waiting += 1;
                debug!(
                    tx_hash = ?record.tx_hash,
                    remaining = self.gate.remaining(block, current_block),
                    "Deposit awaiting confirmations"
                );
                continue;
            }

            match self
                .reservations
                .credit_deposit(user_id, &record, None, Utc::now())
                .await
            {
                Ok(_) => {
                    report.credited += 1;
                    report.amount = report.amount.saturating_add(record.amount);
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        tx_hash = ?record.tx_hash,
                        user_id,
                        error = %e,
                        code = e.code(),
                        "Deposit credit failed"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Link `wallet` to `user_id`, attach its unclaimed deposits and credit
    /// the ones already confirmed.
    #[instrument(skip(self))]
    pub async fn claim_unclaimed(
        &self,
        user_id: UserId,
        wallet: Address,
    ) -> Result<ClaimReport, SettlementError> {
        let attached = self.store().link_wallet(user_id, wallet).await?;
        info!(user_id, wallet = %wallet, attached, "Wallet linked");

        let credit = if attached > 0 {
            let head = self.chain.block_number().await?;
            self.credit_confirmed(head).await?
        } else {
            CreditReport::default()
        };

        Ok(ClaimReport { attached, credit })
    }

    /// One poll: read the head, scan newly confirmed blocks, credit them.
    pub async fn tick(&self) -> Result<TickReport, SettlementError> {
        let head = self.chain.block_number().await?;

        let mut cursor = self.cursor.lock().await;
        let scan = match head.checked_sub(self.gate.required_confirmations) {
            Some(safe_head) if cursor.unwrap_or(safe_head) <= safe_head => {
                let from = cursor.unwrap_or(safe_head);
                let report = self.scan(from, safe_head).await?;
                *cursor = Some(safe_head.saturating_add(1));
                report
            }
            _ => ScanReport::default(),
        };
        drop(cursor);

        let credit = self.credit_confirmed(head).await?;
        if scan.recorded > 0 || credit.credited > 0 {
            info!(
                head,
                recorded = scan.recorded,
                unclaimed = scan.unclaimed,
                credited = credit.credited,
                credited_amount = %format_units18(&credit.amount),
                "Deposit poll complete"
            );
        }

        Ok(TickReport { head, scan, credit })
    }

    /// Operator credit with no on-chain transaction.
    ///
    /// Stored with a null tx hash, which never collides with other records.
    #[instrument(skip(self, memo))]
    pub async fn admin_credit(
        &self,
        user_id: UserId,
        amount: U256,
        memo: &str,
    ) -> Result<U256, SettlementError> {
        if amount.is_zero() {
            return Err(SettlementError::InvalidAmount {
                value: amount.to_string(),
            });
        }

        let record = DepositRecord::admin_credit(user_id, amount, Utc::now());
        self.store().insert_deposit(&record).await?;
        let balance = self
            .reservations
            .credit_deposit(user_id, &record, Some(memo), Utc::now())
            .await?;

        warn!(
            user_id,
            amount = %format_units18(&amount),
            memo,
            "Admin credit applied"
        );
        Ok(balance)
    }
}
