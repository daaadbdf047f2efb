//! Task Billing - Pay-per-task Settlement Flow
//!
//! A task costs the model fee plus the gas the operator spends submitting
//! it, both charged in the mined token:
//!
//! 1. Estimate: model fee + estimated gas at current fees and rate
//! 2. Reserve the estimate under the user's lock and submit the task
//! 3. Settle against the real receipt
//! 4. Refund an over-estimate, or charge the shortfall as far as the
//!    balance allows and report the rest as uncollected
//!
//! If the receipt is not available yet or cannot be priced, the estimate
//! stands as the final charge.
//!
//! Once a task is submitted, ledger failures no longer abort billing: the
//! invoice records what is still owed in either direction and the
//! failure is logged at error level for an operator to settle.

use std::sync::Arc;

use alloy::primitives::U256;
use tracing::{error, info, instrument, warn};

use crate::domain::amount::format_units18;
use crate::domain::{GasSettlement, SettlementError, UserId};
use crate::ports::chain_client::ChainClient;
use crate::ports::ledger_store::LedgerStore;
use crate::ports::price_source::PriceSource;
use crate::ports::task_submitter::TaskSubmitter;

use super::gas_accounting::GasAccountant;
use super::reservation::BalanceReservations;

/// Final accounting for one submitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInvoice {
    pub task_id: String,
    pub tx_hash: String,
    pub user_id: UserId,
    pub model_fee: U256,
    pub estimated_gas: U256,
    pub estimated_total: U256,
    /// `None` when the estimate stood in for the settled cost.
    pub settlement: Option<GasSettlement>,
    pub actual_total: U256,
    pub refunded: U256,
    pub extra_charged: U256,
    pub uncollected: U256,
    /// Excess the user is owed but that could not be refunded.
    pub pending_refund: U256,
    /// Set when the charge could not be added to operator revenue.
    pub revenue_pending: bool,
}

impl TaskInvoice {
    /// What the user paid in the end.
    pub fn net_charged(&self) -> U256 {
        self.estimated_total - self.refunded + self.extra_charged
    }

    /// True when a refund or revenue entry still has to be applied by hand.
    pub fn needs_compensation(&self) -> bool {
        !self.pending_refund.is_zero() || self.revenue_pending
    }
}

pub struct TaskBilling<C, P, S, T>
where
    C: ChainClient,
    P: PriceSource,
    S: LedgerStore,
    T: TaskSubmitter,
{
    chain: Arc<C>,
    accountant: Arc<GasAccountant<P>>,
    reservations: Arc<BalanceReservations<S>>,
    submitter: Arc<T>,
    submit_gas_estimate: u64,
}

impl<C, P, S, T> TaskBilling<C, P, S, T>
where
    C: ChainClient,
    P: PriceSource,
    S: LedgerStore,
    T: TaskSubmitter,
{
    pub const fn new(
        chain: Arc<C>,
        accountant: Arc<GasAccountant<P>>,
        reservations: Arc<BalanceReservations<S>>,
        submitter: Arc<T>,
        submit_gas_estimate: u64,
    ) -> Self {
        Self {
            chain,
            accountant,
            reservations,
            submitter,
            submit_gas_estimate,
        }
    }

    /// Token amount reserved before submitting a task.
    pub async fn estimate(&self, model_fee: U256) -> Result<(U256, U256), SettlementError> {
        let fees = self.chain.fee_data().await?;
        let gas = self.accountant.estimate(self.submit_gas_estimate, &fees).await?;
        let total = model_fee
            .checked_add(gas)
            .ok_or(SettlementError::ArithmeticOverflow {
                context: "task estimate",
            })?;
        Ok((gas, total))
    }

    /// Reserve, submit, settle and adjust.
    ///
    /// A failed submission is refunded in full and the original error is
    /// returned, carrying the refund failure if the refund did not apply.
    #[instrument(skip(self), fields(model_fee = %model_fee))]
    pub async fn bill_task(
        &self,
        user_id: UserId,
        model_fee: U256,
    ) -> Result<TaskInvoice, SettlementError> {
        let (estimated_gas, estimated_total) = self.estimate(model_fee).await?;

        let submitter = Arc::clone(&self.submitter);
        let submitted = match self
            .reservations
            .submit_with_reserved_funds(user_id, estimated_total, move |_reservation| async move {
                submitter.submit(user_id, model_fee).await
            })
            .await
        {
            Ok(task) => task,
            Err(SettlementError::SubmissionFailed {
                user_id,
                debited,
                reason,
                ..
            }) => {
                let refund_error = match self
                    .reservations
                    .refund(user_id, debited, None, "task submission failed")
                    .await
                {
                    Ok(_) => None,
                    Err(refund_err) => {
                        error!(
                            user_id,
                            debited = %format_units18(&debited),
                            error = %refund_err,
                            "Refund after failed submission did not apply; debit stands"
                        );
                        Some(Box::new(refund_err))
                    }
                };
                return Err(SettlementError::SubmissionFailed {
                    user_id,
                    debited,
                    reason,
                    refund_error,
                });
            }
            Err(e) => return Err(e),
        };

        let settlement = self.settle_gas(&submitted.tx_hash).await;
        let actual_total = settlement
            .as_ref()
            .and_then(|s| model_fee.checked_add(s.gas_cost_token))
            .unwrap_or(estimated_total);

        let mut invoice = TaskInvoice {
            task_id: submitted.task_id.clone(),
            tx_hash: submitted.tx_hash.clone(),
            user_id,
            model_fee,
            estimated_gas,
            estimated_total,
            settlement,
            actual_total,
            refunded: U256::ZERO,
            extra_charged: U256::ZERO,
            uncollected: U256::ZERO,
            pending_refund: U256::ZERO,
            revenue_pending: false,
        };

        if estimated_total > actual_total {
            let excess = estimated_total - actual_total;
            match self
                .reservations
                .refund(user_id, excess, Some(&submitted.task_id), "gas estimate excess")
                .await
            {
                Ok(_) => invoice.refunded = excess,
                Err(e) => {
                    error!(
                        user_id,
                        task_id = %submitted.task_id,
                        pending_refund = %format_units18(&excess),
                        error = %e,
                        "Excess refund failed; owed to user"
                    );
                    invoice.pending_refund = excess;
                }
            }
        } else if actual_total > estimated_total {
            let shortfall = actual_total - estimated_total;
            match self
                .reservations
                .debit_up_to(user_id, shortfall, &submitted.task_id)
                .await
            {
                Ok(debit) => {
                    invoice.extra_charged = debit.charged;
                    invoice.uncollected = debit.uncollected;
                }
                Err(e) => {
                    error!(
                        user_id,
                        task_id = %submitted.task_id,
                        error = %e,
                        "Gas overrun debit failed"
                    );
                    invoice.uncollected = shortfall;
                }
            }
            if !invoice.uncollected.is_zero() {
                warn!(
                    user_id,
                    task_id = %submitted.task_id,
                    uncollected = %format_units18(&invoice.uncollected),
                    "Gas overrun not fully collected"
                );
            }
        }

        if let Err(e) = self
            .reservations
            .store()
            .add_operator_revenue(invoice.net_charged())
            .await
        {
            error!(
                user_id,
                task_id = %invoice.task_id,
                revenue = %format_units18(&invoice.net_charged()),
                error = %e,
                "Operator revenue not recorded"
            );
            invoice.revenue_pending = true;
        }

        info!(
            user_id,
            task_id = %invoice.task_id,
            estimated = %format_units18(&invoice.estimated_total),
            actual = %format_units18(&invoice.actual_total),
            refunded = %format_units18(&invoice.refunded),
            extra = %format_units18(&invoice.extra_charged),
            "Task billed"
        );
        Ok(invoice)
    }

    async fn settle_gas(&self, tx_hash: &str) -> Option<GasSettlement> {
        let receipt = match self.chain.receipt(tx_hash).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => {
                warn!(tx_hash, "Receipt not available; estimate stands");
                return None;
            }
            Err(e) => {
                warn!(tx_hash, error = %e, "Receipt fetch failed; estimate stands");
                return None;
            }
        };

        match self.accountant.settle(&receipt).await {
            Ok(settlement) => Some(settlement),
            Err(e) => {
                warn!(tx_hash, error = %e, code = e.code(), "Gas settlement failed; estimate stands");
                None
            }
        }
    }
}
