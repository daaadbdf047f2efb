//! Task Submitter Port - Outbound Task Transactions
//!
//! Sending the actual task transaction is owned by the mining bot; the
//! billing flow only needs the resulting task id and transaction hash.

use alloy::primitives::U256;
use async_trait::async_trait;

use crate::domain::UserId;

/// Outcome of a successful on-chain task submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTask {
  /// Task identifier assigned by the mining contract.
  pub task_id: String,
  /// Hash of the submitting transaction.
  pub tx_hash: String,
}

/// Submits a paid task on behalf of a user.
#[async_trait]
pub trait TaskSubmitter: Send + Sync + 'static {
  /// Submit the task. Called while the user's funds are reserved.
  async fn submit(&self, user_id: UserId, model_fee: U256) -> anyhow::Result<SubmittedTask>;
}
