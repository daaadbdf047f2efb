//! Deposit confirmation gate.
//!
//! A deposit is only credited once enough blocks have been mined on top of
//! it that a reorganization is no longer a practical risk.

use serde::{Deserialize, Serialize};

/// Confirmation depth used when none is configured.
pub const DEFAULT_REQUIRED_CONFIRMATIONS: u64 = 12;

/// `current_block - deposit_block >= required`.
///
/// A head behind the deposit block (e.g. a lagging RPC node) is never creditable.
pub const fn should_credit(deposit_block: u64, current_block: u64, required: u64) -> bool {
    match current_block.checked_sub(deposit_block) {
        Some(confirmations) => confirmations >= required,
        None => false,
    }
}

/// Configured gate; a thin holder for the trust parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationGate {
    pub required_confirmations: u64,
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self {
            required_confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
        }
    }
}

impl ConfirmationGate {
    pub const fn new(required_confirmations: u64) -> Self {
        Self {
            required_confirmations,
        }
    }

    pub const fn should_credit(&self, deposit_block: u64, current_block: u64) -> bool {
        should_credit(deposit_block, current_block, self.required_confirmations)
    }

    /// Blocks still missing before `deposit_block` becomes creditable.
    pub const fn remaining(&self, deposit_block: u64, current_block: u64) -> u64 {
        let target = deposit_block.saturating_add(self.required_confirmations);
        target.saturating_sub(current_block)
    }
}
