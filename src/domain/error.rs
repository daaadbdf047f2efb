//! Settlement error taxonomy.
//!
//! Every failure the engine can surface is a distinct variant carrying the
//! amounts involved, so callers can render user messaging and operator
//! alerts without re-querying state. Amounts are always exact integers in
//! the smallest unit; `Display` renders them in human (18-decimal) units.

use alloy::primitives::{Address, U256};
use thiserror::Error;

use super::amount::format_units18;
use super::ledger::UserId;

/// Errors produced by the settlement and reconciliation engine.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// No usable price: the live fetch failed and the cache is empty or too old.
    #[error("price oracle unavailable and no cached price available: {source}")]
    OracleUnavailable {
        #[source]
        source: Box<SettlementError>,
    },

    /// The priced pair has an empty side; the rate would divide by zero.
    #[error(
        "pool has no liquidity: token reserve {token_reserve}, native reserve {native_reserve}"
    )]
    NoLiquidity {
        token_reserve: U256,
        native_reserve: U256,
    },

    /// The receipt carries no usable gas price.
    #[error("cannot determine gas price from transaction receipt (gas used {gas_used})")]
    IndeterminateGasPrice { gas_used: U256 },

    /// Swap guard: the balance is already under the protected reserve.
    #[error(
        "balance {} is below minimum reserve {} (short by {})",
        format_units18(.balance),
        format_units18(.reserve),
        format_units18(.shortfall)
    )]
    BelowMinimumReserve {
        balance: U256,
        reserve: U256,
        shortfall: U256,
    },

    /// Swap guard: the swap would dip into the protected reserve.
    #[error(
        "cannot swap: need {}, only {} available after reserve",
        format_units18(.requested),
        format_units18(.available)
    )]
    InsufficientAvailableAfterReserve { available: U256, requested: U256 },

    /// Reservation denied: the balance read under the lock does not cover the cost.
    #[error(
        "insufficient balance for user {user_id}: has {}, needs {}",
        format_units18(.balance),
        format_units18(.required)
    )]
    InsufficientBalance {
        user_id: UserId,
        balance: U256,
        required: U256,
    },

    /// Ledger audit failure.
    #[error("ledger total {computed} does not match expected {expected}")]
    ReconciliationMismatch { computed: U256, expected: U256 },

    /// A non-null transaction hash was recorded twice.
    #[error("deposit with tx hash {tx_hash} already recorded")]
    DuplicateDepositHash { tx_hash: String },

    /// The wallet already belongs to another account.
    #[error("wallet {wallet} already linked to user {linked_to}")]
    WalletAlreadyLinked { wallet: Address, linked_to: UserId },

    /// The per-user lock could not be acquired within the configured bound.
    #[error("timed out after {waited_ms}ms waiting for balance lock of user {user_id}")]
    LockTimeout { user_id: UserId, waited_ms: u64 },

    /// The reserved action failed after the debit was applied.
    ///
    /// `refund_error` is set when compensating the debit failed too; the
    /// debit then still stands.
    #[error(
        "submission for user {user_id} failed after debiting {}: {reason}",
        format_units18(.debited)
    )]
    SubmissionFailed {
        user_id: UserId,
        debited: U256,
        reason: String,
        #[source]
        refund_error: Option<Box<SettlementError>>,
    },

    /// A stored or supplied amount is not a non-negative base-10 integer.
    #[error("invalid amount: {value:?}")]
    InvalidAmount { value: String },

    /// 256-bit arithmetic overflowed.
    #[error("arithmetic overflow while computing {context}")]
    ArithmeticOverflow { context: &'static str },

    /// Chain RPC failure.
    #[error("chain client error: {0}")]
    Chain(String),

    /// Ledger store failure.
    #[error("ledger store error: {0}")]
    Storage(String),
}

impl SettlementError {
    /// Wrap an RPC-layer failure, keeping the full context chain.
    pub fn chain(err: impl std::fmt::Display) -> Self {
        Self::Chain(format!("{err:#}"))
    }

    /// Wrap a persistence failure, keeping the full context chain.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    /// Stable short code used for metric labels and log fields.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::OracleUnavailable { .. } => "oracle_unavailable",
            Self::NoLiquidity { .. } => "no_liquidity",
            Self::IndeterminateGasPrice { .. } => "indeterminate_gas_price",
            Self::BelowMinimumReserve { .. } => "below_minimum_reserve",
            Self::InsufficientAvailableAfterReserve { .. } => "insufficient_after_reserve",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::ReconciliationMismatch { .. } => "reconciliation_mismatch",
            Self::DuplicateDepositHash { .. } => "duplicate_deposit_hash",
            Self::WalletAlreadyLinked { .. } => "wallet_already_linked",
            Self::LockTimeout { .. } => "lock_timeout",
            Self::SubmissionFailed { .. } => "submission_failed",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::ArithmeticOverflow { .. } => "arithmetic_overflow",
            Self::Chain(_) => "chain",
            Self::Storage(_) => "storage",
        }
    }
}
