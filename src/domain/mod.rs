//! Domain layer - Core settlement rules and models.
//!
//! Pure logic only (hexagonal architecture inner ring): no I/O, no clocks
//! except where a timestamp is passed in. Every amount is an exact `U256`
//! in the token's smallest unit.

pub mod amount;
pub mod confirmation;
pub mod deposit;
pub mod error;
pub mod gas;
pub mod ledger;
pub mod price;
pub mod reserve;

// Re-export core types for convenience
pub use confirmation::{ConfirmationGate, should_credit};
pub use deposit::{DepositEvent, DepositKind, DepositRecord, ensure_unique_tx_hashes};
pub use error::SettlementError;
pub use gas::{FeeData, GasReceipt, GasSettlement, compute_cost};
pub use ledger::{BalanceRow, EntryKind, LedgerEntry, LedgerSnapshot, UserId, reconcile};
pub use price::{PriceQuote, rate_from_reserves};
pub use reserve::check_swap_possible;
