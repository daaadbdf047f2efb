//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain rules with port interfaces to implement the
//! engine's workflows. Each use case is a self-contained operation.
//!
//! Use cases:
//! - `PriceOracle`: Cached exchange rate with stale fallback
//! - `GasAccountant`: Receipt settlement and estimates in token units
//! - `BalanceReservations`: Per-user locked balance mutations
//! - `DepositMonitor`: Custody transfers through the confirmation gate
//! - `LedgerAuditor`: Exact reconciliation against custody
//! - `FloatManager`: Reserve-guarded gas float top-ups
//! - `TaskBilling`: Estimate, reserve, submit, settle

pub mod deposit_monitor;
pub mod float_manager;
pub mod gas_accounting;
pub mod price_oracle;
pub mod reconciler;
pub mod reservation;
pub mod task_billing;

pub use deposit_monitor::DepositMonitor;
pub use float_manager::{FloatManager, SwapPlan};
pub use gas_accounting::GasAccountant;
pub use price_oracle::PriceOracle;
pub use reconciler::LedgerAuditor;
pub use reservation::{BalanceReservations, PendingReservation};
pub use task_billing::{TaskBilling, TaskInvoice};
