//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `ChainClient`: Blocks, receipts, fee data, custody transfers
//! - `PriceSource`: Live token/native exchange rate
//! - `LedgerStore`: Balances, journal, deposits, wallet links
//! - `TaskSubmitter`: Outbound paid task transactions

pub mod chain_client;
pub mod ledger_store;
pub mod price_source;
pub mod task_submitter;
