//! Mining Ledger - Library Root
//!
//! Off-chain settlement and reconciliation for a pay-per-task mining
//! service. Re-exports all modules for the binary, integration tests
//! and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
