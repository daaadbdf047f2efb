//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (EVM RPC, file I/O, HTTP). Each sub-module
//! groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `chain`: Settlement chain and AMM pair access via alloy-rs
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: JSON ledger snapshot and JSONL journal

pub mod chain;
pub mod metrics;
pub mod persistence;
