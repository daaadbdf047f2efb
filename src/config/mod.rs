//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides for RPC endpoints.
//! Every trust parameter (cache windows, confirmation depth, reserves)
//! is externalized here - nothing is hardcoded in the domain layer.

pub mod loader;

use std::time::Duration;

use alloy::primitives::{Address, U256};
use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::SettlementError;
use crate::domain::amount::decimal_to_units;

/// Top-level engine configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any component is wired.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Settlement chain (where deposits and tasks live).
  pub chain: ChainConfig,
  /// Exchange rate oracle.
  pub oracle: OracleConfig,
  /// Deposit monitoring and confirmation depth.
  pub deposits: DepositConfig,
  /// Operator float and protected reserve.
  pub reserve: ReserveConfig,
  /// Task billing and reservation locking.
  pub billing: BillingConfig,
  /// Ledger audit schedule.
  pub reconciliation: ReconciliationConfig,
  /// Metrics and monitoring.
  pub metrics: MetricsConfig,
  /// Persistence configuration.
  pub persistence: PersistenceConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Settlement chain configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  /// RPC endpoint (overridable via `MINING_LEDGER_RPC_URL`).
  pub rpc_url: String,
  /// Expected chain id, checked at startup.
  pub chain_id: u64,
  /// Mined token (ERC-20) contract.
  pub token_address: Address,
  /// Wallet receiving user deposits.
  pub custody_wallet: Address,
  /// Wallet paying gas for task submissions.
  pub operator_wallet: Address,
}

/// Exchange rate oracle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
  /// RPC endpoint of the chain hosting the AMM pair
  /// (overridable via `MINING_LEDGER_ORACLE_RPC_URL`).
  pub rpc_url: String,
  /// Constant-product pair (token / wrapped native).
  pub pair_address: Address,
  /// Token address on the oracle chain (identifies the pair side).
  pub token_address: Address,
  /// Serve cached quotes without network access for this long.
  #[serde(default = "default_fresh_window")]
  pub fresh_window_secs: u64,
  /// Fall back to a cached quote on fetch failure up to this age.
  #[serde(default = "default_stale_window")]
  pub stale_window_secs: u64,
}

/// Deposit monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DepositConfig {
  /// Blocks mined on top of a deposit before it is credited.
  #[serde(default = "default_confirmations")]
  pub required_confirmations: u64,
  /// Poll interval (milliseconds).
  #[serde(default = "default_poll_interval")]
  pub poll_interval_ms: u64,
  /// First block to scan; defaults to the head at startup.
  pub start_block: Option<u64>,
  /// Maximum blocks per log query.
  #[serde(default = "default_max_block_range")]
  pub max_block_range: u64,
}

/// Operator float and reserve configuration (human token units).
#[derive(Debug, Clone, Deserialize)]
pub struct ReserveConfig {
  /// Tokens the float manager must never swap away.
  pub min_token_reserve: Decimal,
  /// Native float below which a top-up is planned.
  pub min_native_float: Decimal,
  /// Native float a top-up aims for.
  pub target_native_float: Decimal,
  /// How often the float is checked (seconds).
  #[serde(default = "default_float_interval")]
  pub check_interval_secs: u64,
}

/// Task billing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
  /// Gas units assumed for a task submission when estimating.
  #[serde(default = "default_submit_gas")]
  pub submit_gas_estimate: u64,
  /// Bound on waiting for a user's balance lock (milliseconds).
  #[serde(default = "default_lock_timeout")]
  pub lock_timeout_ms: u64,
}

/// Ledger audit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
  /// Seconds between reconciliation passes.
  #[serde(default = "default_reconcile_interval")]
  pub interval_secs: u64,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Health + metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for the ledger snapshot and journal.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

impl OracleConfig {
  pub fn fresh_window(&self) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(self.fresh_window_secs).unwrap_or(i64::MAX))
  }

  pub fn stale_window(&self) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(self.stale_window_secs).unwrap_or(i64::MAX))
  }
}

impl ReserveConfig {
  pub fn min_token_reserve_units(&self) -> Result<U256, SettlementError> {
    decimal_to_units(self.min_token_reserve)
  }

  pub fn min_native_float_units(&self) -> Result<U256, SettlementError> {
    decimal_to_units(self.min_native_float)
  }

  pub fn target_native_float_units(&self) -> Result<U256, SettlementError> {
    decimal_to_units(self.target_native_float)
  }
}

impl BillingConfig {
  pub const fn lock_timeout(&self) -> Duration {
    Duration::from_millis(self.lock_timeout_ms)
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

const fn default_fresh_window() -> u64 {
  60
}

const fn default_stale_window() -> u64 {
  300
}

const fn default_confirmations() -> u64 {
  crate::domain::confirmation::DEFAULT_REQUIRED_CONFIRMATIONS
}

const fn default_poll_interval() -> u64 {
  12_000
}

const fn default_max_block_range() -> u64 {
  10_000
}

const fn default_float_interval() -> u64 {
  300
}

const fn default_submit_gas() -> u64 {
  200_000
}

const fn default_lock_timeout() -> u64 {
  30_000
}

const fn default_reconcile_interval() -> u64 {
  300
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_data_dir() -> String {
  "./data".to_string()
}
