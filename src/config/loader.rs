//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages
//! for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Env var overriding `chain.rpc_url`.
pub const RPC_URL_ENV: &str = "MINING_LEDGER_RPC_URL";
/// Env var overriding `oracle.rpc_url`.
pub const ORACLE_RPC_URL_ENV: &str = "MINING_LEDGER_ORACLE_RPC_URL";

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config = parse_config(&content)?;
  apply_env_overrides(&mut config, |key| std::env::var(key).ok());
  validate_config(&config)?;

  info!(
    chain_id = config.chain.chain_id,
    confirmations = config.deposits.required_confirmations,
    fresh_window_secs = config.oracle.fresh_window_secs,
    stale_window_secs = config.oracle.stale_window_secs,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).with_context(|| "Failed to parse config.toml")
}

/// Replace RPC URLs with values from the environment when present.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(url) = lookup(RPC_URL_ENV).filter(|v| !v.is_empty()) {
    config.chain.rpc_url = url;
  }
  if let Some(url) = lookup(ORACLE_RPC_URL_ENV).filter(|v| !v.is_empty()) {
    config.oracle.rpc_url = url;
  }
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty endpoints
/// - Ordered cache windows (fresh before stale)
/// - Non-zero confirmation depth and timeouts
/// - Convertible, ordered reserve amounts
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.chain.rpc_url.is_empty(),
    "chain.rpc_url must not be empty"
  );
  anyhow::ensure!(
    !config.oracle.rpc_url.is_empty(),
    "oracle.rpc_url must not be empty"
  );
  anyhow::ensure!(
    config.chain.custody_wallet != config.chain.operator_wallet,
    "custody_wallet and operator_wallet must differ"
  );

  // Oracle windows
  anyhow::ensure!(
    config.oracle.fresh_window_secs > 0,
    "oracle.fresh_window_secs must be positive"
  );
  anyhow::ensure!(
    config.oracle.stale_window_secs >= config.oracle.fresh_window_secs,
    "oracle.stale_window_secs ({}) must be >= fresh_window_secs ({})",
    config.oracle.stale_window_secs,
    config.oracle.fresh_window_secs
  );

  // Deposits
  anyhow::ensure!(
    config.deposits.required_confirmations > 0,
    "deposits.required_confirmations must be positive"
  );
  anyhow::ensure!(
    config.deposits.poll_interval_ms > 0,
    "deposits.poll_interval_ms must be positive"
  );
  anyhow::ensure!(
    config.deposits.max_block_range > 0,
    "deposits.max_block_range must be positive"
  );

  // Reserve amounts
  let min_float = config
    .reserve
    .min_native_float_units()
    .context("reserve.min_native_float is not a valid amount")?;
  let target_float = config
    .reserve
    .target_native_float_units()
    .context("reserve.target_native_float is not a valid amount")?;
  config
    .reserve
    .min_token_reserve_units()
    .context("reserve.min_token_reserve is not a valid amount")?;
  anyhow::ensure!(
    target_float >= min_float,
    "reserve.target_native_float must be >= min_native_float"
  );

  // Billing
  anyhow::ensure!(
    config.billing.submit_gas_estimate > 0,
    "billing.submit_gas_estimate must be positive"
  );
  anyhow::ensure!(
    config.billing.lock_timeout_ms > 0,
    "billing.lock_timeout_ms must be positive"
  );

  anyhow::ensure!(
    config.reconciliation.interval_secs > 0,
    "reconciliation.interval_secs must be positive"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"
[service]
name = "mining-ledger-test"

[chain]
rpc_url = "http://localhost:8545"
chain_id = 42161
token_address = "0x4a24B101728e07A52053c13FB4dB2BcF490CAbc3"
custody_wallet = "0x1111111111111111111111111111111111111111"
operator_wallet = "0x2222222222222222222222222222222222222222"

[oracle]
rpc_url = "http://localhost:8546"
pair_address = "0xcb37089fc6a6faff231b96e000300a6994d7a625"
token_address = "0x8AFE4055Ebc86Bd2AFB3940c0095C9aca511d852"

[deposits]

[reserve]
min_token_reserve = "1000"
min_native_float = "0.01"
target_native_float = "0.05"

[billing]

[reconciliation]

[metrics]

[persistence]
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_defaults_applied() {
    let config = parse_config(SAMPLE).unwrap();
    assert_eq!(config.oracle.fresh_window_secs, 60);
    assert_eq!(config.oracle.stale_window_secs, 300);
    assert_eq!(config.deposits.required_confirmations, 12);
    assert_eq!(config.billing.submit_gas_estimate, 200_000);
    assert_eq!(config.service.log_level, "info");
    validate_config(&config).unwrap();
  }

  #[test]
  fn test_stale_window_shorter_than_fresh_rejected() {
    let mut config = parse_config(SAMPLE).unwrap();
    config.oracle.stale_window_secs = 30;
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_target_float_below_min_rejected() {
    let mut config = parse_config(SAMPLE).unwrap();
    config.reserve.target_native_float = rust_decimal_macros::dec!(0.001);
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_env_override() {
    let mut config = parse_config(SAMPLE).unwrap();
    apply_env_overrides(&mut config, |key| {
      (key == RPC_URL_ENV).then(|| "http://override:8545".to_string())
    });
    assert_eq!(config.chain.rpc_url, "http://override:8545");
    assert_eq!(config.oracle.rpc_url, "http://localhost:8546");
  }
}
