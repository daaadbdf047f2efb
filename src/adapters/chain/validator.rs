//! Contract Validator - On-chain Verification at Startup
//!
//! Checks that the configured token and pair addresses have deployed
//! code, so a typo in `config.toml` fails at startup instead of turning
//! every balance read into a silent zero.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::Provider;
use anyhow::{Context, Result};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub name: &'static str,
    pub address: Address,
    pub has_code: bool,
}

pub struct ContractValidator {
    provider: Arc<dyn Provider + Send + Sync>,
}

impl ContractValidator {
    pub fn new(provider: Arc<dyn Provider + Send + Sync>) -> Self {
        Self { provider }
    }

    /// Fail if any of `contracts` has no code.
    #[instrument(skip(self, contracts))]
    pub async fn require_code(
        &self,
        contracts: &[(&'static str, Address)],
    ) -> Result<Vec<ValidationResult>> {
        let mut results = Vec::with_capacity(contracts.len());

        for &(name, address) in contracts {
            let code = self
                .provider
                .get_code_at(address)
                .await
                .with_context(|| format!("Failed to query code for {name}"))?;

            anyhow::ensure!(
                !code.is_empty(),
                "{name} at {address} has no deployed code - check config.toml"
            );
            info!(contract = name, address = %address, "Contract validated on-chain");

            results.push(ValidationResult {
                name,
                address,
                has_code: true,
            });
        }

        Ok(results)
    }
}
