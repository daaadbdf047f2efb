//! RPC Provider - alloy-rs 0.9 Connection Management
//!
//! Connects to an EVM JSON-RPC endpoint, optionally validates the chain
//! id, and exposes a shared type-erased provider for all chain adapters.
//! The settlement chain and the oracle chain each get their own instance.
//!
//! `on_builtin()` yields a boxed-transport provider under a deeply nested
//! filler type, so the provider is stored as `dyn Provider`.

use std::sync::Arc;

use alloy::providers::{Provider, ProviderBuilder};
use anyhow::{Context, Result};
use tracing::{info, instrument};

/// Shared RPC provider backed by alloy-rs 0.9.
pub struct RpcProvider {
    provider: Arc<dyn Provider + Send + Sync>,
    /// Short name used in logs ("settlement", "oracle").
    label: &'static str,
}

impl RpcProvider {
    /// Connect and, when `expected_chain_id` is set, verify it.
    ///
    /// The URL is never logged; it may embed an API key.
    #[instrument(skip(rpc_url))]
    pub async fn connect(
        label: &'static str,
        rpc_url: &str,
        expected_chain_id: Option<u64>,
    ) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .on_builtin(rpc_url)
            .await
            .with_context(|| format!("Failed to connect {label} RPC"))?;
        let provider: Arc<dyn Provider + Send + Sync> = Arc::new(provider);

        let chain_id = provider
            .get_chain_id()
            .await
            .with_context(|| format!("Failed to query chain ID ({label})"))?;

        if let Some(expected) = expected_chain_id {
            anyhow::ensure!(
                chain_id == expected,
                "Expected chain_id={expected} on {label} RPC, got {chain_id}"
            );
        }

        info!(label, chain_id, "Connected to RPC");
        Ok(Self { provider, label })
    }

    pub fn inner(&self) -> Arc<dyn Provider + Send + Sync> {
        Arc::clone(&self.provider)
    }

    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Lightweight liveness call.
    pub async fn is_healthy(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }
}
