//! Gas Reads - Fee Data and Receipt Gas Fields
//!
//! Turns alloy RPC types into the domain's `FeeData` and `GasReceipt`.
//! The legacy `gasPrice` is taken from the transaction itself, since the
//! receipt only carries `effectiveGasPrice`.

use std::sync::Arc;

use alloy::consensus::Transaction as _;
use alloy::primitives::{TxHash, U256};
use alloy::providers::Provider;
use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::domain::{FeeData, GasReceipt};

/// Current gas price plus an EIP-1559 max fee estimate.
///
/// Either half may be missing (pre-London chains, flaky estimators); the
/// caller decides whether what remains is usable.
#[instrument(skip(provider))]
pub async fn fetch_fee_data(provider: &Arc<dyn Provider + Send + Sync>) -> Result<FeeData> {
    let gas_price = match provider.get_gas_price().await {
        Ok(price) => Some(U256::from(price)),
        Err(e) => {
            warn!(error = %e, "eth_gasPrice failed");
            None
        }
    };
    let max_fee_per_gas = match provider.estimate_eip1559_fees(None).await {
        Ok(estimate) => Some(U256::from(estimate.max_fee_per_gas)),
        Err(e) => {
            debug!(error = %e, "EIP-1559 fee estimate unavailable");
            None
        }
    };

    anyhow::ensure!(
        gas_price.is_some() || max_fee_per_gas.is_some(),
        "No fee data available from RPC"
    );
    Ok(FeeData {
        gas_price,
        max_fee_per_gas,
    })
}

/// Gas fields of a mined transaction. `None` while it is pending.
#[instrument(skip(provider))]
pub async fn fetch_gas_receipt(
    provider: &Arc<dyn Provider + Send + Sync>,
    tx_hash: &str,
) -> Result<Option<GasReceipt>> {
    let hash: TxHash = tx_hash.parse().context("Invalid transaction hash")?;

    let Some(receipt) = provider
        .get_transaction_receipt(hash)
        .await
        .context("Failed to fetch receipt")?
    else {
        return Ok(None);
    };

    let legacy = provider
        .get_transaction_by_hash(hash)
        .await
        .context("Failed to fetch transaction")?
        .and_then(|tx| tx.gas_price())
        .map(U256::from);

    Ok(Some(GasReceipt {
        gas_used: U256::from(receipt.gas_used),
        effective_gas_price: Some(U256::from(receipt.effective_gas_price)),
        gas_price: legacy,
    }))
}
