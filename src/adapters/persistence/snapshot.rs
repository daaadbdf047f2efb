//! Ledger Snapshot - Atomic JSON Ledger State
//!
//! Balances, deposit records, wallet links and retained operator revenue
//! are written to `ledger.json` via tmp file + rename, so the file is
//! always either the previous or the new version, never a partial write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::domain::{DepositRecord, UserId};

/// Everything the ledger needs to restart where it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Format version for forward compatibility.
    pub version: u32,
    pub balances: BTreeMap<UserId, U256>,
    pub deposits: Vec<DepositRecord>,
    pub wallet_links: BTreeMap<Address, UserId>,
    pub operator_revenue: U256,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const SNAPSHOT_VERSION: u32 = 1;

pub struct SnapshotFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotFile {
    /// Create the data directory if needed.
    pub async fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            path: data_dir.join("ledger.json"),
            tmp_path: data_dir.join("ledger.json.tmp"),
        })
    }

    #[instrument(skip(self, state))]
    pub async fn save(&self, state: &LedgerState) -> Result<()> {
        let json = serde_json::to_string_pretty(state).context("Failed to serialize ledger")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp ledger file")?;
        fs::rename(&self.tmp_path, &self.path)
            .await
            .context("Failed to rename ledger file")?;

        debug!(
            path = %self.path.display(),
            accounts = state.balances.len(),
            deposits = state.deposits.len(),
            "Ledger snapshot saved"
        );
        Ok(())
    }

    /// `None` on first startup.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<LedgerState>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            info!("No ledger file found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .await
            .context("Failed to read ledger file")?;
        let state: LedgerState =
            serde_json::from_str(&json).context("Failed to parse ledger JSON")?;

        info!(
            version = state.version,
            accounts = state.balances.len(),
            deposits = state.deposits.len(),
            "Ledger snapshot loaded"
        );
        Ok(Some(state))
    }

    pub async fn is_healthy(&self) -> bool {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return true;
        }
        fs::metadata(&self.path).await.is_ok()
    }
}
