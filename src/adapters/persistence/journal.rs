//! Ledger Journal - Append-only JSONL Balance Movements
//!
//! Every balance change is appended to `journal/YYYY-MM-DD.jsonl`, one
//! self-contained `LedgerEntry` per line. The journal is the audit trail;
//! the snapshot holds the current balances.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::domain::LedgerEntry;

/// Append-only JSONL journal with daily file rotation.
pub struct JournalWriter {
    journal_dir: PathBuf,
}

impl JournalWriter {
    /// Create the journal directory under `data_dir`.
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let journal_dir = data_dir.join("journal");
        fs::create_dir_all(&journal_dir)
            .await
            .context("Failed to create journal directory")?;
        Ok(Self { journal_dir })
    }

    /// Append one entry to today's file.
    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    pub async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let path = self.journal_dir.join(format!("{date}.jsonl"));

        let mut json = serde_json::to_string(entry).context("Failed to serialize ledger entry")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open journal file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write ledger entry")?;
        file.flush().await.context("Failed to flush journal")?;

        Ok(())
    }

    /// Read every entry from every daily file, oldest first.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Result<Vec<LedgerEntry>> {
        let mut entries = Vec::new();
        let mut files = fs::read_dir(&self.journal_dir).await?;

        while let Some(file) = files.next_entry().await? {
            let path = file.path();
            if path.extension().is_none_or(|ext| ext != "jsonl") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<LedgerEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        warn!(
                            file = %path.display(),
                            error = %e,
                            "Skipping malformed journal line"
                        );
                    }
                }
            }
        }

        entries.sort_by_key(|e| e.timestamp);
        info!(count = entries.len(), "Loaded ledger journal");
        Ok(entries)
    }

    /// Check if the journal directory is writable.
    pub async fn is_healthy(&self) -> bool {
        let marker = self.journal_dir.join(".health_check");
        let result = fs::write(&marker, b"ok").await;
        let _ = fs::remove_file(&marker).await;
        result.is_ok()
    }
}
