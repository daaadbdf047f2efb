//! Persistence Adapters - JSON Ledger Storage
//!
//! Implements the `LedgerStore` port with an atomic JSON snapshot for
//! current state and append-only JSONL files for the balance journal.
//! No database dependency.

pub mod journal;
pub mod snapshot;
pub mod store;

pub use journal::JournalWriter;
pub use snapshot::{LedgerState, SnapshotFile};
pub use store::JsonLedgerStore;
