//! Durable ledger: manifests, audit trail, run history and gap log
//!
//! Everything lives in one SQLite database so a reconciliation pass can
//! commit its manifest changes and gap records in a single transaction.

pub mod database;
pub mod gap_log;
pub mod manifest_format;
pub mod manifest_store;
pub mod run_history;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use gap_log::{GapLog, UnresolvedGap};
pub use manifest_store::{
    Actor, ChangeSet, EntryEvent, ImportSummary, ManifestStore, StatusChange, UpsertOutcome,
};
pub use run_history::RunHistory;

use chrono::{DateTime, Utc};

use crate::types::{EntryStatus, LedgerError, Result};

pub(crate) fn timestamp_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn timestamp_from_sql(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Persistence(format!("Corrupt timestamp '{}': {}", raw, e)))
}

pub(crate) fn status_from_sql(raw: &str) -> Result<EntryStatus> {
    raw.parse()
        .map_err(|e: String| LedgerError::Persistence(format!("Corrupt status: {}", e)))
}
