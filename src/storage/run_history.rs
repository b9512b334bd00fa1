//! Verification run history
//!
//! Append-only. A run is written once, after its reconciliation pass, and
//! never edited.

use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{SharedDatabase, timestamp_from_sql, timestamp_to_sql};
use crate::types::{Result, RunId, VerificationRun};

pub struct RunHistory {
    db: SharedDatabase,
}

const RUN_COLUMNS: &str =
    "sequence, timestamp, coverage_before, coverage_after, gaps_found, categories_failed";

impl RunHistory {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub fn append(&self, run: &VerificationRun) -> Result<()> {
        self.db.transaction(|conn| insert(conn, run))
    }

    /// All runs, oldest first
    pub fn list(&self) -> Result<Vec<VerificationRun>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM verification_runs ORDER BY sequence",
                RUN_COLUMNS
            ))?;
            let rows = stmt.query_map([], RawRun::from_row)?;
            rows.map(|r| r?.into_run()).collect()
        })
    }

    /// The last `n` runs, oldest first
    pub fn recent(&self, n: usize) -> Result<Vec<VerificationRun>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM verification_runs ORDER BY sequence DESC LIMIT ?1",
                RUN_COLUMNS
            ))?;
            let rows = stmt.query_map([n as i64], RawRun::from_row)?;
            let mut runs = rows
                .map(|r| r?.into_run())
                .collect::<Result<Vec<_>>>()?;
            runs.reverse();
            Ok(runs)
        })
    }

    pub fn latest(&self) -> Result<Option<VerificationRun>> {
        Ok(self.recent(1)?.pop())
    }

    /// Id of the most recent run, or `RunId::NONE` before the first one
    pub fn latest_run_id(&self) -> Result<RunId> {
        self.db.read(latest_run_id)
    }

    pub fn next_run_id(&self) -> Result<RunId> {
        Ok(self.latest_run_id()?.next())
    }
}

pub(crate) fn insert(conn: &Connection, run: &VerificationRun) -> Result<()> {
    conn.execute(
        "INSERT INTO verification_runs
             (sequence, timestamp, coverage_before, coverage_after, gaps_found, categories_failed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            run.sequence_number as i64,
            timestamp_to_sql(&run.timestamp),
            run.coverage_before,
            run.overall_coverage,
            run.gaps_found as i64,
            run.categories_failed as i64,
        ],
    )?;
    Ok(())
}

pub(crate) fn latest_run_id(conn: &Connection) -> Result<RunId> {
    let seq: Option<i64> = conn
        .query_row("SELECT MAX(sequence) FROM verification_runs", [], |row| {
            row.get(0)
        })
        .optional()?
        .flatten();
    Ok(RunId::new(seq.unwrap_or(0) as u64))
}

struct RawRun {
    sequence: i64,
    timestamp: String,
    coverage_before: Option<f64>,
    coverage_after: Option<f64>,
    gaps_found: i64,
    categories_failed: i64,
}

impl RawRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sequence: row.get(0)?,
            timestamp: row.get(1)?,
            coverage_before: row.get(2)?,
            coverage_after: row.get(3)?,
            gaps_found: row.get(4)?,
            categories_failed: row.get(5)?,
        })
    }

    fn into_run(self) -> Result<VerificationRun> {
        Ok(VerificationRun {
            sequence_number: self.sequence as u64,
            timestamp: timestamp_from_sql(&self.timestamp)?,
            coverage_before: self.coverage_before,
            overall_coverage: self.coverage_after,
            gaps_found: self.gaps_found as usize,
            categories_failed: self.categories_failed as usize,
        })
    }
}
