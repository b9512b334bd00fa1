//! Gap Log
//!
//! Append-only sink of entities that could not be reconciled to documented.
//! Repeated gaps are kept, never collapsed: how often an entity comes back is
//! the signal that a rule, not a transient failure, is at fault.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use serde::Serialize;

use super::{SharedDatabase, status_from_sql, timestamp_from_sql, timestamp_to_sql};
use crate::types::{EntryStatus, GapLogEntry, Location, Result, RunId};

pub struct GapLog {
    db: SharedDatabase,
}

/// An entity still sitting in `Error` or `ManualReview`, with its gap history
#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedGap {
    /// Most recent gap record for the entity
    pub latest: GapLogEntry,
    pub status: EntryStatus,
    pub occurrences: usize,
    pub first_run: u64,
}

const GAP_COLUMNS: &str =
    "category, item_name, file_path, line_number, reason, run_id, recorded_at";

impl GapLog {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub fn record(
        &self,
        category: &str,
        item_name: &str,
        location: &Location,
        reason: &str,
        run_id: RunId,
    ) -> Result<()> {
        self.db.transaction(|conn| {
            insert(conn, category, item_name, location, reason, run_id, Utc::now())
        })
    }

    /// Every gap record in append order, optionally for one category
    pub fn list(&self, category: Option<&str>) -> Result<Vec<GapLogEntry>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM gap_log WHERE ?1 IS NULL OR category = ?1 ORDER BY id",
                GAP_COLUMNS
            ))?;
            let rows = stmt.query_map([category], RawGap::from_row)?;
            rows.map(|r| r?.into_entry()).collect()
        })
    }

    pub fn for_run(&self, run_id: RunId) -> Result<Vec<GapLogEntry>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM gap_log WHERE run_id = ?1 ORDER BY id",
                GAP_COLUMNS
            ))?;
            let rows = stmt.query_map([run_id.get() as i64], RawGap::from_row)?;
            rows.map(|r| r?.into_entry()).collect()
        })
    }

    /// Gaps whose entity is still unresolved in the manifest, in manifest order
    pub fn unresolved(&self) -> Result<Vec<UnresolvedGap>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.category, g.item_name, g.file_path, g.line_number, g.reason,
                        g.run_id, g.recorded_at, e.status, agg.occurrences, agg.first_run
                 FROM (
                     SELECT category, item_name, file_path, line_number,
                            MAX(id) AS last_id, COUNT(*) AS occurrences, MIN(run_id) AS first_run
                     FROM gap_log
                     GROUP BY category, item_name, file_path, line_number
                 ) agg
                 JOIN gap_log g ON g.id = agg.last_id
                 JOIN manifest_entries e
                   ON e.category = g.category AND e.item_name = g.item_name
                  AND e.file_path = g.file_path AND e.line_number = g.line_number
                 WHERE e.status IN ('error', 'manual-review')
                 ORDER BY e.category, e.seq",
            )?;

            let rows = stmt.query_map([], |row| {
                Ok((
                    RawGap::from_row(row)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                ))
            })?;

            rows.map(|r| -> Result<UnresolvedGap> {
                let (raw, status, occurrences, first_run) = r?;
                Ok(UnresolvedGap {
                    latest: raw.into_entry()?,
                    status: status_from_sql(&status)?,
                    occurrences: occurrences as usize,
                    first_run: first_run as u64,
                })
            })
            .collect()
        })
    }
}

pub(crate) fn insert(
    conn: &Connection,
    category: &str,
    item_name: &str,
    location: &Location,
    reason: &str,
    run_id: RunId,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO gap_log (category, item_name, file_path, line_number, reason, run_id, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            category,
            item_name,
            location.file_path,
            location.line_number,
            reason,
            run_id.get() as i64,
            timestamp_to_sql(&at),
        ],
    )?;
    Ok(())
}

struct RawGap {
    category: String,
    item_name: String,
    file_path: String,
    line_number: u32,
    reason: String,
    run_id: i64,
    recorded_at: String,
}

impl RawGap {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            category: row.get(0)?,
            item_name: row.get(1)?,
            file_path: row.get(2)?,
            line_number: row.get(3)?,
            reason: row.get(4)?,
            run_id: row.get(5)?,
            recorded_at: row.get(6)?,
        })
    }

    fn into_entry(self) -> Result<GapLogEntry> {
        Ok(GapLogEntry {
            category: self.category,
            item_name: self.item_name,
            location: Location::new(self.file_path, self.line_number),
            reason: self.reason,
            discovered_at_run: self.run_id as u64,
            recorded_at: timestamp_from_sql(&self.recorded_at)?,
        })
    }
}
