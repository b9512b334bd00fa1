//! Manifest Store
//!
//! Durable per-category record of every discovered entity and its
//! documentation status. Single source of truth for coverage.
//!
//! ## Concurrency
//!
//! Writes are serialized per category: every mutating operation takes the
//! category's write lock and commits in one SQL transaction, so a driver
//! report and a reconciliation pass on the same category can never lose each
//! other's updates. Different categories never contend. Reads run inside one
//! transaction and see a consistent snapshot.
//!
//! Every status change, insertion and removal is written to `entry_events`,
//! and every transition into `Error` or `ManualReview` appends a gap record
//! in the same transaction.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{
    SharedDatabase, gap_log, manifest_format, run_history, status_from_sql, timestamp_from_sql,
    timestamp_to_sql,
};
use crate::types::{
    CategoryManifest, EntryStatus, IdentityKey, LedgerError, Location, ManifestEntry,
    ManifestMetadata, Outcome, Result, RunId,
};

// =============================================================================
// Change Model
// =============================================================================

/// Who caused a manifest change, recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Reconciler,
    Driver,
    Operator,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reconciler => "reconciler",
            Self::Driver => "driver",
            Self::Operator => "operator",
        }
    }
}

/// A status transition planned against a known prior status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub key: IdentityKey,
    pub from: EntryStatus,
    pub to: EntryStatus,
    pub reason: Option<String>,
}

/// Everything one pass wants to change in a category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub inserts: Vec<ManifestEntry>,
    pub transitions: Vec<StatusChange>,
    pub removals: Vec<IdentityKey>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.transitions.is_empty() && self.removals.is_empty()
    }

    /// In-memory preview of the manifest after these changes
    pub fn applied_to(&self, manifest: &CategoryManifest) -> CategoryManifest {
        let mut next = manifest.clone();
        next.entries.retain(|e| !self.removals.contains(&e.key()));
        for change in &self.transitions {
            if let Some(entry) = next.entries.iter_mut().find(|e| e.key() == change.key) {
                *entry = entry.clone().with_status(change.to, change.reason.clone());
            }
        }
        next.entries.extend(self.inserts.iter().cloned());
        next.metadata.total_count = next.entries.len();
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// One row of the audit trail
#[derive(Debug, Clone, Serialize)]
pub struct EntryEvent {
    pub key: IdentityKey,
    pub from: Option<EntryStatus>,
    pub to: Option<EntryStatus>,
    pub reason: Option<String>,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

// =============================================================================
// Store
// =============================================================================

pub struct ManifestStore {
    db: SharedDatabase,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ManifestStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self {
            db,
            write_locks: DashMap::new(),
        }
    }

    fn with_write_lock<T>(&self, category: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self
            .write_locks
            .entry(category.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // A panic inside a transaction already rolled it back
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Load a category manifest; `NotFound` if it was never created
    pub fn load(&self, category: &str) -> Result<CategoryManifest> {
        self.db.read(|conn| {
            load_in(conn, category)?.ok_or_else(|| LedgerError::NotFound {
                category: category.to_string(),
            })
        })
    }

    /// Every manifest from one snapshot, ordered by category name
    pub fn load_all(&self) -> Result<Vec<CategoryManifest>> {
        self.db.read(|conn| {
            let mut manifests = Vec::new();
            for category in categories_in(conn)? {
                if let Some(manifest) = load_in(conn, &category)? {
                    manifests.push(manifest);
                }
            }
            Ok(manifests)
        })
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        self.db.read(categories_in)
    }

    pub fn get(&self, key: &IdentityKey) -> Result<ManifestEntry> {
        self.db
            .read(|conn| find_in(conn, key))?
            .ok_or_else(|| LedgerError::EntryNotFound(key.clone()))
    }

    /// Entries of one status in first-discovered order
    pub fn list_by_status(&self, category: &str, status: EntryStatus) -> Result<Vec<ManifestEntry>> {
        self.db.read(|conn| {
            ensure_exists(conn, category)?;
            entries_in(conn, Some(category), Some(status), None)
        })
    }

    /// Oldest pending entries, for one category or across all of them
    pub fn next_pending_batch(&self, category: Option<&str>, limit: usize) -> Result<Vec<ManifestEntry>> {
        self.db.read(|conn| {
            if let Some(category) = category {
                ensure_exists(conn, category)?;
            }
            entries_in(conn, category, Some(EntryStatus::Pending), Some(limit))
        })
    }

    /// Audit trail of one entity, oldest first
    pub fn events(&self, key: &IdentityKey) -> Result<Vec<EntryEvent>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT category, item_name, file_path, line_number, from_status, to_status,
                        reason, actor, occurred_at
                 FROM entry_events
                 WHERE category = ?1 AND item_name = ?2 AND file_path = ?3 AND line_number = ?4
                 ORDER BY id",
            )?;
            let rows = stmt.query_map(
                params![
                    key.category,
                    key.item_name,
                    key.location.file_path,
                    key.location.line_number
                ],
                RawEvent::from_row,
            )?;
            rows.map(|r| r?.into_event()).collect()
        })
    }

    /// Canonical text rendering of a category
    pub fn export(&self, category: &str) -> Result<String> {
        Ok(manifest_format::render(&self.load(category)?))
    }

    /// SHA-256 of the canonical rendering
    pub fn digest(&self, category: &str) -> Result<String> {
        let text = self.export(category)?;
        Ok(hex::encode(Sha256::digest(text.as_bytes())))
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Read-modify-write of one category under its write lock.
    ///
    /// `plan` sees the committed manifest (empty if none exists yet) and
    /// returns the changes to apply. `generated_at` only moves when the
    /// change set is non-empty, so a pass that changes nothing leaves the
    /// manifest byte-identical.
    pub fn apply<F, T>(
        &self,
        category: &str,
        source_path: &str,
        actor: Actor,
        run_id: RunId,
        plan: F,
    ) -> Result<T>
    where
        F: FnOnce(&CategoryManifest) -> Result<(ChangeSet, T)>,
    {
        self.with_write_lock(category, || {
            self.db.transaction(|conn| {
                let now = Utc::now();
                let existing = load_in(conn, category)?;
                let created = existing.is_none();
                let current =
                    existing.unwrap_or_else(|| CategoryManifest::empty(category, source_path));

                let (changes, value) = plan(&current)?;

                if created || !changes.is_empty() {
                    touch_manifest(conn, category, source_path, &now)?;
                }
                write_changes(conn, &changes, actor, run_id, &now)?;

                Ok(value)
            })
        })
    }

    /// Add or update one entry by identity key.
    ///
    /// Only status and reason of an existing entry are overwritten. A moved
    /// entity is a new identity; use [`ManifestStore::rename`] to carry
    /// status across a move.
    pub fn upsert(&self, entry: &ManifestEntry, source_path: &str, actor: Actor) -> Result<UpsertOutcome> {
        self.with_write_lock(&entry.category, || {
            self.db.transaction(|conn| {
                let now = Utc::now();
                ensure_manifest(conn, &entry.category, source_path, &now)?;
                let run_id = run_history::latest_run_id(conn)?;
                upsert_in(conn, entry, actor, run_id, &now)
            })
        })
    }

    /// Record a driver outcome. Only `Pending` entries accept one.
    pub fn report_result(&self, key: &IdentityKey, outcome: &Outcome, actor: Actor) -> Result<ManifestEntry> {
        self.transition(key, actor, |current| {
            if current.status != EntryStatus::Pending {
                return Err(LedgerError::InvalidTransition {
                    key: key.clone(),
                    from: current.status,
                    to: outcome.status(),
                });
            }
            Ok((outcome.status(), outcome.reason().map(str::to_string)))
        })
    }

    /// Put an `Error` or `ManualReview` entry back in the driver queue
    pub fn requeue(&self, key: &IdentityKey) -> Result<ManifestEntry> {
        self.transition(key, Actor::Operator, |current| {
            if !current.status.is_gap() {
                return Err(LedgerError::InvalidTransition {
                    key: key.clone(),
                    from: current.status,
                    to: EntryStatus::Pending,
                });
            }
            Ok((EntryStatus::Pending, None))
        })
    }

    fn transition<F>(&self, key: &IdentityKey, actor: Actor, decide: F) -> Result<ManifestEntry>
    where
        F: FnOnce(&ManifestEntry) -> Result<(EntryStatus, Option<String>)>,
    {
        self.with_write_lock(&key.category, || {
            self.db.transaction(|conn| {
                let now = Utc::now();
                let current =
                    find_in(conn, key)?.ok_or_else(|| LedgerError::EntryNotFound(key.clone()))?;
                let (to, reason) = decide(&current)?;
                let run_id = run_history::latest_run_id(conn)?;

                let change = StatusChange {
                    key: key.clone(),
                    from: current.status,
                    to,
                    reason,
                };
                apply_transition(conn, &change, actor, run_id, &now)?;

                Ok(current.with_status(change.to, change.reason))
            })
        })
    }

    /// Physically delete an entry. Operator-only; the removal is audited.
    pub fn remove(&self, key: &IdentityKey) -> Result<ManifestEntry> {
        self.with_write_lock(&key.category, || {
            self.db.transaction(|conn| {
                let now = Utc::now();
                let current =
                    find_in(conn, key)?.ok_or_else(|| LedgerError::EntryNotFound(key.clone()))?;
                delete_entry(conn, key)?;
                record_event(
                    conn,
                    key,
                    Some(current.status),
                    None,
                    Some("removed by operator"),
                    Actor::Operator,
                    &now,
                )?;
                Ok(current)
            })
        })
    }

    /// Move an entry to a new identity, keeping status and discovery order
    pub fn rename(
        &self,
        key: &IdentityKey,
        new_name: Option<&str>,
        new_location: Option<Location>,
    ) -> Result<ManifestEntry> {
        self.with_write_lock(&key.category, || {
            self.db.transaction(|conn| {
                let now = Utc::now();
                let current =
                    find_in(conn, key)?.ok_or_else(|| LedgerError::EntryNotFound(key.clone()))?;

                let mut renamed = current.clone();
                if let Some(name) = new_name {
                    renamed.item_name = name.to_string();
                }
                if let Some(location) = new_location {
                    renamed.location = location;
                }
                let new_key = renamed.key();
                if new_key == *key {
                    return Ok(current);
                }
                if find_in(conn, &new_key)?.is_some() {
                    return Err(LedgerError::DuplicateEntry { key: new_key });
                }

                conn.execute(
                    "UPDATE manifest_entries
                     SET item_name = ?5, file_path = ?6, line_number = ?7, updated_at = ?8
                     WHERE category = ?1 AND item_name = ?2 AND file_path = ?3 AND line_number = ?4",
                    params![
                        key.category,
                        key.item_name,
                        key.location.file_path,
                        key.location.line_number,
                        renamed.item_name,
                        renamed.location.file_path,
                        renamed.location.line_number,
                        timestamp_to_sql(&now),
                    ],
                )?;
                let note = format!("renamed from {}", key);
                record_event(
                    conn,
                    &new_key,
                    Some(current.status),
                    Some(current.status),
                    Some(&note),
                    Actor::Operator,
                    &now,
                )?;
                Ok(renamed)
            })
        })
    }

    /// Merge a parsed manifest into the store by identity key.
    ///
    /// Entries absent from the import are left alone. Importing into an
    /// empty store reproduces the exported manifest exactly.
    pub fn import(&self, manifest: &CategoryManifest) -> Result<ImportSummary> {
        let category = &manifest.category;
        if let Some(foreign) = manifest.entries.iter().find(|e| &e.category != category) {
            return Err(LedgerError::Config(format!(
                "Entry {} does not belong to category '{}'",
                foreign.key(),
                category
            )));
        }

        self.with_write_lock(category, || {
            self.db.transaction(|conn| {
                let now = Utc::now();
                let created = load_in(conn, category)?.is_none();
                if created {
                    touch_manifest(
                        conn,
                        category,
                        &manifest.metadata.source_path,
                        &manifest.metadata.generated_at,
                    )?;
                }

                let run_id = run_history::latest_run_id(conn)?;
                let mut summary = ImportSummary::default();
                for entry in &manifest.entries {
                    match upsert_in(conn, entry, Actor::Operator, run_id, &now)? {
                        UpsertOutcome::Inserted => summary.inserted += 1,
                        UpsertOutcome::Updated => summary.updated += 1,
                        UpsertOutcome::Unchanged => summary.unchanged += 1,
                    }
                }

                if !created && summary.inserted + summary.updated > 0 {
                    touch_manifest(conn, category, &manifest.metadata.source_path, &now)?;
                }
                Ok(summary)
            })
        })
    }
}

// =============================================================================
// SQL helpers (run inside a caller's transaction)
// =============================================================================

const ENTRY_COLUMNS: &str = "category, item_name, file_path, line_number, status, reason";

fn categories_in(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT category FROM manifests ORDER BY category")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

fn ensure_exists(conn: &Connection, category: &str) -> Result<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM manifests WHERE category = ?1",
            [category],
            |row| row.get(0),
        )
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(LedgerError::NotFound {
            category: category.to_string(),
        }),
    }
}

fn load_in(conn: &Connection, category: &str) -> Result<Option<CategoryManifest>> {
    let meta = conn
        .query_row(
            "SELECT source_path, generated_at FROM manifests WHERE category = ?1",
            [category],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    let Some((source_path, generated_at)) = meta else {
        return Ok(None);
    };

    let entries = entries_in(conn, Some(category), None, None)?;
    Ok(Some(CategoryManifest {
        category: category.to_string(),
        metadata: ManifestMetadata {
            generated_at: timestamp_from_sql(&generated_at)?,
            source_path,
            total_count: entries.len(),
        },
        entries,
    }))
}

fn entries_in(
    conn: &Connection,
    category: Option<&str>,
    status: Option<EntryStatus>,
    limit: Option<usize>,
) -> Result<Vec<ManifestEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM manifest_entries
         WHERE (?1 IS NULL OR category = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY category, seq
         LIMIT ?3",
        ENTRY_COLUMNS
    ))?;
    let rows = stmt.query_map(
        params![
            category,
            status.map(|s| s.as_str()),
            // SQLite treats a negative limit as unbounded
            limit.map(|l| l as i64).unwrap_or(-1),
        ],
        RawEntry::from_row,
    )?;
    rows.map(|r| r?.into_entry()).collect()
}

fn find_in(conn: &Connection, key: &IdentityKey) -> Result<Option<ManifestEntry>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM manifest_entries
             WHERE category = ?1 AND item_name = ?2 AND file_path = ?3 AND line_number = ?4",
            ENTRY_COLUMNS
        ),
        params![
            key.category,
            key.item_name,
            key.location.file_path,
            key.location.line_number
        ],
        RawEntry::from_row,
    )
    .optional()?
    .map(RawEntry::into_entry)
    .transpose()
}

fn ensure_manifest(conn: &Connection, category: &str, source_path: &str, now: &DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO manifests (category, source_path, generated_at) VALUES (?1, ?2, ?3)",
        params![category, source_path, timestamp_to_sql(now)],
    )?;
    Ok(())
}

fn touch_manifest(conn: &Connection, category: &str, source_path: &str, at: &DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO manifests (category, source_path, generated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(category) DO UPDATE SET
             source_path = excluded.source_path,
             generated_at = excluded.generated_at",
        params![category, source_path, timestamp_to_sql(at)],
    )?;
    Ok(())
}

fn write_changes(
    conn: &Connection,
    changes: &ChangeSet,
    actor: Actor,
    run_id: RunId,
    now: &DateTime<Utc>,
) -> Result<()> {
    for entry in &changes.inserts {
        insert_entry(conn, entry, actor, run_id, now)?;
    }
    for change in &changes.transitions {
        apply_transition(conn, change, actor, run_id, now)?;
    }
    for key in &changes.removals {
        let current =
            find_in(conn, key)?.ok_or_else(|| LedgerError::EntryNotFound(key.clone()))?;
        delete_entry(conn, key)?;
        record_event(conn, key, Some(current.status), None, None, actor, now)?;
    }
    Ok(())
}

fn upsert_in(
    conn: &Connection,
    entry: &ManifestEntry,
    actor: Actor,
    run_id: RunId,
    now: &DateTime<Utc>,
) -> Result<UpsertOutcome> {
    let key = entry.key();
    match find_in(conn, &key)? {
        None => {
            insert_entry(conn, entry, actor, run_id, now)?;
            Ok(UpsertOutcome::Inserted)
        }
        Some(current) if current.status == entry.status && current.reason == entry.reason => {
            Ok(UpsertOutcome::Unchanged)
        }
        Some(current) => {
            let change = StatusChange {
                key,
                from: current.status,
                to: entry.status,
                reason: entry.reason.clone(),
            };
            apply_transition(conn, &change, actor, run_id, now)?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

fn insert_entry(
    conn: &Connection,
    entry: &ManifestEntry,
    actor: Actor,
    run_id: RunId,
    now: &DateTime<Utc>,
) -> Result<()> {
    let key = entry.key();
    require_reason(&key, entry.status, entry.reason.as_deref())?;

    let ts = timestamp_to_sql(now);
    conn.execute(
        "INSERT INTO manifest_entries
             (category, item_name, file_path, line_number, status, reason, discovered_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            entry.category,
            entry.item_name,
            entry.location.file_path,
            entry.location.line_number,
            entry.status.as_str(),
            entry.reason,
            ts,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            LedgerError::DuplicateEntry { key: entry.key() }
        }
        other => LedgerError::Database(other),
    })?;

    record_event(conn, &key, None, Some(entry.status), entry.reason.as_deref(), actor, now)?;
    if entry.status.is_gap() {
        gap_log::insert(
            conn,
            &entry.category,
            &entry.item_name,
            &entry.location,
            entry.reason.as_deref().unwrap_or_default(),
            run_id,
            *now,
        )?;
    }
    Ok(())
}

/// Apply a transition if the entry is still in `change.from`.
fn apply_transition(
    conn: &Connection,
    change: &StatusChange,
    actor: Actor,
    run_id: RunId,
    now: &DateTime<Utc>,
) -> Result<()> {
    let key = &change.key;
    let reason = if change.to.requires_reason() {
        change.reason.as_deref()
    } else {
        None
    };
    require_reason(key, change.to, reason)?;

    let updated = conn.execute(
        "UPDATE manifest_entries SET status = ?5, reason = ?6, updated_at = ?7
         WHERE category = ?1 AND item_name = ?2 AND file_path = ?3 AND line_number = ?4
           AND status = ?8",
        params![
            key.category,
            key.item_name,
            key.location.file_path,
            key.location.line_number,
            change.to.as_str(),
            reason,
            timestamp_to_sql(now),
            change.from.as_str(),
        ],
    )?;

    if updated == 0 {
        return match find_in(conn, key)? {
            None => Err(LedgerError::EntryNotFound(key.clone())),
            Some(current) => Err(LedgerError::ReconciliationConflict {
                key: key.clone(),
                reason: format!(
                    "expected status {} but found {}",
                    change.from, current.status
                ),
            }),
        };
    }

    record_event(conn, key, Some(change.from), Some(change.to), reason, actor, now)?;

    if change.to.is_gap() && change.from != change.to {
        gap_log::insert(
            conn,
            &key.category,
            &key.item_name,
            &key.location,
            reason.unwrap_or_default(),
            run_id,
            *now,
        )?;
    }
    Ok(())
}

/// `Error` and `ManualReview` entries always carry a non-blank reason
fn require_reason(key: &IdentityKey, status: EntryStatus, reason: Option<&str>) -> Result<()> {
    if status.requires_reason() && reason.is_none_or(|r| r.trim().is_empty()) {
        return Err(LedgerError::MissingReason {
            key: key.clone(),
            status,
        });
    }
    Ok(())
}

fn delete_entry(conn: &Connection, key: &IdentityKey) -> Result<()> {
    conn.execute(
        "DELETE FROM manifest_entries
         WHERE category = ?1 AND item_name = ?2 AND file_path = ?3 AND line_number = ?4",
        params![
            key.category,
            key.item_name,
            key.location.file_path,
            key.location.line_number
        ],
    )?;
    Ok(())
}

fn record_event(
    conn: &Connection,
    key: &IdentityKey,
    from: Option<EntryStatus>,
    to: Option<EntryStatus>,
    reason: Option<&str>,
    actor: Actor,
    now: &DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO entry_events
             (category, item_name, file_path, line_number, from_status, to_status, reason, actor, occurred_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            key.category,
            key.item_name,
            key.location.file_path,
            key.location.line_number,
            from.map(|s| s.as_str()),
            to.map(|s| s.as_str()),
            reason,
            actor.as_str(),
            timestamp_to_sql(now),
        ],
    )?;
    Ok(())
}

// =============================================================================
// Row mapping
// =============================================================================

struct RawEntry {
    category: String,
    item_name: String,
    file_path: String,
    line_number: u32,
    status: String,
    reason: Option<String>,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            category: row.get(0)?,
            item_name: row.get(1)?,
            file_path: row.get(2)?,
            line_number: row.get(3)?,
            status: row.get(4)?,
            reason: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<ManifestEntry> {
        Ok(ManifestEntry {
            category: self.category,
            item_name: self.item_name,
            location: Location::new(self.file_path, self.line_number),
            status: status_from_sql(&self.status)?,
            reason: self.reason,
        })
    }
}

struct RawEvent {
    key: IdentityKey,
    from: Option<String>,
    to: Option<String>,
    reason: Option<String>,
    actor: String,
    occurred_at: String,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: IdentityKey::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                Location::new(row.get::<_, String>(2)?, row.get::<_, u32>(3)?),
            ),
            from: row.get(4)?,
            to: row.get(5)?,
            reason: row.get(6)?,
            actor: row.get(7)?,
            occurred_at: row.get(8)?,
        })
    }

    fn into_event(self) -> Result<EntryEvent> {
        Ok(EntryEvent {
            key: self.key,
            from: self.from.as_deref().map(status_from_sql).transpose()?,
            to: self.to.as_deref().map(status_from_sql).transpose()?,
            reason: self.reason,
            actor: self.actor,
            occurred_at: timestamp_from_sql(&self.occurred_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, GapLog};
    use crate::types::EntityCandidate;
    use std::thread;

    fn store() -> ManifestStore {
        store_with_db().0
    }

    fn store_with_db() -> (ManifestStore, SharedDatabase) {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let db = Arc::new(db);
        (ManifestStore::new(Arc::clone(&db)), db)
    }

    fn pending(name: &str, line: u32) -> ManifestEntry {
        ManifestEntry::pending(&EntityCandidate::new(
            "function",
            name,
            Location::new("src/lib.rs", line),
        ))
    }

    fn seed(store: &ManifestStore, names: &[&str]) {
        let inserts = names
            .iter()
            .enumerate()
            .map(|(i, n)| pending(n, i as u32 + 1))
            .collect();
        store
            .apply("function", "/src", Actor::Reconciler, RunId::new(1), |_| {
                Ok((
                    ChangeSet {
                        inserts,
                        ..Default::default()
                    },
                    (),
                ))
            })
            .unwrap();
    }

    #[test]
    fn test_load_unknown_category_is_not_found() {
        let store = store();
        assert!(store.load("route").unwrap_err().is_not_found());
        assert!(store
            .list_by_status("route", EntryStatus::Pending)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_list_by_status_keeps_insertion_order() {
        let store = store();
        seed(&store, &["zeta", "alpha", "mid"]);

        let names: Vec<_> = store
            .list_by_status("function", EntryStatus::Pending)
            .unwrap()
            .into_iter()
            .map(|e| e.item_name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);

        let batch = store.next_pending_batch(Some("function"), 2).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].item_name, "zeta");
    }

    #[test]
    fn test_upsert_only_overwrites_status_and_reason() {
        let store = store();
        seed(&store, &["parse"]);

        let entry = pending("parse", 1);
        assert_eq!(
            store.upsert(&entry, "/src", Actor::Operator).unwrap(),
            UpsertOutcome::Unchanged
        );

        let documented = entry.clone().with_status(EntryStatus::Documented, None);
        assert_eq!(
            store.upsert(&documented, "/src", Actor::Operator).unwrap(),
            UpsertOutcome::Updated
        );

        // Same name, new line: a different entity
        let moved = pending("parse", 99);
        assert_eq!(
            store.upsert(&moved, "/src", Actor::Operator).unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(store.load("function").unwrap().entries.len(), 2);
    }

    #[test]
    fn test_report_result_only_from_pending() {
        let store = store();
        seed(&store, &["parse"]);
        let key = pending("parse", 1).key();

        let entry = store
            .report_result(&key, &Outcome::Documented, Actor::Driver)
            .unwrap();
        assert_eq!(entry.status, EntryStatus::Documented);

        let err = store
            .report_result(&key, &Outcome::Error("late".into()), Actor::Driver)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                from: EntryStatus::Documented,
                to: EntryStatus::Error,
                ..
            }
        ));
    }

    #[test]
    fn test_driver_failure_lands_in_gap_log() {
        let (store, db) = store_with_db();
        seed(&store, &["parse"]);
        let key = pending("parse", 1).key();

        store
            .report_result(&key, &Outcome::Error("model refused".into()), Actor::Driver)
            .unwrap();

        let gaps = GapLog::new(db).list(None).unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].reason, "model refused");
    }

    #[test]
    fn test_failure_statuses_need_a_reason() {
        let (store, db) = store_with_db();
        seed(&store, &["parse"]);
        let key = pending("parse", 1).key();

        for outcome in [Outcome::Error(String::new()), Outcome::ManualReview("  ".into())] {
            let err = store.report_result(&key, &outcome, Actor::Driver).unwrap_err();
            assert!(matches!(err, LedgerError::MissingReason { .. }));
        }

        let bare = pending("parse", 1).with_status(EntryStatus::Error, None);
        let err = store.upsert(&bare, "/src", Actor::Operator).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::MissingReason {
                status: EntryStatus::Error,
                ..
            }
        ));
        let fresh = pending("lex", 7).with_status(EntryStatus::ManualReview, None);
        assert!(store.upsert(&fresh, "/src", Actor::Operator).is_err());

        let manifest = store.load("function").unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].status, EntryStatus::Pending);
        assert!(GapLog::new(db).list(None).unwrap().is_empty());
    }

    #[test]
    fn test_requeue_and_remove_are_audited() {
        let store = store();
        seed(&store, &["parse", "load"]);
        let key = pending("parse", 1).key();

        assert!(store.requeue(&key).is_err());
        store
            .report_result(&key, &Outcome::ManualReview("ambiguous".into()), Actor::Driver)
            .unwrap();
        let requeued = store.requeue(&key).unwrap();
        assert_eq!(requeued.status, EntryStatus::Pending);
        assert_eq!(requeued.reason, None);

        store.remove(&key).unwrap();
        assert!(matches!(
            store.get(&key).unwrap_err(),
            LedgerError::EntryNotFound(_)
        ));

        let actors: Vec<_> = store
            .events(&key)
            .unwrap()
            .into_iter()
            .map(|e| (e.actor, e.to))
            .collect();
        assert_eq!(
            actors,
            vec![
                ("reconciler".to_string(), Some(EntryStatus::Pending)),
                ("driver".to_string(), Some(EntryStatus::ManualReview)),
                ("operator".to_string(), Some(EntryStatus::Pending)),
                ("operator".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_rename_preserves_status_and_order() {
        let store = store();
        seed(&store, &["parse", "load"]);
        let key = pending("parse", 1).key();
        store
            .report_result(&key, &Outcome::Documented, Actor::Driver)
            .unwrap();

        let renamed = store
            .rename(&key, Some("parse_all"), Some(Location::new("src/parser.rs", 4)))
            .unwrap();
        assert_eq!(renamed.status, EntryStatus::Documented);

        let manifest = store.load("function").unwrap();
        assert_eq!(manifest.entries[0].item_name, "parse_all");
        assert_eq!(manifest.entries[0].location.file_path, "src/parser.rs");

        let clash = store.rename(&renamed.key(), Some("load"), Some(Location::new("src/lib.rs", 2)));
        assert!(matches!(clash, Err(LedgerError::DuplicateEntry { .. })));
    }

    #[test]
    fn test_noop_apply_keeps_generated_at_and_digest() {
        let store = store();
        seed(&store, &["parse"]);
        let before = store.digest("function").unwrap();

        store
            .apply("function", "/src", Actor::Reconciler, RunId::new(2), |_| {
                Ok((ChangeSet::default(), ()))
            })
            .unwrap();

        assert_eq!(store.digest("function").unwrap(), before);
        assert_eq!(before.len(), 64);
    }

    #[test]
    fn test_stale_transition_is_conflict() {
        let store = store();
        seed(&store, &["parse"]);
        let key = pending("parse", 1).key();

        let result = store.apply("function", "/src", Actor::Reconciler, RunId::new(2), |_| {
            Ok((
                ChangeSet {
                    transitions: vec![StatusChange {
                        key: key.clone(),
                        from: EntryStatus::Documented,
                        to: EntryStatus::ManualReview,
                        reason: Some("gone".into()),
                    }],
                    ..Default::default()
                },
                (),
            ))
        });
        assert!(matches!(
            result,
            Err(LedgerError::ReconciliationConflict { .. })
        ));
        // Whole pass rolled back
        assert_eq!(store.get(&key).unwrap().status, EntryStatus::Pending);
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = store();
        seed(&source, &["parse", "load", "save"]);
        let key = pending("load", 2).key();
        source
            .report_result(&key, &Outcome::Error("a | b".into()), Actor::Driver)
            .unwrap();
        let text = source.export("function").unwrap();

        let target = store();
        let manifest = manifest_format::parse(&text).unwrap();
        let summary = target.import(&manifest).unwrap();
        assert_eq!(summary.inserted, 3);
        assert_eq!(target.export("function").unwrap(), text);
    }

    #[test]
    fn test_concurrent_reports_on_one_category_are_not_lost() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Database::open(dir.path().join("ledger.db")).unwrap();
        db.initialize().unwrap();
        let store = Arc::new(ManifestStore::new(Arc::new(db)));

        let names: Vec<String> = (0..16).map(|i| format!("f{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        seed(&store, &refs);

        let handles: Vec<_> = (0..16u32)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let key = pending(&format!("f{}", i), i + 1).key();
                    store.report_result(&key, &Outcome::Documented, Actor::Driver)
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let manifest = store.load("function").unwrap();
        assert_eq!(manifest.count_status(EntryStatus::Documented), 16);
    }
}
