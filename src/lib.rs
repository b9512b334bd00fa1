//! docledger - Documentation Coverage Ledger
//!
//! Tracks which code entities of a large codebase have been documented
//! across many independent driver runs, without losing ground when code
//! moves or disappears between runs.
//!
//! ## Core Features
//!
//! - **Manifests**: one checklist per entity category, keyed by
//!   `(category, name, file, line)`, persisted in SQLite
//! - **Reconciliation**: re-extraction never downgrades progress; vanished
//!   documented entries are flagged for review, not dropped
//! - **Gap log and run history**: append-only records of every failure and
//!   every verification pass, used to detect convergence or plateaus
//! - **Drivers**: any command (or [`DocumentationDriver`] impl) that turns a
//!   pending entry into documented, error or manual review
//!
//! ## Quick Start
//!
//! ```ignore
//! use docledger::{ConfigLoader, Tracker};
//!
//! let root = std::path::Path::new(".");
//! let tracker = Tracker::open(ConfigLoader::load_for(root)?, root)?;
//! let report = tracker.verify().await?;
//! println!("coverage {:?}, campaign {}", report.run.overall_coverage, report.campaign);
//! ```
//!
//! ## Modules
//!
//! - [`extractor`]: pattern-based entity discovery per category
//! - [`reconcile`]: merges fresh extraction into manifests, campaign status
//! - [`storage`]: SQLite ledger with connection pooling
//! - [`driver`]: bounded-concurrency dispatch of pending entries
//! - [`progress`] and [`report`]: coverage aggregation and rendering

pub mod cli;
pub mod config;
pub mod constants;
pub mod driver;
pub mod extractor;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod storage;
pub mod tracker;
pub mod types;

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorKind, LedgerError, Result, ResultExt};

// Storage
pub use storage::{Database, GapLog, ManifestStore, PoolConfig, RunHistory, SharedDatabase};

// Pipeline
pub use driver::{CommandDriver, DispatchSummary, DocumentationDriver, DriverRunner};
pub use extractor::{Extractor, ExtractorSet};
pub use progress::{ProgressAggregator, ProgressReport};
pub use reconcile::{ReconcileOutcome, Reconciler, campaign_status};
pub use report::{Reporter, StatusReport};
pub use tracker::{RunReport, Tracker};
