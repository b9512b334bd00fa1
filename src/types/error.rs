//! Unified Error Type System
//!
//! Centralized error types for the ledger.
//!
//! ## Error Kinds
//!
//! - **Extraction**: one category's scan could not complete (isolated)
//! - **Persistence**: manifest read/write failure (fatal for the operation)
//! - **ReconciliationConflict**: documented knowledge drifted from the source
//! - **Driver**: an external documentation attempt failed (isolated, per entity)
//! - **Usage**: bad input, configuration or state transition requests
//!
//! Isolated failures are reported per category or per entity and never abort
//! sibling work. Persistence failures propagate to the caller untouched.

use std::time::Duration;
use thiserror::Error;

use super::entity::{EntryStatus, IdentityKey};

// =============================================================================
// Error Kinds
// =============================================================================

/// Failure taxonomy used for propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Extraction,
    Persistence,
    ReconciliationConflict,
    Driver,
    Usage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extraction => write!(f, "EXTRACTION"),
            Self::Persistence => write!(f, "PERSISTENCE"),
            Self::ReconciliationConflict => write!(f, "RECONCILIATION_CONFLICT"),
            Self::Driver => write!(f, "DRIVER"),
            Self::Usage => write!(f, "USAGE"),
        }
    }
}

impl ErrorKind {
    /// Isolated failures are contained to one category or entity
    pub fn is_isolated(&self) -> bool {
        matches!(
            self,
            Self::Extraction | Self::Driver | Self::ReconciliationConflict
        )
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum LedgerError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Taxonomy
    // -------------------------------------------------------------------------
    #[error("Extraction failed for category '{category}': {message}")]
    Extraction { category: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Reconciliation conflict for {key}: {reason}")]
    ReconciliationConflict { key: IdentityKey, reason: String },

    #[error("Driver failed for {key}: {reason}")]
    Driver { key: IdentityKey, reason: String },

    // -------------------------------------------------------------------------
    // Lookup and state errors
    // -------------------------------------------------------------------------
    #[error("No manifest exists for category '{category}'")]
    NotFound { category: String },

    #[error("No manifest entry for {0}")]
    EntryNotFound(IdentityKey),

    #[error("Entry {key} already exists")]
    DuplicateEntry { key: IdentityKey },

    #[error("Invalid transition for {key}: {from} -> {to}")]
    InvalidTransition {
        key: IdentityKey,
        from: EntryStatus,
        to: EntryStatus,
    },

    #[error("Status '{status}' for {key} needs a reason")]
    MissingReason { key: IdentityKey, status: EntryStatus },

    #[error("Manifest format error at line {line}: {message}")]
    ManifestFormat { line: usize, message: String },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not initialized: run 'docledger init' first")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, LedgerError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl LedgerError {
    /// Create an extraction failure for a category
    pub fn extraction(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            category: category.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a driver failure for an entity
    pub fn driver(key: IdentityKey, reason: impl Into<String>) -> Self {
        Self::Driver {
            key,
            reason: reason.into(),
        }
    }

    /// Classify this error into the failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Database(_) | Self::Json(_) | Self::Persistence(_) => {
                ErrorKind::Persistence
            }
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::ReconciliationConflict { .. } => ErrorKind::ReconciliationConflict,
            Self::Driver { .. } | Self::Timeout { .. } => ErrorKind::Driver,
            Self::NotFound { .. }
            | Self::EntryNotFound(_)
            | Self::DuplicateEntry { .. }
            | Self::InvalidTransition { .. }
            | Self::MissingReason { .. }
            | Self::ManifestFormat { .. }
            | Self::Config(_)
            | Self::NotInitialized => ErrorKind::Usage,
        }
    }

    /// True for the "manifest does not exist yet" case, valid on a first run
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| LedgerError::Persistence(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| LedgerError::Persistence(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
