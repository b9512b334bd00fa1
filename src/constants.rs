//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Project layout constants
pub mod layout {
    /// Project data directory name
    pub const PROJECT_DIR: &str = ".docledger";

    /// Config file name inside the project directory
    pub const CONFIG_FILE: &str = "config.toml";

    /// Default ledger database path (relative to the project root)
    pub const DEFAULT_DATABASE: &str = ".docledger/ledger.db";

    /// Environment variable prefix for config overrides
    pub const ENV_PREFIX: &str = "DOCLEDGER_";
}

/// Extraction constants
pub mod extraction {
    /// Maximum file size to scan (1MB)
    pub const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Directories excluded from every category: vendored, third-party,
    /// build output and tests
    pub const DEFAULT_EXCLUDES: &[&str] = &[
        "**/.git/**",
        "**/node_modules/**",
        "**/vendor/**",
        "**/third_party/**",
        "**/third-party/**",
        "**/target/**",
        "**/dist/**",
        "**/build/**",
        "**/tests/**",
        "**/test/**",
        "**/__pycache__/**",
        "**/.venv/**",
    ];
}

/// Reconciliation constants
pub mod reconcile {
    /// Reason attached when a documented entity disappears from the source
    pub const DRIFT_REASON: &str = "source entity no longer detected";

    /// Reason attached when a pending entity disappears and is kept for review
    pub const PENDING_DRIFT_REASON: &str = "source entity no longer detected before documentation";
}

/// Campaign constants
pub mod campaign {
    /// Default coverage target (fraction)
    pub const DEFAULT_TARGET_COVERAGE: f64 = 0.95;

    /// Consecutive runs at or above target required to converge
    pub const CONVERGENCE_RUNS: usize = 2;
}

/// Documentation driver constants
pub mod driver {
    /// Default pending entries fetched per batch
    pub const DEFAULT_BATCH_SIZE: usize = 20;

    /// Default concurrent documentation attempts
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// Default per-entity timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

    /// Exit code a driver command uses to request manual review
    pub const MANUAL_REVIEW_EXIT_CODE: i32 = 3;

    /// Maximum stderr characters kept as an error reason
    pub const MAX_REASON_CHARS: usize = 500;
}

/// Storage constants
pub mod storage {
    /// Connection acquisition timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

    /// SQLite busy timeout (milliseconds)
    pub const BUSY_TIMEOUT_MS: u64 = 5000;
}
