//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global and project (.docledger/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{campaign, driver, extraction, layout};
use crate::types::{LedgerError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Project-specific settings
    pub project: ProjectConfig,

    /// Source tree settings
    pub source: SourceConfig,

    /// Ledger persistence settings
    pub storage: StorageConfig,

    /// Reconciliation policy
    pub reconcile: ReconcileConfig,

    /// Campaign convergence settings
    pub campaign: CampaignConfig,

    /// Documentation driver settings
    pub driver: DriverConfig,

    /// Entity categories and their matching rules
    pub categories: Vec<CategoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            project: ProjectConfig::default(),
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            reconcile: ReconcileConfig::default(),
            campaign: CampaignConfig::default(),
            driver: DriverConfig::default(),
            categories: Vec::new(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `LedgerError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.campaign.target_coverage) {
            return Err(LedgerError::Config(format!(
                "campaign.target_coverage must be between 0.0 and 1.0, got {}",
                self.campaign.target_coverage
            )));
        }

        if let Some(threshold) = self.reconcile.bulk_review_threshold
            && !(threshold > 0.0 && threshold <= 1.0)
        {
            return Err(LedgerError::Config(format!(
                "reconcile.bulk_review_threshold must be in (0.0, 1.0], got {}",
                threshold
            )));
        }

        if self.driver.batch_size == 0 {
            return Err(LedgerError::Config(
                "driver.batch_size must be greater than 0".to_string(),
            ));
        }

        if self.driver.concurrency == 0 {
            return Err(LedgerError::Config(
                "driver.concurrency must be greater than 0".to_string(),
            ));
        }

        if self.driver.timeout_secs == 0 {
            return Err(LedgerError::Config(
                "driver.timeout_secs must be greater than 0".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(LedgerError::Config(
                    "category name must not be empty".to_string(),
                ));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(LedgerError::Config(format!(
                    "category '{}' is configured twice",
                    category.name
                )));
            }
        }

        Ok(())
    }

    /// Look up a configured category by name
    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }
}

// =============================================================================
// Project / Source / Storage
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name (defaults to directory name)
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Root of the source tree to scan
    pub root: PathBuf,

    /// Exclusion globs applied to every category
    pub exclude: Vec<String>,

    /// Maximum file size in bytes
    pub max_file_size: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            exclude: extraction::DEFAULT_EXCLUDES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: extraction::MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite ledger path
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(layout::DEFAULT_DATABASE),
        }
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// What happens to a never-documented entry the extractor stops reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingPendingPolicy {
    /// Remove it; never-documented items carry no history
    #[default]
    Drop,
    /// Keep it untouched
    Retain,
    /// Flag it for manual review
    Review,
}

impl std::fmt::Display for MissingPendingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::Retain => write!(f, "retain"),
            Self::Review => write!(f, "review"),
        }
    }
}

impl std::str::FromStr for MissingPendingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "retain" => Ok(Self::Retain),
            "review" => Ok(Self::Review),
            _ => Err(format!(
                "Unknown missing-pending policy: {}. Valid values: drop, retain, review",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Policy for pending entries missing from a pass
    pub missing_pending: MissingPendingPolicy,

    /// Fraction of a category's pending entries that, when missing in one
    /// pass, escalates `drop` to `review` for that pass
    pub bulk_review_threshold: Option<f64>,
}

// =============================================================================
// Campaign / Driver
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Coverage fraction at which the campaign is considered done
    pub target_coverage: f64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            target_coverage: campaign::DEFAULT_TARGET_COVERAGE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Shell command run once per pending entity
    pub command: Option<String>,

    /// Pending entries fetched per batch
    pub batch_size: usize,

    /// Concurrent documentation attempts
    pub concurrency: usize,

    /// Per-entity timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command: None,
            batch_size: driver::DEFAULT_BATCH_SIZE,
            concurrency: driver::DEFAULT_CONCURRENCY,
            timeout_secs: driver::DEFAULT_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Categories
// =============================================================================

/// One entity category and its opaque matching rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Category name ("class", "function", "hook", ...)
    pub name: String,

    /// Line regex; the `name` capture group (or group 1) is the item name
    pub pattern: String,

    /// File globs the rule applies to
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Exclusion globs on top of `source.exclude`
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

impl CategoryConfig {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            include: default_include(),
            exclude: Vec::new(),
        }
    }

    pub fn with_include(mut self, include: Vec<String>) -> Self {
        self.include = include;
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
