//! Derived progress, run history and gap records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{EntryStatus, Location};

/// Per-category coverage, always recomputed from the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub category: String,
    pub discovered: usize,
    pub documented: usize,
    pub pending: usize,
    pub error: usize,
    pub manual_review: usize,
    /// `None` when nothing was discovered (N/A, not 0% or 100%)
    pub coverage: Option<f64>,
}

impl ProgressRecord {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            discovered: 0,
            documented: 0,
            pending: 0,
            error: 0,
            manual_review: 0,
            coverage: None,
        }
    }

    pub fn count(&mut self, status: EntryStatus) {
        self.discovered += 1;
        match status {
            EntryStatus::Pending => self.pending += 1,
            EntryStatus::Documented => self.documented += 1,
            EntryStatus::Error => self.error += 1,
            EntryStatus::ManualReview => self.manual_review += 1,
        }
        self.coverage = Some(self.documented as f64 / self.discovered as f64);
    }

    /// Entries no longer waiting on the driver, whatever the outcome
    pub fn processed(&self) -> usize {
        self.documented + self.error + self.manual_review
    }

    pub fn gaps(&self) -> usize {
        self.error + self.manual_review
    }
}

/// Immutable snapshot appended after each reconciliation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRun {
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    pub coverage_before: Option<f64>,
    pub overall_coverage: Option<f64>,
    pub gaps_found: usize,
    pub categories_failed: usize,
}

/// Append-only record of an entity that could not be reconciled to documented
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapLogEntry {
    pub category: String,
    pub item_name: String,
    pub location: Location,
    pub reason: String,
    pub discovered_at_run: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Where a documentation campaign stands, judged from run history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignStatus {
    NotStarted,
    InProgress,
    /// Coverage met the target on the last two runs
    Converged,
    /// The last two runs found the same number of gaps
    Plateaued,
}

impl CampaignStatus {
    /// Whether more driver work should be scheduled
    pub fn should_continue(&self) -> bool {
        matches!(self, Self::NotStarted | Self::InProgress)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::InProgress => write!(f, "in progress"),
            Self::Converged => write!(f, "converged"),
            Self::Plateaued => write!(f, "plateaued"),
        }
    }
}
