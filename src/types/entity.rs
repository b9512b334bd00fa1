//! Entity and manifest model
//!
//! Candidates are produced fresh by every extraction pass and are never
//! persisted directly. Manifest entries are the persisted unit, keyed by
//! `(category, item_name, location)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source position of a named entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub file_path: String,
    /// 1-based line number
    pub line_number: u32,
}

impl Location {
    pub fn new(file_path: impl Into<String>, line_number: u32) -> Self {
        Self {
            file_path: file_path.into(),
            line_number,
        }
    }

    /// Parse `path:line`, splitting on the last colon so paths may contain colons
    pub fn parse(s: &str) -> Option<Self> {
        let (path, line) = s.rsplit_once(':')?;
        if path.is_empty() {
            return None;
        }
        let line_number = line.trim().parse().ok()?;
        Some(Self::new(path, line_number))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_path, self.line_number)
    }
}

/// Identity of a manifest entry.
///
/// Same name at a different location is a different entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub category: String,
    pub item_name: String,
    pub location: Location,
}

impl IdentityKey {
    pub fn new(category: impl Into<String>, item_name: impl Into<String>, location: Location) -> Self {
        Self {
            category: category.into(),
            item_name: item_name.into(),
            location,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.category, self.item_name, self.location)
    }
}

/// One match produced by an extractor pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCandidate {
    pub category: String,
    pub item_name: String,
    pub location: Location,
}

impl EntityCandidate {
    pub fn new(category: impl Into<String>, item_name: impl Into<String>, location: Location) -> Self {
        Self {
            category: category.into(),
            item_name: item_name.into(),
            location,
        }
    }

    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.category, &self.item_name, self.location.clone())
    }
}

// =============================================================================
// Status
// =============================================================================

/// Documentation status of a manifest entry.
///
/// `Pending` is the only working state; the other three are terminal until
/// an operator requeues the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    Pending,
    Documented,
    Error,
    ManualReview,
}

impl EntryStatus {
    pub const ALL: [EntryStatus; 4] = [
        EntryStatus::Pending,
        EntryStatus::Documented,
        EntryStatus::Error,
        EntryStatus::ManualReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Documented => "documented",
            Self::Error => "error",
            Self::ManualReview => "manual-review",
        }
    }

    /// Checkbox marker used by the manifest record format
    pub fn marker(&self) -> char {
        match self {
            Self::Pending => ' ',
            Self::Documented => 'x',
            Self::Error => '!',
            Self::ManualReview => '?',
        }
    }

    pub fn from_marker(c: char) -> Option<Self> {
        match c {
            ' ' => Some(Self::Pending),
            'x' | 'X' => Some(Self::Documented),
            '!' => Some(Self::Error),
            '?' => Some(Self::ManualReview),
            _ => None,
        }
    }

    /// Whether entries in this status carry a reason
    pub fn requires_reason(&self) -> bool {
        matches!(self, Self::Error | Self::ManualReview)
    }

    /// Unresolved gaps: visible failures that block a clean campaign
    pub fn is_gap(&self) -> bool {
        matches!(self, Self::Error | Self::ManualReview)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "documented" => Ok(Self::Documented),
            "error" => Ok(Self::Error),
            "manual-review" | "manual_review" | "review" => Ok(Self::ManualReview),
            _ => Err(format!(
                "Unknown status: {}. Valid values: pending, documented, error, manual-review",
                s
            )),
        }
    }
}

/// Result reported back by the documentation driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "kebab-case")]
pub enum Outcome {
    Documented,
    Error(String),
    ManualReview(String),
}

impl Outcome {
    pub fn status(&self) -> EntryStatus {
        match self {
            Self::Documented => EntryStatus::Documented,
            Self::Error(_) => EntryStatus::Error,
            Self::ManualReview(_) => EntryStatus::ManualReview,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Documented => None,
            Self::Error(r) | Self::ManualReview(r) => Some(r),
        }
    }

    /// Build an outcome from a status tag and optional reason
    pub fn from_status(status: EntryStatus, reason: Option<String>) -> Option<Self> {
        match status {
            EntryStatus::Documented => Some(Self::Documented),
            EntryStatus::Error => Some(Self::Error(reason.unwrap_or_default())),
            EntryStatus::ManualReview => Some(Self::ManualReview(reason.unwrap_or_default())),
            EntryStatus::Pending => None,
        }
    }
}

// =============================================================================
// Manifest
// =============================================================================

/// Persisted documentation record for one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub category: String,
    pub item_name: String,
    pub location: Location,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ManifestEntry {
    /// First observation of an entity
    pub fn pending(candidate: &EntityCandidate) -> Self {
        Self {
            category: candidate.category.clone(),
            item_name: candidate.item_name.clone(),
            location: candidate.location.clone(),
            status: EntryStatus::Pending,
            reason: None,
        }
    }

    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.category, &self.item_name, self.location.clone())
    }

    pub fn with_status(mut self, status: EntryStatus, reason: Option<String>) -> Self {
        self.status = status;
        self.reason = if status.requires_reason() { reason } else { None };
        self
    }
}

/// Manifest-level metadata for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub generated_at: DateTime<Utc>,
    pub source_path: String,
    pub total_count: usize,
}

/// Ordered entries of one category, in first-discovered order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryManifest {
    pub category: String,
    pub metadata: ManifestMetadata,
    pub entries: Vec<ManifestEntry>,
}

impl CategoryManifest {
    pub fn empty(category: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            metadata: ManifestMetadata {
                generated_at: Utc::now(),
                source_path: source_path.into(),
                total_count: 0,
            },
            entries: Vec::new(),
        }
    }

    pub fn count_status(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn find(&self, key: &IdentityKey) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| {
            e.item_name == key.item_name && e.location == key.location && e.category == key.category
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parse() {
        assert_eq!(
            Location::parse("src/a.rs:12"),
            Some(Location::new("src/a.rs", 12))
        );
        assert_eq!(
            Location::parse("C:/repo/a.rs:3"),
            Some(Location::new("C:/repo/a.rs", 3))
        );
        assert_eq!(Location::parse("src/a.rs"), None);
        assert_eq!(Location::parse(":4"), None);
    }

    #[test]
    fn test_status_markers() {
        for status in EntryStatus::ALL {
            assert_eq!(EntryStatus::from_marker(status.marker()), Some(status));
            assert_eq!(status.as_str().parse::<EntryStatus>().unwrap(), status);
        }
        assert_eq!(EntryStatus::from_marker('#'), None);
    }

    #[test]
    fn test_same_name_different_location_is_distinct() {
        let a = EntityCandidate::new("function", "new", Location::new("src/a.rs", 1));
        let b = EntityCandidate::new("function", "new", Location::new("src/b.rs", 1));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_with_status_drops_reason_for_clean_states() {
        let candidate = EntityCandidate::new("hook", "init", Location::new("a.php", 2));
        let entry = ManifestEntry::pending(&candidate)
            .with_status(EntryStatus::Documented, Some("ignored".to_string()));
        assert_eq!(entry.reason, None);

        let entry = entry.with_status(EntryStatus::Error, Some("timeout".to_string()));
        assert_eq!(entry.reason.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_outcome_serde_shape() {
        let json = serde_json::to_string(&Outcome::Error("boom".to_string())).unwrap();
        assert_eq!(json, r#"{"outcome":"error","reason":"boom"}"#);
        assert_eq!(Outcome::ManualReview("x".into()).status(), EntryStatus::ManualReview);
    }
}
