//! Progress Aggregator
//!
//! Pure read over the manifest store. Coverage is always recomputed from the
//! manifests, never stored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::ManifestStore;
use crate::types::{CategoryManifest, ProgressRecord, Result, ratio};

/// Totals across every category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverallProgress {
    pub discovered: usize,
    pub documented: usize,
    pub pending: usize,
    pub error: usize,
    pub manual_review: usize,
    /// Weighted `Σ documented / Σ discovered`; empty categories do not count
    pub coverage: Option<f64>,
    /// Categories with at least one discovered entity
    pub categories_counted: usize,
}

impl OverallProgress {
    pub fn gaps(&self) -> usize {
        self.error + self.manual_review
    }

    pub fn processed(&self) -> usize {
        self.documented + self.error + self.manual_review
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub computed_at: DateTime<Utc>,
    pub categories: BTreeMap<String, ProgressRecord>,
    pub overall: OverallProgress,
}

impl ProgressReport {
    pub fn category(&self, name: &str) -> Option<&ProgressRecord> {
        self.categories.get(name)
    }
}

pub struct ProgressAggregator;

impl ProgressAggregator {
    /// Compute progress from one consistent snapshot of the store
    pub fn compute(store: &ManifestStore) -> Result<ProgressReport> {
        Ok(Self::from_manifests(&store.load_all()?))
    }

    pub fn from_manifests(manifests: &[CategoryManifest]) -> ProgressReport {
        let categories: BTreeMap<String, ProgressRecord> = manifests
            .iter()
            .map(|m| (m.category.clone(), Self::record(m)))
            .collect();

        let mut overall = OverallProgress::default();
        for record in categories.values() {
            if record.discovered == 0 {
                continue;
            }
            overall.categories_counted += 1;
            overall.discovered += record.discovered;
            overall.documented += record.documented;
            overall.pending += record.pending;
            overall.error += record.error;
            overall.manual_review += record.manual_review;
        }
        overall.coverage = ratio(overall.documented, overall.discovered);

        ProgressReport {
            computed_at: Utc::now(),
            categories,
            overall,
        }
    }

    pub fn record(manifest: &CategoryManifest) -> ProgressRecord {
        let mut record = ProgressRecord::new(&manifest.category);
        for entry in &manifest.entries {
            record.count(entry.status);
        }
        record
    }

    /// Overall coverage straight from the store
    pub fn overall_coverage(store: &ManifestStore) -> Result<Option<f64>> {
        Ok(Self::compute(store)?.overall.coverage)
    }

    /// Current number of unresolved gaps
    pub fn gap_count(manifests: &[CategoryManifest]) -> usize {
        manifests
            .iter()
            .flat_map(|m| m.entries.iter())
            .filter(|e| e.status.is_gap())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityCandidate, EntryStatus, Location, ManifestEntry};

    fn manifest(category: &str, statuses: &[EntryStatus]) -> CategoryManifest {
        let mut manifest = CategoryManifest::empty(category, "/src");
        for (i, status) in statuses.iter().enumerate() {
            let candidate =
                EntityCandidate::new(category, format!("e{}", i), Location::new("a.rs", i as u32 + 1));
            manifest.entries.push(
                ManifestEntry::pending(&candidate)
                    .with_status(*status, Some("why".to_string())),
            );
        }
        manifest
    }

    #[test]
    fn test_weighted_overall_excludes_empty_categories() {
        use EntryStatus::*;
        let manifests = vec![
            manifest("class", &[Documented, Documented, Pending, Pending]),
            manifest("function", &[Documented, Error, ManualReview, Pending, Pending, Pending]),
            manifest("route", &[]),
        ];

        let report = ProgressAggregator::from_manifests(&manifests);

        assert_eq!(report.category("route").unwrap().coverage, None);
        assert_eq!(report.category("class").unwrap().coverage, Some(0.5));

        assert_eq!(report.overall.discovered, 10);
        assert_eq!(report.overall.documented, 3);
        assert_eq!(report.overall.coverage, Some(0.3));
        assert_eq!(report.overall.categories_counted, 2);
        assert_eq!(report.overall.gaps(), 2);
        assert_eq!(report.overall.processed(), 5);
    }

    #[test]
    fn test_all_empty_is_not_applicable() {
        let report = ProgressAggregator::from_manifests(&[manifest("hook", &[])]);
        assert_eq!(report.overall.coverage, None);
    }

    #[test]
    fn test_fully_processed_differs_from_fully_documented() {
        use EntryStatus::*;
        let manifests = vec![manifest("class", &[Documented, Error, ManualReview])];
        let report = ProgressAggregator::from_manifests(&manifests);
        assert_eq!(report.overall.processed(), report.overall.discovered);
        assert_ne!(report.overall.coverage, Some(1.0));
        assert_eq!(ProgressAggregator::gap_count(&manifests), 2);
    }
}
