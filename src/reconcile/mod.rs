//! Reconciler
//!
//! Merges a fresh extraction pass into a category manifest. Every observed
//! or persisted identity key is classified exactly once:
//!
//! - **New**: extracted but not in the manifest, inserted as `Pending`
//! - **Unchanged**: extracted and already present, status untouched
//! - **Missing**: persisted but not extracted, resolved by status:
//!   `Documented` becomes `ManualReview` (never deleted), `Pending` follows
//!   the missing-pending policy, `Error`/`ManualReview` are kept as they are
//!
//! Planning is pure; [`Reconciler::reconcile`] applies the plan under the
//! category's write lock.

pub mod campaign;

pub use campaign::campaign_status;

use std::collections::HashSet;

use serde::Serialize;

use crate::config::{MissingPendingPolicy, ReconcileConfig};
use crate::constants::reconcile::{DRIFT_REASON, PENDING_DRIFT_REASON};
use crate::storage::{Actor, ChangeSet, ManifestStore, StatusChange};
use crate::types::{
    CategoryManifest, EntityCandidate, EntryStatus, IdentityKey, ManifestEntry, Result, RunId,
};

/// Counts for one category pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub category: String,
    pub new: usize,
    pub unchanged: usize,
    pub missing: usize,
    /// Missing `Documented` entries flagged for manual review
    pub drifted: usize,
    /// Missing `Pending` entries dropped
    pub dropped: usize,
    /// Missing `Pending` entries flagged for manual review
    pub pending_flagged: usize,
    /// Missing entries left untouched
    pub retained: usize,
    /// The drop policy was escalated to review for this pass
    pub escalated: bool,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.new + self.drifted + self.dropped + self.pending_flagged > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    missing_pending: MissingPendingPolicy,
    bulk_review_threshold: Option<f64>,
}

impl Reconciler {
    pub fn new(missing_pending: MissingPendingPolicy) -> Self {
        Self {
            missing_pending,
            bulk_review_threshold: None,
        }
    }

    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            missing_pending: config.missing_pending,
            bulk_review_threshold: config.bulk_review_threshold,
        }
    }

    pub fn with_bulk_review_threshold(mut self, threshold: f64) -> Self {
        self.bulk_review_threshold = Some(threshold);
        self
    }

    /// Diff candidates against a manifest without touching storage
    pub fn plan(
        &self,
        manifest: &CategoryManifest,
        candidates: &[EntityCandidate],
    ) -> (ChangeSet, ReconcileOutcome) {
        let mut outcome = ReconcileOutcome {
            category: manifest.category.clone(),
            ..Default::default()
        };
        let mut changes = ChangeSet::default();

        let persisted: HashSet<IdentityKey> = manifest.entries.iter().map(|e| e.key()).collect();
        let mut observed: HashSet<IdentityKey> = HashSet::with_capacity(candidates.len());

        for candidate in candidates {
            if candidate.category != manifest.category {
                continue;
            }
            let key = candidate.key();
            if !observed.insert(key.clone()) {
                continue;
            }
            if persisted.contains(&key) {
                outcome.unchanged += 1;
            } else {
                outcome.new += 1;
                changes.inserts.push(ManifestEntry::pending(candidate));
            }
        }

        let missing: Vec<&ManifestEntry> = manifest
            .entries
            .iter()
            .filter(|e| !observed.contains(&e.key()))
            .collect();
        outcome.missing = missing.len();

        let pending_policy = self.effective_pending_policy(manifest, &missing, &mut outcome);

        for entry in missing {
            match entry.status {
                EntryStatus::Documented => {
                    outcome.drifted += 1;
                    changes.transitions.push(StatusChange {
                        key: entry.key(),
                        from: EntryStatus::Documented,
                        to: EntryStatus::ManualReview,
                        reason: Some(DRIFT_REASON.to_string()),
                    });
                }
                EntryStatus::Pending => match pending_policy {
                    MissingPendingPolicy::Drop => {
                        outcome.dropped += 1;
                        changes.removals.push(entry.key());
                    }
                    MissingPendingPolicy::Review => {
                        outcome.pending_flagged += 1;
                        changes.transitions.push(StatusChange {
                            key: entry.key(),
                            from: EntryStatus::Pending,
                            to: EntryStatus::ManualReview,
                            reason: Some(PENDING_DRIFT_REASON.to_string()),
                        });
                    }
                    MissingPendingPolicy::Retain => outcome.retained += 1,
                },
                EntryStatus::Error | EntryStatus::ManualReview => outcome.retained += 1,
            }
        }

        (changes, outcome)
    }

    /// A large share of pending entries vanishing at once looks like a broken
    /// rule or a rename wave, so `drop` is escalated to `review`.
    fn effective_pending_policy(
        &self,
        manifest: &CategoryManifest,
        missing: &[&ManifestEntry],
        outcome: &mut ReconcileOutcome,
    ) -> MissingPendingPolicy {
        let (MissingPendingPolicy::Drop, Some(threshold)) =
            (self.missing_pending, self.bulk_review_threshold)
        else {
            return self.missing_pending;
        };

        let pending_total = manifest.count_status(EntryStatus::Pending);
        let pending_missing = missing
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .count();
        if pending_total == 0 || pending_missing == 0 {
            return self.missing_pending;
        }

        let fraction = pending_missing as f64 / pending_total as f64;
        if fraction >= threshold {
            tracing::warn!(
                "Category '{}': {} of {} pending entries vanished ({:.0}% >= {:.0}%), flagging for review instead of dropping",
                manifest.category,
                pending_missing,
                pending_total,
                fraction * 100.0,
                threshold * 100.0
            );
            outcome.escalated = true;
            MissingPendingPolicy::Review
        } else {
            self.missing_pending
        }
    }

    /// Plan and apply one category pass atomically
    pub fn reconcile(
        &self,
        store: &ManifestStore,
        category: &str,
        source_path: &str,
        candidates: &[EntityCandidate],
        run_id: RunId,
    ) -> Result<ReconcileOutcome> {
        store.apply(category, source_path, Actor::Reconciler, run_id, |manifest| {
            let (changes, outcome) = self.plan(manifest, candidates);
            tracing::debug!(
                "Category '{}': new={} unchanged={} missing={} drifted={} dropped={}",
                category,
                outcome.new,
                outcome.unchanged,
                outcome.missing,
                outcome.drifted,
                outcome.dropped
            );
            Ok((changes, outcome))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, GapLog};
    use crate::types::Location;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn candidate(name: &str, line: u32) -> EntityCandidate {
        EntityCandidate::new("function", name, Location::new("src/lib.rs", line))
    }

    fn manifest_with(statuses: &[(&str, EntryStatus)]) -> CategoryManifest {
        let mut manifest = CategoryManifest::empty("function", "/src");
        for (i, (name, status)) in statuses.iter().enumerate() {
            let reason = status.requires_reason().then(|| "earlier".to_string());
            manifest.entries.push(
                ManifestEntry::pending(&candidate(name, i as u32 + 1)).with_status(*status, reason),
            );
        }
        manifest
    }

    #[test]
    fn test_first_pass_inserts_pending() {
        let manifest = CategoryManifest::empty("function", "/src");
        let candidates: Vec<_> = (1..=10).map(|i| candidate(&format!("f{}", i), i)).collect();

        let (changes, outcome) = Reconciler::default().plan(&manifest, &candidates);
        assert_eq!(outcome.new, 10);
        assert_eq!(changes.inserts.len(), 10);
        assert!(changes.inserts.iter().all(|e| e.status == EntryStatus::Pending));
    }

    #[test]
    fn test_missing_resolution_by_status() {
        let manifest = manifest_with(&[
            ("kept", EntryStatus::Documented),
            ("gone_doc", EntryStatus::Documented),
            ("gone_pending", EntryStatus::Pending),
            ("gone_error", EntryStatus::Error),
            ("gone_review", EntryStatus::ManualReview),
        ]);
        let candidates = vec![candidate("kept", 1)];

        let (changes, outcome) = Reconciler::default().plan(&manifest, &candidates);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(outcome.missing, 4);
        assert_eq!(outcome.drifted, 1);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.retained, 2);

        assert_eq!(changes.transitions.len(), 1);
        assert_eq!(changes.transitions[0].key.item_name, "gone_doc");
        assert_eq!(changes.transitions[0].to, EntryStatus::ManualReview);
        assert_eq!(changes.transitions[0].reason.as_deref(), Some(DRIFT_REASON));
        assert_eq!(changes.removals[0].item_name, "gone_pending");
    }

    #[test]
    fn test_pending_policies() {
        let manifest = manifest_with(&[("a", EntryStatus::Pending), ("b", EntryStatus::Pending)]);
        let candidates = vec![candidate("a", 1)];

        let (changes, outcome) =
            Reconciler::new(MissingPendingPolicy::Retain).plan(&manifest, &candidates);
        assert!(changes.is_empty());
        assert_eq!(outcome.retained, 1);

        let (changes, outcome) =
            Reconciler::new(MissingPendingPolicy::Review).plan(&manifest, &candidates);
        assert_eq!(outcome.pending_flagged, 1);
        assert_eq!(
            changes.transitions[0].reason.as_deref(),
            Some(PENDING_DRIFT_REASON)
        );
    }

    #[test]
    fn test_bulk_disappearance_escalates_drop_to_review() {
        let manifest = manifest_with(&[
            ("a", EntryStatus::Pending),
            ("b", EntryStatus::Pending),
            ("c", EntryStatus::Pending),
            ("d", EntryStatus::Pending),
        ]);
        let reconciler =
            Reconciler::new(MissingPendingPolicy::Drop).with_bulk_review_threshold(0.5);

        // One of four missing: below threshold, dropped
        let candidates = vec![candidate("a", 1), candidate("b", 2), candidate("c", 3)];
        let (_, outcome) = reconciler.plan(&manifest, &candidates);
        assert_eq!(outcome.dropped, 1);
        assert!(!outcome.escalated);

        // Three of four missing: escalated
        let (changes, outcome) = reconciler.plan(&manifest, &[candidate("a", 1)]);
        assert!(outcome.escalated);
        assert_eq!(outcome.dropped, 0);
        assert_eq!(outcome.pending_flagged, 3);
        assert!(changes.removals.is_empty());
    }

    #[test]
    fn test_reappearing_entry_keeps_status() {
        let manifest = manifest_with(&[("back", EntryStatus::ManualReview)]);
        let (changes, outcome) = Reconciler::default().plan(&manifest, &[candidate("back", 1)]);
        assert!(changes.is_empty());
        assert_eq!(outcome.unchanged, 1);
    }

    #[test]
    fn test_reconcile_logs_drift_with_run_id() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let db = Arc::new(db);
        let store = ManifestStore::new(Arc::clone(&db));
        let reconciler = Reconciler::default();

        let candidates = vec![candidate("a", 1), candidate("b", 2)];
        reconciler
            .reconcile(&store, "function", "/src", &candidates, RunId::new(1))
            .unwrap();
        store
            .report_result(
                &candidates[1].key(),
                &crate::types::Outcome::Documented,
                Actor::Driver,
            )
            .unwrap();

        let outcome = reconciler
            .reconcile(&store, "function", "/src", &candidates[..1], RunId::new(2))
            .unwrap();
        assert_eq!(outcome.drifted, 1);

        let gaps = GapLog::new(db).for_run(RunId::new(2)).unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].item_name, "b");
        assert_eq!(gaps[0].reason, DRIFT_REASON);
    }

    fn status_strategy() -> impl Strategy<Value = EntryStatus> {
        prop_oneof![
            Just(EntryStatus::Pending),
            Just(EntryStatus::Documented),
            Just(EntryStatus::Error),
            Just(EntryStatus::ManualReview),
        ]
    }

    fn policy_strategy() -> impl Strategy<Value = MissingPendingPolicy> {
        prop_oneof![
            Just(MissingPendingPolicy::Drop),
            Just(MissingPendingPolicy::Retain),
            Just(MissingPendingPolicy::Review),
        ]
    }

    proptest! {
        #[test]
        fn prop_documented_never_removed_and_rerun_is_noop(
            statuses in prop::collection::vec(status_strategy(), 0..24),
            keep in prop::collection::vec(any::<bool>(), 24),
            extra in 0usize..6,
            policy in policy_strategy(),
        ) {
            let names: Vec<String> = (0..statuses.len()).map(|i| format!("f{}", i)).collect();
            let pairs: Vec<(&str, EntryStatus)> = names
                .iter()
                .map(String::as_str)
                .zip(statuses.iter().copied())
                .collect();
            let manifest = manifest_with(&pairs);

            let mut candidates: Vec<EntityCandidate> = manifest
                .entries
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(e, _)| EntityCandidate::new(&e.category, &e.item_name, e.location.clone()))
                .collect();
            for i in 0..extra {
                candidates.push(candidate(&format!("new{}", i), 1000 + i as u32));
            }

            let reconciler = Reconciler::new(policy);
            let (changes, outcome) = reconciler.plan(&manifest, &candidates);

            // Every key classified exactly once
            prop_assert_eq!(outcome.new, extra);
            prop_assert_eq!(outcome.unchanged + outcome.missing, manifest.entries.len());
            prop_assert_eq!(
                outcome.missing,
                outcome.drifted + outcome.dropped + outcome.pending_flagged + outcome.retained
            );

            // Protection: documented entries are never removed
            for key in &changes.removals {
                let entry = manifest.find(key).unwrap();
                prop_assert_eq!(entry.status, EntryStatus::Pending);
            }

            // Conservation after applying
            let next = changes.applied_to(&manifest);
            let total: usize = EntryStatus::ALL.iter().map(|s| next.count_status(*s)).sum();
            prop_assert_eq!(total, next.entries.len());
            prop_assert_eq!(
                next.entries.len(),
                manifest.entries.len() + extra - outcome.dropped
            );

            // Idempotence: a second pass over the same candidates changes nothing
            let (again, _) = reconciler.plan(&next, &candidates);
            prop_assert!(again.is_empty());
        }
    }
}
