//! End-to-end campaign over a small source tree: discover, document, lose
//! code, and stall.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use docledger::config::{CategoryConfig, MissingPendingPolicy};
use docledger::storage::Actor;
use docledger::types::{CampaignStatus, EntryStatus, ManifestEntry, Outcome, RunId};
use docledger::{Config, DocumentationDriver, Result, Tracker};

struct AlwaysDocuments;

#[async_trait]
impl DocumentationDriver for AlwaysDocuments {
    fn name(&self) -> &str {
        "always"
    }

    async fn document(&self, _entry: &ManifestEntry) -> Result<Outcome> {
        Ok(Outcome::Documented)
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.categories = vec![
        CategoryConfig::new("function", r"^fn (?P<name>\w+)")
            .with_include(vec!["**/*.rs".to_string()]),
    ];
    config
}

/// Ten functions, one per line; `skip` lines are left blank so line numbers
/// of the survivors stay put
fn write_source(root: &Path, skip: &[u32]) {
    let body: String = (1..=10)
        .map(|line| {
            if skip.contains(&line) {
                "\n".to_string()
            } else {
                format!("fn f{}() {{}}\n", line)
            }
        })
        .collect();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/lib.rs"), body).unwrap();
}

fn open(dir: &TempDir, config: Config) -> Tracker {
    Tracker::open(config, dir.path()).unwrap()
}

#[tokio::test]
async fn test_campaign_from_discovery_to_plateau() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), &[]);
    let tracker = open(&dir, config());

    // Discovery: everything pending, nothing covered
    let first = tracker.verify().await.unwrap();
    let pending = tracker
        .store()
        .list_by_status("function", EntryStatus::Pending)
        .unwrap();
    assert_eq!(pending.len(), 10);
    assert_eq!(first.run.overall_coverage, Some(0.0));
    assert_eq!(first.run.gaps_found, 0);

    // A driver documents seven of them
    let summary = tracker
        .driver_runner(Arc::new(AlwaysDocuments))
        .run(None, Some(7))
        .await
        .unwrap();
    assert_eq!(summary.documented, 7);

    let second = tracker.verify().await.unwrap();
    assert_eq!(second.run.overall_coverage, Some(0.7));
    assert_eq!(second.run.gaps_found, 0);
    assert!(tracker.gap_log().list(None).unwrap().is_empty());
    // Equal gap counts plateau even while coverage climbs
    assert_eq!(second.campaign, CampaignStatus::Plateaued);

    // Two documented functions disappear from the code
    let documented = tracker
        .store()
        .list_by_status("function", EntryStatus::Documented)
        .unwrap();
    let vanished: Vec<u32> = documented[..2]
        .iter()
        .map(|e| e.location.line_number)
        .collect();
    write_source(dir.path(), &vanished);

    let third = tracker.verify().await.unwrap();
    assert_eq!(third.run.sequence_number, 3);
    assert_eq!(third.run.overall_coverage, Some(0.5));
    assert_eq!(third.run.gaps_found, 2);
    assert_eq!(third.campaign, CampaignStatus::InProgress);

    let review = tracker
        .store()
        .list_by_status("function", EntryStatus::ManualReview)
        .unwrap();
    assert_eq!(review.len(), 2);
    assert!(review.iter().all(|e| vanished.contains(&e.location.line_number)));

    let gaps = tracker.gap_log().for_run(RunId::new(3)).unwrap();
    assert_eq!(gaps.len(), 2);
    assert!(gaps.iter().all(|g| g.discovered_at_run == 3));

    // Nothing changes: same gaps, no coverage gain
    let fourth = tracker.verify().await.unwrap();
    assert_eq!(fourth.run.gaps_found, 2);
    assert_eq!(fourth.campaign, CampaignStatus::Plateaued);
    assert!(!fourth.campaign.should_continue());

    // Plateau does not re-log the same gaps
    assert_eq!(tracker.gap_log().list(None).unwrap().len(), 2);
}

#[tokio::test]
async fn test_rescan_without_changes_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), &[]);
    let tracker = open(&dir, config());

    tracker.verify().await.unwrap();
    let digest = tracker.store().digest("function").unwrap();
    let exported = tracker.store().export("function").unwrap();

    tracker.verify().await.unwrap();
    assert_eq!(tracker.store().digest("function").unwrap(), digest);
    assert_eq!(tracker.store().export("function").unwrap(), exported);
}

#[tokio::test]
async fn test_processed_entries_survive_disappearance() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), &[]);
    let tracker = open(&dir, config());
    tracker.verify().await.unwrap();

    let store = tracker.store();
    let entries = store
        .list_by_status("function", EntryStatus::Pending)
        .unwrap();
    store
        .report_result(
            &entries[0].key(),
            &Outcome::Error("generated docs failed to parse".to_string()),
            Actor::Driver,
        )
        .unwrap();
    store
        .report_result(
            &entries[1].key(),
            &Outcome::ManualReview("ambiguous overload".to_string()),
            Actor::Driver,
        )
        .unwrap();

    // Lines 1-3 vanish: one error, one manual review, one pending
    write_source(dir.path(), &[1, 2, 3]);
    let report = tracker.verify().await.unwrap();

    let manifest = store.load("function").unwrap();
    assert_eq!(manifest.entries.len(), 9);
    assert_eq!(manifest.find(&entries[0].key()).unwrap().status, EntryStatus::Error);
    assert_eq!(
        manifest.find(&entries[1].key()).unwrap().status,
        EntryStatus::ManualReview
    );
    assert!(manifest.find(&entries[2].key()).is_none());

    let outcome = report.categories[0].outcome.as_ref().unwrap();
    assert_eq!(outcome.dropped, 1);
    assert_eq!(outcome.retained, 2);
}

#[tokio::test]
async fn test_review_policy_flags_vanished_pending() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), &[]);
    let mut config = config();
    config.reconcile.missing_pending = MissingPendingPolicy::Review;
    let tracker = open(&dir, config);
    tracker.verify().await.unwrap();

    write_source(dir.path(), &[10]);
    let report = tracker.verify().await.unwrap();

    assert_eq!(report.run.gaps_found, 1);
    let review = tracker
        .store()
        .list_by_status("function", EntryStatus::ManualReview)
        .unwrap();
    assert_eq!(review.len(), 1);
    assert_eq!(review[0].item_name, "f10");
}

#[tokio::test]
async fn test_ledger_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), &[]);

    {
        let tracker = open(&dir, config());
        tracker.verify().await.unwrap();
        tracker
            .driver_runner(Arc::new(AlwaysDocuments))
            .run(Some("function"), Some(3))
            .await
            .unwrap();
    }

    let tracker = open(&dir, config());
    let progress = tracker.progress().unwrap();
    assert_eq!(progress.overall.documented, 3);
    assert_eq!(tracker.latest_run_id().unwrap(), RunId::new(1));
    assert_eq!(tracker.campaign_status().unwrap(), CampaignStatus::InProgress);
}
