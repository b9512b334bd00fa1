//! Verification runs
//!
//! One run = extract every category concurrently, reconcile each successful
//! category into its manifest, then snapshot coverage and gaps into the run
//! history. A category whose extraction fails is reported and its manifest
//! is left untouched; persistence failures abort the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::constants::campaign::CONVERGENCE_RUNS;
use crate::driver::{DocumentationDriver, DriverRunner};
use crate::extractor::ExtractorSet;
use crate::progress::{ProgressAggregator, ProgressReport};
use crate::reconcile::{ReconcileOutcome, Reconciler, campaign_status};
use crate::storage::{Database, GapLog, ManifestStore, RunHistory, SharedDatabase};
use crate::types::{
    CampaignStatus, CategoryManifest, LedgerError, Result, RunId, VerificationRun,
};

/// Per-category result of a run
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRun {
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconcileOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CategoryRun {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run: VerificationRun,
    pub categories: Vec<CategoryRun>,
    pub campaign: CampaignStatus,
}

pub struct Tracker {
    config: Config,
    source_root: PathBuf,
    db: SharedDatabase,
    store: Arc<ManifestStore>,
    extractors: ExtractorSet,
    reconciler: Reconciler,
}

impl Tracker {
    /// Open the ledger of a project, resolving paths against `project_root`
    pub fn open(config: Config, project_root: &Path) -> Result<Self> {
        let db_path = project_root.join(&config.storage.database);
        let db = Database::open(&db_path)?;
        db.initialize()?;

        let source_root = project_root.join(&config.source.root);
        let extractors = ExtractorSet::from_config(&config)?;
        Ok(Self::with_parts(config, source_root, Arc::new(db), extractors))
    }

    /// Assemble a tracker from explicit parts
    pub fn with_parts(
        config: Config,
        source_root: impl Into<PathBuf>,
        db: SharedDatabase,
        extractors: ExtractorSet,
    ) -> Self {
        let reconciler = Reconciler::from_config(&config.reconcile);
        Self {
            store: Arc::new(ManifestStore::new(Arc::clone(&db))),
            config,
            source_root: source_root.into(),
            db,
            extractors,
            reconciler,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<ManifestStore> {
        &self.store
    }

    pub fn gap_log(&self) -> GapLog {
        GapLog::new(Arc::clone(&self.db))
    }

    pub fn history(&self) -> RunHistory {
        RunHistory::new(Arc::clone(&self.db))
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    fn source_label(&self) -> String {
        self.source_root.display().to_string()
    }

    /// Run one verification pass over every configured category
    #[instrument(skip(self), fields(source = %self.source_root.display()))]
    pub async fn verify(&self) -> Result<RunReport> {
        let history = self.history();
        let run_id = history.next_run_id()?;
        let coverage_before = ProgressAggregator::overall_coverage(&self.store)?;
        let source_path = self.source_label();

        let extractions = self.extractors.extract_all(&self.source_root).await;

        let mut categories = Vec::with_capacity(extractions.len());
        for extraction in extractions {
            let category = extraction.category;
            let result = extraction.result.and_then(|candidates| {
                self.reconciler
                    .reconcile(&self.store, &category, &source_path, &candidates, run_id)
            });

            match result {
                Ok(outcome) => categories.push(CategoryRun {
                    category,
                    outcome: Some(outcome),
                    error: None,
                }),
                Err(e) if e.kind().is_isolated() => {
                    warn!("Category '{}' skipped in run {}: {}", category, run_id, e);
                    categories.push(CategoryRun {
                        category,
                        outcome: None,
                        error: Some(e.to_string()),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let manifests = self.store.load_all()?;
        let progress = ProgressAggregator::from_manifests(&manifests);
        let run = VerificationRun {
            sequence_number: run_id.get(),
            timestamp: chrono::Utc::now(),
            coverage_before,
            overall_coverage: progress.overall.coverage,
            gaps_found: ProgressAggregator::gap_count(&manifests),
            categories_failed: categories.iter().filter(|c| c.failed()).count(),
        };
        history.append(&run)?;

        let campaign = self.campaign_status()?;
        info!(
            "Run {} complete: coverage {} -> {}, {} gaps, {} failed categories, campaign {}",
            run_id,
            crate::types::format_coverage(run.coverage_before),
            crate::types::format_coverage(run.overall_coverage),
            run.gaps_found,
            run.categories_failed,
            campaign
        );

        Ok(RunReport {
            run,
            categories,
            campaign,
        })
    }

    /// Extract and plan every category without writing anything
    pub async fn preview(&self) -> Result<Vec<CategoryRun>> {
        let source_path = self.source_label();
        let extractions = self.extractors.extract_all(&self.source_root).await;

        let mut previews = Vec::with_capacity(extractions.len());
        for extraction in extractions {
            let category = extraction.category;
            match extraction.result {
                Ok(candidates) => {
                    let manifest = match self.store.load(&category) {
                        Ok(manifest) => manifest,
                        Err(e) if e.is_not_found() => {
                            CategoryManifest::empty(&category, &source_path)
                        }
                        Err(e) => return Err(e),
                    };
                    let (_, outcome) = self.reconciler.plan(&manifest, &candidates);
                    previews.push(CategoryRun {
                        category,
                        outcome: Some(outcome),
                        error: None,
                    });
                }
                Err(e) => previews.push(CategoryRun {
                    category,
                    outcome: None,
                    error: Some(e.to_string()),
                }),
            }
        }
        Ok(previews)
    }

    pub fn progress(&self) -> Result<ProgressReport> {
        ProgressAggregator::compute(&self.store)
    }

    pub fn campaign_status(&self) -> Result<CampaignStatus> {
        let recent = self.history().recent(CONVERGENCE_RUNS)?;
        Ok(campaign_status(&recent, self.config.campaign.target_coverage))
    }

    pub fn latest_run_id(&self) -> Result<RunId> {
        self.history().latest_run_id()
    }

    /// Runner wired to this ledger and the driver settings from config
    pub fn driver_runner(&self, driver: Arc<dyn DocumentationDriver>) -> DriverRunner {
        DriverRunner::from_config(Arc::clone(&self.store), driver, &self.config.driver)
    }

    /// Runner for the configured shell command, if one is set
    pub fn command_runner(&self) -> Result<DriverRunner> {
        let command = self.config.driver.command.as_deref().ok_or_else(|| {
            LedgerError::Config(
                "No driver command configured; set [driver] command in config.toml".to_string(),
            )
        })?;
        let driver = crate::driver::CommandDriver::new(command, &self.source_root);
        Ok(self.driver_runner(Arc::new(driver)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryConfig;
    use crate::types::EntryStatus;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        dir
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.categories = vec![
            CategoryConfig::new("function", r"fn (?P<name>\w+)")
                .with_include(vec!["**/*.rs".to_string()]),
            CategoryConfig::new("broken", r"class (\w+)")
                .with_include(vec!["**/*.py".to_string()]),
        ];
        config
    }

    fn tracker(dir: &TempDir, config: Config) -> Tracker {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let extractors = ExtractorSet::from_config(&config).unwrap();
        Tracker::with_parts(config, dir.path(), Arc::new(db), extractors)
    }

    #[tokio::test]
    async fn test_verify_records_run_and_is_idempotent() {
        let dir = project(&[("src/lib.rs", "fn alpha() {}\nfn beta() {}\n")]);
        let tracker = tracker(&dir, config());

        let first = tracker.verify().await.unwrap();
        assert_eq!(first.run.sequence_number, 1);
        assert_eq!(first.run.overall_coverage, Some(0.0));
        assert_eq!(first.campaign, CampaignStatus::InProgress);
        let digest = tracker.store().digest("function").unwrap();

        let second = tracker.verify().await.unwrap();
        assert_eq!(second.run.sequence_number, 2);
        assert_eq!(tracker.store().digest("function").unwrap(), digest);
        assert!(tracker.gap_log().list(None).unwrap().is_empty());
        assert_eq!(second.campaign, CampaignStatus::Plateaued);
    }

    #[tokio::test]
    async fn test_failed_category_leaves_manifest_untouched() {
        let dir = project(&[("src/lib.rs", "fn alpha() {}\nfn beta() {}\n")]);
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let db = Arc::new(db);

        let config = config();
        let extractors = ExtractorSet::from_config(&config).unwrap();
        let healthy = Tracker::with_parts(config.clone(), dir.path(), Arc::clone(&db), extractors);
        let first = healthy.verify().await.unwrap();
        assert_eq!(first.run.categories_failed, 0);
        let digest = healthy.store().digest("function").unwrap();
        let exported = healthy.store().export("function").unwrap();

        // Same ledger, but every category now fails to extract
        let extractors = ExtractorSet::from_config(&config).unwrap();
        let broken = Tracker::with_parts(config, dir.path().join("missing"), db, extractors);
        let report = broken.verify().await.unwrap();
        assert_eq!(report.run.sequence_number, 2);
        assert_eq!(report.run.categories_failed, 2);
        assert!(report.categories.iter().all(CategoryRun::failed));

        let store = broken.store();
        assert_eq!(store.digest("function").unwrap(), digest);
        assert_eq!(store.export("function").unwrap(), exported);
        assert_eq!(store.load("function").unwrap().entries.len(), 2);
        assert!(broken.gap_log().list(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_writes_nothing() {
        let dir = project(&[("src/lib.rs", "fn alpha() {}\n")]);
        let tracker = tracker(&dir, config());

        let previews = tracker.preview().await.unwrap();
        let function = previews.iter().find(|p| p.category == "function").unwrap();
        assert_eq!(function.outcome.as_ref().unwrap().new, 1);
        assert!(tracker.store().categories().unwrap().is_empty());
        assert_eq!(tracker.latest_run_id().unwrap(), RunId::NONE);
    }

    #[tokio::test]
    async fn test_documented_then_deleted_becomes_review() {
        let dir = project(&[("src/lib.rs", "fn alpha() {}\nfn beta() {}\n")]);
        let tracker = tracker(&dir, config());
        tracker.verify().await.unwrap();

        let entry = tracker
            .store()
            .list_by_status("function", EntryStatus::Pending)
            .unwrap()
            .remove(1);
        tracker
            .store()
            .report_result(
                &entry.key(),
                &crate::types::Outcome::Documented,
                crate::storage::Actor::Driver,
            )
            .unwrap();

        fs::write(dir.path().join("src/lib.rs"), "fn alpha() {}\n").unwrap();
        let report = tracker.verify().await.unwrap();
        assert_eq!(report.run.gaps_found, 1);

        let manifest = tracker.store().load("function").unwrap();
        let beta = manifest.entries.iter().find(|e| e.item_name == "beta").unwrap();
        assert_eq!(beta.status, EntryStatus::ManualReview);
    }
}
