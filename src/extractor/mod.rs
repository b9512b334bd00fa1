//! Category Extractor Set
//!
//! Independent extractors, one per entity category. Each pass is pure and
//! deterministic for identical inputs, so every category can be scanned
//! concurrently. A failing category is reported on its own and never aborts
//! its siblings.
//!
//! - `scanner`: deterministic, gitignore-aware source tree walk
//! - `rule`: regex matching rule built from category config

pub mod rule;
pub mod scanner;

pub use rule::PatternRule;
pub use scanner::{FileScanner, GlobSet, ScannedFile};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::types::{EntityCandidate, IdentityKey, LedgerError, Result};

/// Anything that can enumerate one category's entities in a source tree
pub trait Extractor: Send + Sync {
    fn category(&self) -> &str;

    fn extract(&self, source_root: &Path) -> Result<Vec<EntityCandidate>>;
}

/// Result of one category's pass
#[derive(Debug)]
pub struct CategoryExtraction {
    pub category: String,
    pub result: Result<Vec<EntityCandidate>>,
}

impl CategoryExtraction {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

struct Registered {
    extractor: Arc<dyn Extractor>,
    exclude: GlobSet,
}

/// Registry of extractors keyed by category
#[derive(Default)]
pub struct ExtractorSet {
    extractors: Vec<Registered>,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build pattern rules for every configured category
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut set = Self::new();
        for category in &config.categories {
            let rule =
                PatternRule::from_config(category, &config.source.exclude, config.source.max_file_size)?;
            let mut exclude = config.source.exclude.clone();
            exclude.extend(category.exclude.iter().cloned());
            set.register(Arc::new(rule), &exclude)?;
        }
        Ok(set)
    }

    /// Register an extractor with the exclusion globs applied to its output
    pub fn register(&mut self, extractor: Arc<dyn Extractor>, exclude: &[String]) -> Result<()> {
        if self
            .extractors
            .iter()
            .any(|r| r.extractor.category() == extractor.category())
        {
            return Err(LedgerError::Config(format!(
                "An extractor for category '{}' is already registered",
                extractor.category()
            )));
        }
        self.extractors.push(Registered {
            extractor,
            exclude: GlobSet::new(exclude)?,
        });
        Ok(())
    }

    pub fn categories(&self) -> Vec<String> {
        self.extractors
            .iter()
            .map(|r| r.extractor.category().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Run a single category synchronously
    pub fn extract_category(&self, category: &str, source_root: &Path) -> Result<Vec<EntityCandidate>> {
        let registered = self
            .extractors
            .iter()
            .find(|r| r.extractor.category() == category)
            .ok_or_else(|| LedgerError::Config(format!("Unknown category '{}'", category)))?;
        run_one(registered.extractor.as_ref(), &registered.exclude, source_root)
    }

    /// Run every category concurrently on the blocking pool.
    ///
    /// Results come back in registration order.
    pub async fn extract_all(&self, source_root: &Path) -> Vec<CategoryExtraction> {
        let root: PathBuf = source_root.to_path_buf();

        let tasks = self.extractors.iter().map(|registered| {
            let extractor = Arc::clone(&registered.extractor);
            let exclude = registered.exclude.clone();
            let root = root.clone();
            let category = extractor.category().to_string();
            async move {
                let handle = tokio::task::spawn_blocking(move || {
                    run_one(extractor.as_ref(), &exclude, &root)
                });
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(LedgerError::extraction(
                        &category,
                        format!("extractor task aborted: {}", e),
                    )),
                };
                CategoryExtraction { category, result }
            }
        });

        futures::future::join_all(tasks).await
    }
}

/// Extract, filter exclusions, and de-duplicate (first match wins).
fn run_one(
    extractor: &dyn Extractor,
    exclude: &GlobSet,
    source_root: &Path,
) -> Result<Vec<EntityCandidate>> {
    let category = extractor.category();
    let raw = extractor.extract(source_root).map_err(|e| match e {
        LedgerError::Extraction { .. } => e,
        other => LedgerError::extraction(category, other.to_string()),
    })?;

    let raw_count = raw.len();
    let mut seen: HashSet<IdentityKey> = HashSet::with_capacity(raw_count);
    let mut candidates = Vec::with_capacity(raw_count);

    for candidate in raw {
        if candidate.category != category {
            tracing::debug!(
                "Dropping candidate {} reported under foreign category by '{}'",
                candidate.key(),
                category
            );
            continue;
        }
        if exclude.matches(&candidate.location.file_path) {
            continue;
        }
        if seen.insert(candidate.key()) {
            candidates.push(candidate);
        }
    }

    tracing::debug!(
        "Category '{}': {} candidates ({} raw)",
        category,
        candidates.len(),
        raw_count
    );

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    struct Fixed {
        category: &'static str,
        items: Vec<(&'static str, &'static str, u32)>,
    }

    impl Extractor for Fixed {
        fn category(&self) -> &str {
            self.category
        }

        fn extract(&self, _source_root: &Path) -> Result<Vec<EntityCandidate>> {
            Ok(self
                .items
                .iter()
                .map(|(name, file, line)| {
                    EntityCandidate::new(self.category, *name, Location::new(*file, *line))
                })
                .collect())
        }
    }

    struct Failing;

    impl Extractor for Failing {
        fn category(&self) -> &str {
            "route"
        }

        fn extract(&self, _source_root: &Path) -> Result<Vec<EntityCandidate>> {
            Err(LedgerError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "unreadable path",
            )))
        }
    }

    #[test]
    fn test_dedup_first_match_wins_and_excludes() {
        let mut set = ExtractorSet::new();
        set.register(
            Arc::new(Fixed {
                category: "class",
                items: vec![
                    ("User", "src/user.rs", 3),
                    ("User", "src/user.rs", 3),
                    ("User", "src/admin.rs", 3),
                    ("Fixture", "tests/fixture.rs", 1),
                ],
            }),
            &["tests/**".to_string()],
        )
        .unwrap();

        let found = set.extract_category("class", Path::new(".")).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].location.file_path, "src/user.rs");
        assert_eq!(found[1].location.file_path, "src/admin.rs");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut set = ExtractorSet::new();
        set.register(Arc::new(Failing), &[]).unwrap();
        assert!(set.register(Arc::new(Failing), &[]).is_err());
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_category() {
        let mut set = ExtractorSet::new();
        set.register(Arc::new(Failing), &[]).unwrap();
        set.register(
            Arc::new(Fixed {
                category: "function",
                items: vec![("main", "src/main.rs", 1)],
            }),
            &[],
        )
        .unwrap();

        let results = set.extract_all(Path::new(".")).await;
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].category, "route");
        assert!(matches!(
            results[0].result,
            Err(LedgerError::Extraction { .. })
        ));

        assert_eq!(results[1].category, "function");
        assert_eq!(results[1].result.as_ref().unwrap().len(), 1);
    }
}
