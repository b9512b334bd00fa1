//! Regex matching rule
//!
//! Line-oriented extraction configured per category: every match of the
//! pattern in an included file yields one candidate named by the `name`
//! capture group (falling back to group 1, then the whole match).

use regex::Regex;
use std::path::Path;

use super::Extractor;
use super::scanner::{FileScanner, GlobSet};
use crate::config::CategoryConfig;
use crate::types::{EntityCandidate, LedgerError, Location, Result};

pub struct PatternRule {
    category: String,
    pattern: Regex,
    include: GlobSet,
    exclude: GlobSet,
    max_file_size: u64,
}

impl PatternRule {
    /// Compile a rule from category config plus the global exclusion globs
    pub fn from_config(
        config: &CategoryConfig,
        global_exclude: &[String],
        max_file_size: u64,
    ) -> Result<Self> {
        let pattern = Regex::new(&config.pattern).map_err(|e| {
            LedgerError::Config(format!(
                "Invalid pattern for category '{}': {}",
                config.name, e
            ))
        })?;

        let mut exclude = global_exclude.to_vec();
        exclude.extend(config.exclude.iter().cloned());

        Ok(Self {
            category: config.name.clone(),
            pattern,
            include: GlobSet::new(&config.include)?,
            exclude: GlobSet::new(&exclude)?,
            max_file_size,
        })
    }

    fn item_name<'h>(&self, caps: &regex::Captures<'h>) -> Option<&'h str> {
        caps.name("name")
            .or_else(|| caps.get(1))
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
    }
}

impl Extractor for PatternRule {
    fn category(&self) -> &str {
        &self.category
    }

    fn extract(&self, source_root: &Path) -> Result<Vec<EntityCandidate>> {
        let files = FileScanner::new(source_root)
            .with_include(self.include.clone())
            .with_exclude(self.exclude.clone())
            .with_max_file_size(self.max_file_size)
            .scan()?;

        let mut candidates = Vec::new();
        for file in files {
            let content = match std::fs::read_to_string(&file.path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    tracing::debug!("Skipping non-UTF-8 file {}", file.relative);
                    continue;
                }
                Err(e) => {
                    return Err(LedgerError::Io(std::io::Error::new(
                        e.kind(),
                        format!("cannot read {}: {}", file.relative, e),
                    )));
                }
            };

            for (idx, line) in content.lines().enumerate() {
                for caps in self.pattern.captures_iter(line) {
                    if let Some(name) = self.item_name(&caps) {
                        candidates.push(EntityCandidate::new(
                            &self.category,
                            name,
                            Location::new(&file.relative, (idx + 1) as u32),
                        ));
                    }
                }
            }
        }

        Ok(candidates)
    }
}
