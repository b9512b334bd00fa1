use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::constants::extraction::MAX_FILE_SIZE;
use crate::types::{LedgerError, Result};

/// Compiled set of glob patterns matched against root-relative paths
#[derive(Debug, Clone, Default)]
pub struct GlobSet {
    patterns: Vec<glob::Pattern>,
}

impl GlobSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| LedgerError::Config(format!("Invalid glob '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, relative_path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(relative_path))
    }
}

/// Deterministic walk over a source tree.
///
/// Honors .gitignore, never follows symlinks and yields root-relative paths
/// with `/` separators in sorted order.
pub struct FileScanner {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    max_file_size: u64,
}

impl FileScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            include: GlobSet::default(),
            exclude: GlobSet::default(),
            max_file_size: MAX_FILE_SIZE,
        }
    }

    pub fn with_include(mut self, include: GlobSet) -> Self {
        self.include = include;
        self
    }

    pub fn with_exclude(mut self, exclude: GlobSet) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Collect matching files as `(relative_path, absolute_path)` pairs
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        let metadata = std::fs::metadata(&self.root).map_err(|e| {
            LedgerError::Io(std::io::Error::new(
                e.kind(),
                format!("cannot read source root {}: {}", self.root.display(), e),
            ))
        })?;
        if !metadata.is_dir() {
            return Err(LedgerError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("source root {} is not a directory", self.root.display()),
            )));
        }

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        for entry in walker {
            // A directory we cannot descend into would make its entities look
            // deleted, so the whole scan fails instead of skipping it.
            let entry = entry.map_err(|e| {
                LedgerError::Io(std::io::Error::other(format!("walk failed: {}", e)))
            })?;

            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let Some(relative) = self.relative(path) else {
                continue;
            };

            if self.exclude.matches(&relative) {
                continue;
            }
            if !self.include.is_empty() && !self.include.matches(&relative) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > self.max_file_size {
                tracing::debug!("Skipping oversized file {} ({} bytes)", relative, size);
                continue;
            }

            files.push(ScannedFile {
                relative,
                path: path.to_path_buf(),
                size,
            });
        }

        Ok(files)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Root-relative path with `/` separators
    pub relative: String,
    pub path: PathBuf,
    pub size: u64,
}
