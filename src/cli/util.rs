//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::{Path, PathBuf};

use crate::config::ConfigLoader;
use crate::tracker::Tracker;
use crate::types::{IdentityKey, LedgerError, Location, Result};

/// Command execution context
///
/// Resolves the project root, loads the merged config and opens the ledger.
pub struct CommandContext {
    /// Project root directory
    pub project_root: PathBuf,
    pub tracker: Tracker,
}

impl CommandContext {
    /// Load the context for the current directory
    pub fn load() -> Result<Self> {
        let project_root = std::env::current_dir()?;
        Self::load_for(project_root)
    }

    pub fn load_for(project_root: PathBuf) -> Result<Self> {
        require_initialized(&project_root)?;
        let config = ConfigLoader::load_for(&project_root)?;
        let tracker = Tracker::open(config, &project_root)?;

        Ok(Self {
            project_root,
            tracker,
        })
    }
}

/// Fail with `NotInitialized` unless `init` has run in `project_root`
pub fn require_initialized(project_root: &Path) -> Result<PathBuf> {
    if !ConfigLoader::is_project_initialized(project_root) {
        return Err(LedgerError::NotInitialized);
    }
    Ok(ConfigLoader::project_dir(project_root))
}

/// Directory name of the project, used as its default display name
pub fn project_name(project_root: &Path) -> String {
    project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_string()
}

/// Build an identity from command-line parts; `location` is `path:line`
pub fn parse_identity(category: &str, item_name: &str, location: &str) -> Result<IdentityKey> {
    let location = Location::parse(location).ok_or_else(|| {
        LedgerError::Config(format!(
            "Invalid location '{}': expected <file>:<line>",
            location
        ))
    })?;
    Ok(IdentityKey::new(category, item_name, location))
}
