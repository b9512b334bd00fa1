//! Init Command
//!
//! Initialize a docledger project in the current directory.

use crate::cli::util::project_name;
use crate::config::ConfigLoader;
use crate::constants::layout;
use crate::storage::Database;
use crate::types::{LedgerError, Result};

pub fn run(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;

    if ConfigLoader::is_project_initialized(&root) && !force {
        return Err(LedgerError::Config(
            "Already initialized. Use --force to reopen the existing ledger.".to_string(),
        ));
    }

    let name = project_name(&root);
    ConfigLoader::init_project(&root, Some(&name))?;

    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    let config = ConfigLoader::load_for(&root)?;
    let db = Database::open(root.join(&config.storage.database))?;
    db.initialize()?;

    println!("✓ Initialized docledger in {}/", layout::PROJECT_DIR);
    println!("  Project: {}", name);
    println!("  Ledger:  {}", config.storage.database.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Adjust [[categories]] in {}/{}",
        layout::PROJECT_DIR,
        layout::CONFIG_FILE
    );
    println!("  2. Run 'docledger scan' to build the manifests");
    println!("  3. Set [driver] command and run 'docledger document'");

    Ok(())
}
