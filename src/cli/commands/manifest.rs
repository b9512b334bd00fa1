//! Manifest Commands
//!
//! Move a category manifest in and out of the ledger as a checklist file.
//!
//! Usage:
//!   docledger manifest export <category> [-o FILE]
//!   docledger manifest import <FILE>
//!   docledger manifest digest <category>

use std::fs;
use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::storage::manifest_format;
use crate::types::Result;

pub fn export(category: &str, output: Option<&Path>) -> Result<()> {
    let ctx = CommandContext::load()?;
    let text = ctx.tracker.store().export(category)?;

    match output {
        Some(path) => {
            fs::write(path, &text)?;
            Output::new().success(&format!("Exported '{}' to {}", category, path.display()));
        }
        None => print!("{}", text),
    }
    Ok(())
}

pub fn import(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)?;
    let manifest = manifest_format::parse(&text)?;

    let ctx = CommandContext::load()?;
    let summary = ctx.tracker.store().import(&manifest)?;

    Output::new().success(&format!(
        "Imported '{}': {} inserted, {} updated, {} unchanged",
        manifest.category, summary.inserted, summary.updated, summary.unchanged
    ));
    Ok(())
}

/// Content hash of a manifest; equal digests mean identical manifests
pub fn digest(category: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    println!("{}", ctx.tracker.store().digest(category)?);
    Ok(())
}
