//! Status Command
//!
//! Coverage per category, run history, unresolved gaps and campaign state.

use std::path::Path;

use crate::cli::util::CommandContext;
use crate::config::ConfigLoader;
use crate::report::Reporter;
use crate::types::Result;

pub fn run(format: &str, output: Option<&Path>) -> Result<()> {
    let json_output = format == "json";
    let root = std::env::current_dir()?;

    if !ConfigLoader::is_project_initialized(&root) {
        if json_output {
            println!("{{\"status\": \"not_initialized\"}}");
        } else {
            println!("docledger Status");
            println!("══════════════════════════════════════");
            println!("Not initialized. Run 'docledger init' first.");
        }
        // Informational: not being initialized is not a failure here
        return Ok(());
    }

    let ctx = CommandContext::load_for(root)?;
    let report = Reporter::build(&ctx.tracker)?;

    if let Some(path) = output {
        Reporter::generate_json(&report, path)?;
        println!("✓ Report written to {}", path.display());
        return Ok(());
    }

    if json_output {
        println!("{}", Reporter::to_json(&report)?);
    } else {
        if let Some(name) = &ctx.tracker.config().project.name {
            println!("Project: {}", name);
            println!();
        }
        Reporter::print_summary(&report);
    }

    Ok(())
}
