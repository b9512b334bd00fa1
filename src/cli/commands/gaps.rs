//! Gaps Command
//!
//! Without flags, lists entities still in error or manual review. `--all`
//! dumps the full append-only gap log, `--run` the records of one run.

use crate::cli::util::CommandContext;
use crate::types::{GapLogEntry, Result, RunId};

pub fn run(all: bool, category: Option<&str>, run: Option<u64>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let gap_log = ctx.tracker.gap_log();
    let json_output = format == "json";

    if !all && run.is_none() {
        let mut gaps = gap_log.unresolved()?;
        if let Some(category) = category {
            gaps.retain(|g| g.latest.category == category);
        }

        if json_output {
            println!("{}", serde_json::to_string_pretty(&gaps)?);
        } else if gaps.is_empty() {
            println!("No unresolved gaps.");
        } else {
            for gap in &gaps {
                println!(
                    "[{}] {}/{} @ {}  x{} since run #{}",
                    gap.status,
                    gap.latest.category,
                    gap.latest.item_name,
                    gap.latest.location,
                    gap.occurrences,
                    gap.first_run
                );
                println!("    {}", gap.latest.reason);
            }
        }
        return Ok(());
    }

    let mut entries = match run {
        Some(seq) => gap_log.for_run(RunId::new(seq))?,
        None => gap_log.list(category)?,
    };
    if let Some(category) = category {
        entries.retain(|e| e.category == category);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("Gap log is empty.");
    } else {
        for entry in &entries {
            print_entry(entry);
        }
    }
    Ok(())
}

fn print_entry(entry: &GapLogEntry) {
    println!(
        "run #{:<4} {}/{} @ {}: {}",
        entry.discovered_at_run, entry.category, entry.item_name, entry.location, entry.reason
    );
}
