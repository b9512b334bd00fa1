//! History Command

use crate::cli::util::CommandContext;
use crate::types::{Result, format_coverage};

pub fn run(limit: Option<usize>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let history = ctx.tracker.history();
    let runs = match limit {
        Some(n) => history.recent(n)?,
        None => history.list()?,
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No verification runs yet. Run 'docledger scan'.");
        return Ok(());
    }

    for run in &runs {
        println!(
            "#{:<4} {}  {} -> {}  gaps {}{}",
            run.sequence_number,
            run.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format_coverage(run.coverage_before),
            format_coverage(run.overall_coverage),
            run.gaps_found,
            if run.categories_failed > 0 {
                format!("  ({} categories failed)", run.categories_failed)
            } else {
                String::new()
            }
        );
    }
    println!();
    println!("Campaign: {}", ctx.tracker.campaign_status()?);
    Ok(())
}
