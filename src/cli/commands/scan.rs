//! Scan Command
//!
//! Extract every category and reconcile it into the ledger, recording one
//! verification run. `--dry-run` prints the plan and writes nothing.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::report::Reporter;
use crate::types::Result;

pub async fn run(dry_run: bool, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let out = Output::new();

    if ctx.tracker.config().categories.is_empty() {
        out.warning("No categories configured; add [[categories]] to the project config");
    }

    if dry_run {
        let previews = ctx.tracker.preview().await?;
        if format == "json" {
            println!("{}", serde_json::to_string_pretty(&previews)?);
            return Ok(());
        }

        out.header("Dry run (nothing written)");
        for preview in &previews {
            match (&preview.outcome, &preview.error) {
                (Some(o), _) => println!(
                    "  {:<16} {} new, {} unchanged, {} would drift, {} would drop, {} would flag{}",
                    preview.category,
                    o.new,
                    o.unchanged,
                    o.drifted,
                    o.dropped,
                    o.pending_flagged,
                    if o.escalated { " (bulk disappearance)" } else { "" }
                ),
                (None, Some(e)) => out.error(&format!("{}: {}", preview.category, e)),
                (None, None) => {}
            }
        }
        return Ok(());
    }

    let report = ctx.tracker.verify().await?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        out.header(&format!("Verification run #{}", report.run.sequence_number));
        Reporter::print_run(&report);
    }

    Ok(())
}
