//! Document Command
//!
//! Feed pending entries to the configured driver command and write each
//! outcome back. Ctrl-C stops dispatching; in-flight entries stay pending.

use tracing::warn;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::driver::cancellation;
use crate::types::{Result, format_coverage};

pub async fn run(category: Option<&str>, limit: Option<usize>) -> Result<()> {
    let ctx = CommandContext::load()?;
    let out = Output::new();

    let (handle, cancel) = cancellation();
    let runner = ctx.tracker.command_runner()?.with_cancellation(cancel);

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing without dispatching further entries");
            handle.cancel();
        }
    });

    let result = runner.run(category, limit).await;
    interrupt.abort();
    let summary = result?;

    out.header("Driver summary");
    println!("  Attempted:     {}", summary.attempted);
    println!("  Documented:    {}", summary.documented);
    println!("  Errors:        {}", summary.errors);
    println!("  Manual review: {}", summary.manual_review);
    if summary.timed_out > 0 {
        out.warning(&format!("{} timed out and stay pending", summary.timed_out));
    }
    if summary.cancelled > 0 {
        out.warning(&format!("{} cancelled and stay pending", summary.cancelled));
    }
    if summary.rejected > 0 {
        out.warning(&format!(
            "{} outcomes rejected: entry changed while the driver ran",
            summary.rejected
        ));
    }

    let progress = ctx.tracker.progress()?;
    println!();
    println!(
        "Coverage now {} ({} unresolved gaps)",
        format_coverage(progress.overall.coverage),
        progress.overall.gaps()
    );

    Ok(())
}
