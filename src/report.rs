//! Progress report
//!
//! Category table, run history and the unresolved gap log, as text or JSON.
//! Error and manual-review counts always sit next to coverage so that
//! "everything processed" never reads as "everything documented".

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::progress::ProgressReport;
use crate::storage::UnresolvedGap;
use crate::tracker::{RunReport, Tracker};
use crate::types::{CampaignStatus, Result, VerificationRun, format_coverage};

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub progress: ProgressReport,
    pub history: Vec<VerificationRun>,
    pub unresolved_gaps: Vec<UnresolvedGap>,
    pub campaign: CampaignStatus,
    pub target_coverage: f64,
}

pub struct Reporter;

impl Reporter {
    pub fn build(tracker: &Tracker) -> Result<StatusReport> {
        Ok(StatusReport {
            generated_at: Utc::now(),
            progress: tracker.progress()?,
            history: tracker.history().list()?,
            unresolved_gaps: tracker.gap_log().unresolved()?,
            campaign: tracker.campaign_status()?,
            target_coverage: tracker.config().campaign.target_coverage,
        })
    }

    pub fn to_json(report: &StatusReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    pub fn generate_json<P: AsRef<Path>>(report: &StatusReport, output_path: P) -> Result<()> {
        fs::write(output_path, Self::to_json(report)?)?;
        Ok(())
    }

    pub fn print_summary(report: &StatusReport) {
        println!("{}", style("Documentation Coverage").bold().underlined());
        println!();
        print!("{}", Self::render_text(report));

        let campaign = match report.campaign {
            CampaignStatus::Converged => style(report.campaign.to_string()).green(),
            CampaignStatus::Plateaued => style(report.campaign.to_string()).yellow(),
            _ => style(report.campaign.to_string()).cyan(),
        };
        println!(
            "\nCampaign: {} (target {})",
            campaign.bold(),
            format_coverage(Some(report.target_coverage))
        );
    }

    /// Plain-text body of the report
    pub fn render_text(report: &StatusReport) -> String {
        let mut out = String::new();
        Self::render_categories(&mut out, &report.progress);
        out.push('\n');
        Self::render_history(&mut out, &report.history);
        out.push('\n');
        Self::render_gaps(&mut out, &report.unresolved_gaps);
        out
    }

    fn render_categories(out: &mut String, progress: &ProgressReport) {
        let width = progress
            .categories
            .keys()
            .map(|k| k.len())
            .chain(std::iter::once("Category".len()))
            .max()
            .unwrap_or(8);

        let _ = writeln!(
            out,
            "{:<width$}  {:>10}  {:>10}  {:>7}  {:>5}  {:>6}  {:>8}",
            "Category", "Discovered", "Documented", "Pending", "Error", "Review", "Coverage",
        );
        for record in progress.categories.values() {
            let _ = writeln!(
                out,
                "{:<width$}  {:>10}  {:>10}  {:>7}  {:>5}  {:>6}  {:>8}",
                record.category,
                record.discovered,
                record.documented,
                record.pending,
                record.error,
                record.manual_review,
                format_coverage(record.coverage),
            );
        }

        let overall = &progress.overall;
        let _ = writeln!(
            out,
            "{:<width$}  {:>10}  {:>10}  {:>7}  {:>5}  {:>6}  {:>8}",
            "TOTAL",
            overall.discovered,
            overall.documented,
            overall.pending,
            overall.error,
            overall.manual_review,
            format_coverage(overall.coverage),
        );
        let _ = writeln!(
            out,
            "Processed {}/{} ({} documented, {} unresolved gaps)",
            overall.processed(),
            overall.discovered,
            overall.documented,
            overall.gaps()
        );
    }

    fn render_history(out: &mut String, history: &[VerificationRun]) {
        if history.is_empty() {
            let _ = writeln!(out, "No verification runs yet.");
            return;
        }

        let _ = writeln!(
            out,
            "{:>4}  {:<20}  {:>8}  {:>4}  {:>6}",
            "Run", "Timestamp", "Coverage", "Gaps", "Failed"
        );
        for run in history {
            let _ = writeln!(
                out,
                "{:>4}  {:<20}  {:>8}  {:>4}  {:>6}",
                run.sequence_number,
                run.timestamp.format("%Y-%m-%d %H:%M:%S"),
                format_coverage(run.overall_coverage),
                run.gaps_found,
                run.categories_failed,
            );
        }
    }

    fn render_gaps(out: &mut String, gaps: &[UnresolvedGap]) {
        if gaps.is_empty() {
            let _ = writeln!(out, "No unresolved gaps.");
            return;
        }

        let _ = writeln!(out, "Unresolved gaps ({}):", gaps.len());
        for gap in gaps {
            let entry = &gap.latest;
            let _ = writeln!(
                out,
                "  [{}] {}/{} @ {} (logged {}x since run #{}): {}",
                gap.status,
                entry.category,
                entry.item_name,
                entry.location,
                gap.occurrences,
                gap.first_run,
                entry.reason
            );
        }
    }

    pub fn print_run(report: &RunReport) {
        for category in &report.categories {
            match (&category.outcome, &category.error) {
                (Some(o), _) if !o.changed() => println!(
                    "  {} {:<16} {} entries, no changes",
                    style("✓").green(),
                    category.category,
                    o.unchanged + o.retained
                ),
                (Some(o), _) => println!(
                    "  {} {:<16} +{} new, {} unchanged, {} drifted, {} dropped, {} flagged, {} retained{}",
                    style("✓").green(),
                    category.category,
                    o.new,
                    o.unchanged,
                    o.drifted,
                    o.dropped,
                    o.pending_flagged,
                    o.retained,
                    if o.escalated { " (bulk disappearance, escalated to review)" } else { "" }
                ),
                (None, Some(e)) => println!("  {} {:<16} {}", style("✗").red(), category.category, e),
                (None, None) => {}
            }
        }
        println!(
            "\nRun #{}: coverage {} → {}, {} gaps, campaign {}",
            report.run.sequence_number,
            format_coverage(report.run.coverage_before),
            format_coverage(report.run.overall_coverage),
            report.run.gaps_found,
            report.campaign
        );
    }
}
