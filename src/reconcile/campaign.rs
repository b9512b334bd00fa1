//! Campaign convergence from run history

use crate::constants::campaign::CONVERGENCE_RUNS;
use crate::types::{CampaignStatus, VerificationRun};

/// Judge a documentation campaign from its runs (oldest first).
///
/// - `Converged`: overall coverage met `target` on each of the last runs
/// - `Plateaued`: the last two runs found the same number of gaps,
///   whatever their coverage
/// - `InProgress`: anything else once a run exists
pub fn campaign_status(history: &[VerificationRun], target: f64) -> CampaignStatus {
    if history.is_empty() {
        return CampaignStatus::NotStarted;
    }

    if history.len() >= CONVERGENCE_RUNS {
        let recent = &history[history.len() - CONVERGENCE_RUNS..];
        if recent
            .iter()
            .all(|run| run.overall_coverage.is_some_and(|c| c >= target))
        {
            return CampaignStatus::Converged;
        }
    }

    if let [.., previous, last] = history
        && previous.gaps_found == last.gaps_found
    {
        return CampaignStatus::Plateaued;
    }

    CampaignStatus::InProgress
}
