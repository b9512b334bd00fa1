//! Shared utility functions for coverage arithmetic and formatting.

// =============================================================================
// Coverage Helpers
// =============================================================================

/// Ratio of `part` over `whole`, `None` when the denominator is zero.
#[inline]
pub fn ratio(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 / whole as f64)
    }
}

/// Render an optional coverage ratio as a percentage (`N/A` when absent).
pub fn format_coverage(coverage: Option<f64>) -> String {
    match coverage {
        Some(c) => format!("{:.1}%", c * 100.0),
        None => "N/A".to_string(),
    }
}
