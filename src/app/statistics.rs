//! Statistics printing.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{FailureKind, ProcessingStats};
use crate::utils::TimingStats;

/// Prints a one-line summary of the run.
pub fn print_simple_summary(total_urls: usize, successful: usize, failed: usize, elapsed: f64) {
    info!(
        "✅ Processed {} URL{} ({} succeeded, {} failed) in {:.1}s",
        total_urls,
        if total_urls == 1 { "" } else { "s" },
        successful,
        failed,
        elapsed
    );
}

/// Prints the failure count of every kind that occurred.
pub fn print_failure_statistics(stats: &ProcessingStats) {
    let total = stats.total_failures();
    if total == 0 {
        return;
    }

    info!("Failure Counts ({} total):", total);
    for kind in FailureKind::iter() {
        let count = stats.get_failure_count(kind);
        if count > 0 {
            info!("   {}: {}", kind.as_str(), count);
        }
    }
}

pub fn print_timing_statistics(timing: &TimingStats) {
    timing.log_summary();
}
