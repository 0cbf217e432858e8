//! Report assembly: the final consumer of the pipeline.

use std::sync::Arc;

use crate::dispatch::OutcomeStream;
use crate::error_handling::ProcessingStats;
use crate::models::FetchOutcome;
use crate::scope::CancelScope;
use crate::utils::TimingStats;

/// Everything the pipeline produced, split by result.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Successful outcomes in arrival order.
    pub successes: Vec<FetchOutcome>,
    pub failures: Vec<FetchOutcome>,
}

impl PipelineReport {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// Collects outcomes until the stream closes or the scope ends.
///
/// Failures are logged at warn level as `<kind> <url>: <message>` and counted
/// in `stats`; success timings are folded into `timing`.
pub async fn assemble(
    scope: &CancelScope,
    mut input: OutcomeStream,
    stats: &Arc<ProcessingStats>,
    timing: &Arc<TimingStats>,
) -> PipelineReport {
    let mut report = PipelineReport::default();

    loop {
        let outcome = tokio::select! {
            biased;
            end = scope.done() => {
                log::debug!("Report assembly stopped early: {end:?}");
                break;
            }
            next = input.recv() => match next {
                Some(outcome) => outcome,
                None => break,
            },
        };

        match &outcome.result {
            Ok(success) => {
                stats.increment_success();
                timing.record(&success.timing);
                log::debug!(
                    "{} -> {} ({} bytes)",
                    outcome.url,
                    success.status_code,
                    success.content_length
                );
                report.successes.push(outcome);
            }
            Err(cause) => {
                stats.increment_failure(cause.kind);
                log::warn!("{} {}: {}", cause.kind, outcome.url, cause.message);
                report.failures.push(outcome);
            }
        }
    }

    report
}
