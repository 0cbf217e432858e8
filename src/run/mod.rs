//! Run orchestration: wires input, the three pipeline stages, statistics and export.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::app::{
    cancel_on_interrupt, collect_urls, print_failure_statistics, print_simple_summary,
    print_timing_statistics,
};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error_handling::{ExportError, ProcessingStats};
use crate::export::{export_report, ExportOptions};
use crate::fetch::Fetcher;
use crate::initialization::{init_fetcher, init_transport};
use crate::report::{assemble, PipelineReport};
use crate::scope::CancelScope;
use crate::security::annotate;
use crate::utils::TimingStats;

/// Results of a pipeline run.
#[derive(Debug)]
pub struct RunReport {
    /// URLs handed to the dispatcher
    pub total_urls: usize,
    pub successful: usize,
    pub failed: usize,
    /// URLs that produced no outcome because the run was cancelled or hit its deadline
    pub cancelled: usize,
    pub elapsed_seconds: f64,
    /// Number of exported records, or why the export failed
    pub export: Result<usize, ExportError>,
    pub outcomes: PipelineReport,
}

/// Runs the pipeline described by `config` against the network.
///
/// # Errors
///
/// Fails when the URL input cannot be read or the transport cannot be built.
/// Per-URL failures and export failures are reported inside [`RunReport`].
pub async fn run_pipeline(config: &Config) -> Result<RunReport> {
    let urls = collect_urls(config)
        .await
        .context("Failed to read URL input")?;
    let transport = init_transport(config).context("Failed to initialize HTTP transport")?;
    let fetcher = Arc::new(init_fetcher(config, transport));

    Ok(run_with_fetcher(config, fetcher, urls).await)
}

/// Runs the pipeline over `urls` with the given fetcher.
///
/// Ctrl-C cancels the run; outcomes collected so far are still exported.
pub async fn run_with_fetcher<F: Fetcher + 'static>(
    config: &Config,
    fetcher: Arc<F>,
    urls: Vec<String>,
) -> RunReport {
    let start_time = std::time::Instant::now();
    let total_urls = urls.len();

    let scope = match config.pipeline_timeout() {
        Some(timeout) => CancelScope::with_timeout(timeout),
        None => CancelScope::new(),
    };
    let interrupt = cancel_on_interrupt(&scope);

    let stats = Arc::new(ProcessingStats::new());
    let timing = Arc::new(TimingStats::new());

    let dispatcher = Dispatcher::new(fetcher, config.max_concurrency);
    info!(
        "Fetching {} URL(s) with up to {} in flight",
        total_urls,
        dispatcher.max_concurrency()
    );
    let fetched = dispatcher.dispatch(&scope, urls);
    let annotated = annotate(&scope, fetched);
    let outcomes = assemble(&scope, annotated, &stats, &timing).await;
    interrupt.abort();

    let cancelled = total_urls.saturating_sub(outcomes.total());
    if let Some(end) = scope.state() {
        if cancelled > 0 {
            warn!("Run ended early ({end:?}): {cancelled} URL(s) produced no outcome");
        }
    }

    let elapsed_seconds = start_time.elapsed().as_secs_f64();
    print_failure_statistics(&stats);
    if config.show_timing {
        print_timing_statistics(&timing);
    }
    print_simple_summary(
        total_urls,
        outcomes.successes.len(),
        outcomes.failures.len(),
        elapsed_seconds,
    );

    let export = export_report(
        &outcomes.successes,
        &ExportOptions::new(config.output.clone(), config.format),
    )
    .await;
    if let Err(e) = &export {
        log::error!("{e}");
    }

    RunReport {
        total_urls,
        successful: outcomes.successes.len(),
        failed: outcomes.failures.len(),
        cancelled,
        elapsed_seconds,
        export,
        outcomes,
    }
}
