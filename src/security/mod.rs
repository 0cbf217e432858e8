//! Security annotation stage.
//!
//! Attaches a [`SecurityVerdict`] to every outcome passing through:
//! - `headers_secure`: the response carries a Content-Security-Policy
//! - `tls_cert_valid`: the response came over TLS with an unexpired leaf certificate
//!
//! Outcomes without a response are annotated as unreachable (both flags false).

mod analysis;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::config::STAGE_CHANNEL_CAPACITY;
use crate::dispatch::{publish, OutcomeStream};
use crate::models::{FetchOutcome, SecurityVerdict};
use crate::scope::CancelScope;

pub use analysis::{assess, headers_secure, tls_cert_valid};

/// Starts the annotator and returns its output stream.
///
/// The output closes when the input closes or the scope ends.
pub fn annotate(scope: &CancelScope, input: OutcomeStream) -> OutcomeStream {
    let (tx, rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);
    tokio::spawn(run_annotator(scope.clone(), input, tx));
    rx
}

/// Annotates one outcome as of `now`.
pub fn annotate_outcome(outcome: FetchOutcome, now: DateTime<Utc>) -> FetchOutcome {
    let verdict = match &outcome.result {
        Ok(success) => assess(&success.response, now),
        Err(_) => SecurityVerdict::unreachable(),
    };
    outcome.with_security(verdict)
}

async fn run_annotator(
    scope: CancelScope,
    mut input: OutcomeStream,
    tx: mpsc::Sender<FetchOutcome>,
) {
    let mut annotated = 0usize;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = scope.done() => break,
            next = input.recv() => match next {
                Some(outcome) => outcome,
                None => break,
            },
        };

        let outcome = annotate_outcome(outcome, Utc::now());
        if let Some(verdict) = &outcome.security {
            log::debug!(
                "Security for {}: headers_secure={} tls_cert_valid={}",
                outcome.url,
                verdict.headers_secure,
                verdict.tls_cert_valid
            );
        }
        if !publish(&scope, &tx, outcome).await {
            break;
        }
        annotated += 1;
    }
    log::debug!("Security annotator finished after {annotated} outcome(s)");
}
