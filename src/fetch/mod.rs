//! Instrumented single-URL fetching.
//!
//! [`HttpFetcher`] turns one URL string into one [`FetchOutcome`]:
//! - validates the URL before any network activity
//! - sends a GET through the shared [`Transport`], recording phase timings
//! - follows redirects up to a limit
//! - reads the full body so the connection can be reused
//!
//! The exchange is raced against the per-fetch timeout and the pipeline scope.

mod redirects;
mod timing;


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::CONTENT_LENGTH;
use http::HeaderMap;
use url::Url;

use crate::config::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_REDIRECTS};
use crate::error_handling::{FailureCause, FailureKind};
use crate::models::{FetchOutcome, FetchSuccess, ResponseSnapshot};
use crate::scope::CancelScope;
use crate::transport::{Transport, TransportError, TransportRequest};

use redirects::redirect_target;
use timing::TimingRecorder;

/// Produces exactly one outcome per URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, scope: &CancelScope, url: &str) -> FetchOutcome;
}

/// Fetcher backed by a shared [`Transport`].
pub struct HttpFetcher<T> {
    transport: Arc<T>,
    timeout: Duration,
    max_redirects: usize,
}

impl<T: Transport> HttpFetcher<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Upper bound on one fetch, covering redirects and the body read.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    async fn exchange(
        &self,
        start: Url,
        recorder: &mut TimingRecorder,
    ) -> Result<Exchange, FailureCause> {
        let mut current = start;
        let mut redirects = 0usize;

        loop {
            let request = TransportRequest::get(current.clone());
            let mut response = self
                .transport
                .round_trip(&request, &mut *recorder)
                .await
                .map_err(transport_failure)?;

            if let Some(next) = redirect_target(&current, response.status, &response.headers) {
                if redirects >= self.max_redirects {
                    return Err(FailureCause::new(
                        FailureKind::TransportError,
                        format!("stopped after {} redirects", self.max_redirects),
                    ));
                }
                let next = next.map_err(|msg| FailureCause::new(FailureKind::TransportError, msg))?;
                response.drain().await.map_err(transport_failure)?;
                log::debug!("Following redirect {current} -> {next}");
                redirects += 1;
                current = next;
                continue;
            }

            let body_bytes = response.drain().await.map_err(transport_failure)?;
            recorder.response_complete();

            return Ok(Exchange {
                status_code: response.status.as_u16(),
                content_length: declared_content_length(&response.headers).unwrap_or(body_bytes),
                final_url: current.to_string(),
                response: ResponseSnapshot {
                    headers: response.headers,
                    tls: response.tls,
                },
            });
        }
    }
}

#[async_trait]
impl<T: Transport + 'static> Fetcher for HttpFetcher<T> {
    async fn fetch(&self, scope: &CancelScope, url: &str) -> FetchOutcome {
        let target = match parse_target(url) {
            Ok(target) => target,
            Err(message) => {
                return FetchOutcome::failure(url, FailureKind::InvalidRequest, message)
            }
        };
        if let Some(end) = scope.state() {
            return FetchOutcome {
                url: url.to_string(),
                result: Err(end.failure()),
                security: None,
            };
        }

        let mut recorder = TimingRecorder::start();
        let result = tokio::select! {
            biased;
            end = scope.done() => Err(end.failure()),
            exchange = tokio::time::timeout(self.timeout, self.exchange(target, &mut recorder)) => {
                exchange.unwrap_or_else(|_| {
                    Err(FailureCause::new(
                        FailureKind::Timeout,
                        format!("fetch exceeded {:?}", self.timeout),
                    ))
                })
            }
        };

        let result = result.map(|exchange| FetchSuccess {
            status_code: exchange.status_code,
            content_length: exchange.content_length,
            timing: recorder.metrics(),
            final_url: exchange.final_url,
            response: exchange.response,
        });
        if let Ok(success) = &result {
            log::debug!(
                "Fetched {url}: {} ({} bytes in {:?})",
                success.status_code,
                success.content_length,
                success.timing.total
            );
        }

        FetchOutcome {
            url: url.to_string(),
            result,
            security: None,
        }
    }
}

struct Exchange {
    status_code: u16,
    content_length: u64,
    final_url: String,
    response: ResponseSnapshot,
}

/// Accepts absolute http(s) URLs with a host.
fn parse_target(url: &str) -> Result<Url, String> {
    let parsed = Url::parse(url.trim()).map_err(|e| format!("invalid URL {url:?}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme {other:?} in {url:?}")),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(format!("missing host in {url:?}"));
    }
    Ok(parsed)
}

fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn transport_failure(err: TransportError) -> FailureCause {
    FailureCause::new(err.kind(), err.to_string())
}
