//! Bounded fan-out of fetches.
//!
//! The dispatcher admits URLs through a counting semaphore, runs each admitted
//! fetch on its own task and funnels every outcome into one channel. A
//! supervisor task owns the join handles and the last sender, so the returned
//! stream closes only after every fetch task has finished.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

use crate::config::STAGE_CHANNEL_CAPACITY;
use crate::error_handling::FailureKind;
use crate::fetch::Fetcher;
use crate::initialization::init_semaphore;
use crate::models::FetchOutcome;
use crate::scope::CancelScope;

/// Receiving end of a pipeline stage.
pub type OutcomeStream = mpsc::Receiver<FetchOutcome>;

pub struct Dispatcher<F> {
    fetcher: Arc<F>,
    max_concurrency: usize,
}

impl<F: Fetcher + 'static> Dispatcher<F> {
    /// `max_concurrency` is clamped to at least one.
    pub fn new(fetcher: Arc<F>, max_concurrency: usize) -> Self {
        Self {
            fetcher,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Starts fetching `urls` and returns the stream of their outcomes.
    ///
    /// Without cancellation the stream yields exactly one outcome per URL, in
    /// completion order. Once the scope ends no further URL is admitted and
    /// outcomes not yet published are dropped.
    pub fn dispatch(&self, scope: &CancelScope, urls: Vec<String>) -> OutcomeStream {
        let (tx, rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);
        let semaphore = init_semaphore(self.max_concurrency);
        tokio::spawn(supervise(
            Arc::clone(&self.fetcher),
            semaphore,
            scope.clone(),
            urls,
            tx,
        ));
        rx
    }
}

async fn supervise<F: Fetcher + 'static>(
    fetcher: Arc<F>,
    semaphore: Arc<Semaphore>,
    scope: CancelScope,
    urls: Vec<String>,
    tx: mpsc::Sender<FetchOutcome>,
) {
    let total = urls.len();
    let mut tasks = FuturesUnordered::new();

    for url in urls {
        let permit = tokio::select! {
            biased;
            _ = scope.done() => {
                log::debug!(
                    "Scope ended; {} of {total} URL(s) were not admitted",
                    total - tasks.len()
                );
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    log::warn!("Admission semaphore closed, skipping URL: {url}");
                    break;
                }
            },
        };

        let handle = tokio::spawn(fetch_and_publish(
            Arc::clone(&fetcher),
            scope.clone(),
            url.clone(),
            permit,
            tx.clone(),
        ));
        tasks.push(async move { (url, handle.await) });
    }

    while let Some((url, joined)) = tasks.next().await {
        match joined {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                log::error!("Fetch task for {url} panicked");
                let outcome = FetchOutcome::failure(
                    url,
                    FailureKind::TransportError,
                    "fetch task panicked",
                );
                publish(&scope, &tx, outcome).await;
            }
            Err(e) => log::debug!("Fetch task for {url} did not complete: {e}"),
        }
    }
}

async fn fetch_and_publish<F: Fetcher>(
    fetcher: Arc<F>,
    scope: CancelScope,
    url: String,
    permit: OwnedSemaphorePermit,
    tx: mpsc::Sender<FetchOutcome>,
) {
    let outcome = {
        let _permit = permit;
        fetcher.fetch(&scope, &url).await
    };
    publish(&scope, &tx, outcome).await;
}

/// Sends unless the scope ends first. Returns whether the outcome was delivered.
pub(crate) async fn publish(
    scope: &CancelScope,
    tx: &mpsc::Sender<FetchOutcome>,
    outcome: FetchOutcome,
) -> bool {
    let url = outcome.url.clone();
    tokio::select! {
        biased;
        _ = scope.done() => {
            log::debug!("Dropping outcome for {url}: scope ended");
            false
        }
        sent = tx.send(outcome) => sent.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::models::{FetchSuccess, ResponseSnapshot};

    struct InFlight(Arc<AtomicUsize>);

    impl InFlight {
        fn enter(counter: &Arc<AtomicUsize>, max: &AtomicUsize) -> Self {
            let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
            max.fetch_max(now, Ordering::SeqCst);
            Self(Arc::clone(counter))
        }
    }

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Succeeds after `delay`, fails for URLs containing "fail", panics for "panic",
    /// and blocks until the scope ends for "block".
    #[derive(Default)]
    struct MockFetcher {
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, scope: &CancelScope, url: &str) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

            if url.contains("panic") {
                panic!("mock fetcher panics for {url}");
            }
            if url.contains("block") {
                let end = scope.done().await;
                return FetchOutcome {
                    url: url.to_string(),
                    result: Err(end.failure()),
                    security: None,
                };
            }
            tokio::time::sleep(self.delay).await;
            if url.contains("fail") {
                return FetchOutcome::failure(url, FailureKind::ConnectionFailed, "refused");
            }
            FetchOutcome::success(
                url,
                FetchSuccess {
                    status_code: 200,
                    content_length: 0,
                    timing: Default::default(),
                    final_url: url.to_string(),
                    response: ResponseSnapshot::default(),
                },
            )
        }
    }

    fn urls(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://{prefix}{i}.test/")).collect()
    }

    async fn collect(mut stream: OutcomeStream) -> Vec<FetchOutcome> {
        let mut out = Vec::new();
        while let Some(outcome) = stream.recv().await {
            out.push(outcome);
        }
        out
    }

    #[tokio::test]
    async fn test_one_outcome_per_url() {
        let fetcher = Arc::new(MockFetcher::default());
        let dispatcher = Dispatcher::new(Arc::clone(&fetcher), 5);
        let mut input = urls("ok", 12);
        input.extend(urls("fail", 3));

        let outcomes = collect(dispatcher.dispatch(&CancelScope::new(), input.clone())).await;

        assert_eq!(outcomes.len(), input.len());
        let mut seen: Vec<String> = outcomes.iter().map(|o| o.url.clone()).collect();
        seen.sort();
        input.sort();
        assert_eq!(seen, input);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 12);
    }

    #[tokio::test]
    async fn test_empty_input_closes_immediately() {
        let dispatcher = Dispatcher::new(Arc::new(MockFetcher::default()), 5);
        let outcomes = collect(dispatcher.dispatch(&CancelScope::new(), Vec::new())).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_more_than_ceiling_in_flight() {
        let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_millis(50)));
        let dispatcher = Dispatcher::new(Arc::clone(&fetcher), 3);

        let outcomes = collect(dispatcher.dispatch(&CancelScope::new(), urls("ok", 20))).await;

        assert_eq!(outcomes.len(), 20);
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_of_one_serializes_fetches() {
        let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_millis(10)));
        let dispatcher = Dispatcher::new(Arc::clone(&fetcher), 0);
        assert_eq!(dispatcher.max_concurrency(), 1);

        let outcomes = collect(dispatcher.dispatch(&CancelScope::new(), urls("ok", 5))).await;
        assert_eq!(outcomes.len(), 5);
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_admission_and_closes_stream() {
        let fetcher = Arc::new(MockFetcher::default());
        let dispatcher = Dispatcher::new(Arc::clone(&fetcher), 2);
        let scope = CancelScope::new();

        let stream = dispatcher.dispatch(&scope, urls("block", 10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 2);

        scope.cancel();
        let outcomes = tokio::time::timeout(Duration::from_secs(1), collect(stream))
            .await
            .expect("stream closes after cancel");

        assert!(outcomes.is_empty());
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_fetch_becomes_transport_error() {
        let fetcher = Arc::new(MockFetcher::default());
        let dispatcher = Dispatcher::new(Arc::clone(&fetcher), 2);
        let mut input = urls("ok", 4);
        input.push("https://panic.test/".to_string());

        let outcomes = collect(dispatcher.dispatch(&CancelScope::new(), input)).await;

        assert_eq!(outcomes.len(), 5);
        let panicked = outcomes
            .iter()
            .find(|o| o.url == "https://panic.test/")
            .expect("outcome for the panicking URL");
        assert_eq!(
            panicked.failure_cause().map(|c| c.kind),
            Some(FailureKind::TransportError)
        );
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
    }
}
