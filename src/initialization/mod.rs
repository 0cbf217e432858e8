//! Application initialization and resource setup.
//!
//! This module provides functions to initialize the shared resources of a run:
//! - Logger
//! - DNS resolver
//! - Pooled HTTP transport and the fetcher built on it
//! - Admission semaphore

mod logger;
mod resolver;

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error_handling::InitializationError;
use crate::fetch::HttpFetcher;
use crate::transport::PooledTransport;

// Re-export public API
pub use logger::init_logger_with;
pub use resolver::init_resolver;

/// Initializes a semaphore for controlling concurrency.
///
/// Each admitted fetch holds one permit until it finishes.
pub fn init_semaphore(count: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(count))
}

/// Builds the transport shared by every fetch of a run.
///
/// # Errors
///
/// Fails when the TLS configuration cannot be built or the User-Agent is not a
/// valid header value.
pub fn init_transport(config: &Config) -> Result<Arc<PooledTransport>, InitializationError> {
    Ok(Arc::new(PooledTransport::new(&config.transport_config())?))
}

/// Builds the fetcher with the configured per-fetch timeout and redirect limit.
pub fn init_fetcher(
    config: &Config,
    transport: Arc<PooledTransport>,
) -> HttpFetcher<PooledTransport> {
    HttpFetcher::new(transport)
        .with_timeout(config.fetch_timeout())
        .with_max_redirects(config.max_redirects)
}
