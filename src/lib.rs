//! url_pipeline library: concurrent URL fetching with timing and security signals
//!
//! A run moves every URL through three stages connected by bounded channels:
//!
//! 1. [`dispatch::Dispatcher`] fetches URLs with a concurrency ceiling, each
//!    fetch instrumented with DNS/TCP/TLS/first-byte/total timings
//! 2. [`security::annotate`] attaches a [`models::SecurityVerdict`]
//! 3. [`report::assemble`] collects outcomes, logging and counting failures
//!
//! All stages observe one [`scope::CancelScope`]; cancelling it (or passing its
//! deadline) stops admission and closes every stream.
//!
//! # Example
//!
//! ```no_run
//! use url_pipeline::{run_pipeline, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config {
//!     urls: vec!["https://example.com".to_string()],
//!     max_concurrency: 10,
//!     ..Default::default()
//! };
//!
//! let report = run_pipeline(&config).await?;
//! println!(
//!     "Fetched {} URLs: {} succeeded, {} failed",
//!     report.total_urls, report.successful, report.failed
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime.

mod app;
pub mod config;
pub mod dispatch;
pub mod error_handling;
pub mod export;
pub mod fetch;
pub mod initialization;
pub mod models;
pub mod report;
mod run;
pub mod scope;
pub mod security;
mod tls;
pub mod transport;
pub mod utils;

// Re-export public API
pub use config::{Config, ExportFormat, LogFormat, LogLevel};
pub use dispatch::{Dispatcher, OutcomeStream};
pub use error_handling::{ExportError, FailureCause, FailureKind, InitializationError};
pub use fetch::{Fetcher, HttpFetcher};
pub use models::{FetchOutcome, FetchSuccess, PerformanceMetrics, SecurityVerdict};
pub use report::PipelineReport;
pub use run::{run_pipeline, run_with_fetcher, RunReport};
pub use scope::{CancelScope, ScopeEnd};
pub use transport::PooledTransport;
