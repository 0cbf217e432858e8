//! Main application modules.
//!
//! This module provides URL input collection, interrupt handling, and
//! statistics printing used by the run orchestration.

pub mod shutdown;
pub mod statistics;
pub mod url;

// Re-export public API
pub use shutdown::cancel_on_interrupt;
pub use statistics::{print_failure_statistics, print_simple_summary, print_timing_statistics};
pub use url::collect_urls;
