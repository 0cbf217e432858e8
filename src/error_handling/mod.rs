//! Error handling and processing statistics.
//!
//! This module provides:
//! - The per-URL failure taxonomy ([`FailureKind`], [`FailureCause`])
//! - Error types for initialization and export
//! - Processing statistics tracking (failure counts per kind)

mod stats;
mod types;

// Re-export public API
pub use stats::ProcessingStats;
pub use types::{ExportError, FailureCause, FailureKind, InitializationError};
