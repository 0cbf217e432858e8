//! Utility types shared across the pipeline.
//!
//! This module provides timing metrics aggregation for run summaries.

mod timing;

pub use timing::TimingStats;
