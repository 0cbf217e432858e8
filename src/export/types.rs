//! Export types and options.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::models::{FetchOutcome, PerformanceMetrics, SecurityVerdict};

pub use crate::config::ExportFormat;

/// Options for exporting a report.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Output file path; `-` writes to stdout.
    pub output: PathBuf,
    pub format: ExportFormat,
}

impl ExportOptions {
    pub fn new(output: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            output: output.into(),
            format,
        }
    }

    pub fn is_stdout(&self) -> bool {
        self.output == Path::new("-")
    }
}

/// One exported row, borrowed from a successful outcome.
#[derive(Debug, Serialize)]
pub struct ExportRecord<'a> {
    pub url: &'a str,
    pub final_url: &'a str,
    pub status_code: u16,
    pub content_length: u64,
    pub metrics: &'a PerformanceMetrics,
    pub security: Option<&'a SecurityVerdict>,
}

impl<'a> ExportRecord<'a> {
    /// `None` for failed outcomes, which are never exported.
    pub fn from_outcome(outcome: &'a FetchOutcome) -> Option<Self> {
        let success = outcome.result.as_ref().ok()?;
        Some(Self {
            url: &outcome.url,
            final_url: &success.final_url,
            status_code: success.status_code,
            content_length: success.content_length,
            metrics: &success.timing,
            security: outcome.security.as_ref(),
        })
    }
}
