//! Error type definitions.
//!
//! This module defines the per-URL failure taxonomy and the error types of the
//! collaborators around the pipeline (initialization and export).

use std::fmt;

use log::SetLoggerError;
use serde::Serialize;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error building the TLS client configuration.
    #[error("TLS configuration error: {0}")]
    TlsConfigError(#[from] rustls::Error),

    /// The configured User-Agent is not a valid header value.
    #[error("Invalid User-Agent: {0}")]
    UserAgentError(#[from] http::header::InvalidHeaderValue),
}

/// Error types for report export.
///
/// These are reported to the caller separately from per-URL failures and never
/// invalidate the in-memory report.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The output file could not be created or written.
    #[error("Failed to write report to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Classified reason a fetch did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// URL could not be turned into a request
    InvalidRequest,
    /// DNS resolution, TCP connect, or TLS handshake failed
    ConnectionFailed,
    /// Per-fetch or pipeline deadline elapsed before completion
    Timeout,
    /// The pipeline scope was cancelled before completion
    Cancelled,
    /// Any other I/O failure while sending the request or reading the body
    TransportError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::ConnectionFailed => "connection_failed",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why one URL produced no response: a kind plus the underlying message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureCause {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
