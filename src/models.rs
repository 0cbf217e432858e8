//! Data types that flow between pipeline stages.
//!
//! A [`FetchOutcome`] is created once per URL by the fetcher, moved by value
//! through the security annotator, and consumed by report assembly. Stages never
//! share an outcome; each one hands the next a new value.

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::{Serialize, Serializer};

use crate::error_handling::{FailureCause, FailureKind};

/// Timing breakdown for one fetch.
///
/// Phases that did not happen (plaintext HTTP has no TLS, a pooled connection
/// skips DNS and connect) are zero. `total >= time_to_first_byte` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceMetrics {
    #[serde(rename = "dns_lookup_ms", serialize_with = "as_millis")]
    pub dns_lookup: Duration,
    #[serde(rename = "tcp_connect_ms", serialize_with = "as_millis")]
    pub tcp_connect: Duration,
    #[serde(rename = "tls_handshake_ms", serialize_with = "as_millis")]
    pub tls_handshake: Duration,
    #[serde(rename = "time_to_first_byte_ms", serialize_with = "as_millis")]
    pub time_to_first_byte: Duration,
    #[serde(rename = "total_ms", serialize_with = "as_millis")]
    pub total: Duration,
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_nanos() as f64 / 1_000_000.0)
}

/// One certificate presented by the server, parsed at handshake time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    pub subject: String,
    /// `None` when the certificate could not be parsed.
    pub not_after: Option<DateTime<Utc>>,
}

/// TLS state of the connection that served a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSnapshot {
    pub protocol_version: Option<String>,
    /// Leaf first, as presented by the peer.
    pub peer_certificates: Vec<PeerCertificate>,
}

impl TlsSnapshot {
    pub fn leaf(&self) -> Option<&PeerCertificate> {
        self.peer_certificates.first()
    }
}

/// What the security annotator needs from a response.
#[derive(Debug, Clone, Default)]
pub struct ResponseSnapshot {
    pub headers: HeaderMap,
    /// `None` for plaintext connections.
    pub tls: Option<TlsSnapshot>,
}

/// Success half of an outcome.
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub status_code: u16,
    pub content_length: u64,
    pub timing: PerformanceMetrics,
    /// Last URL in the redirect chain (equal to the request URL without redirects).
    pub final_url: String,
    pub response: ResponseSnapshot,
}

/// Whether a verdict was computed from a response or defaulted because there was none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictBasis {
    Observed,
    Unreachable,
}

/// The pair of security signals attached to every annotated outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecurityVerdict {
    pub headers_secure: bool,
    pub tls_cert_valid: bool,
    #[serde(skip)]
    pub basis: VerdictBasis,
}

impl SecurityVerdict {
    pub fn observed(headers_secure: bool, tls_cert_valid: bool) -> Self {
        Self {
            headers_secure,
            tls_cert_valid,
            basis: VerdictBasis::Observed,
        }
    }

    /// Insecure-by-default verdict for a target that produced no response.
    pub fn unreachable() -> Self {
        Self {
            headers_secure: false,
            tls_cert_valid: false,
            basis: VerdictBasis::Unreachable,
        }
    }

    /// `false` when the target could not be checked at all.
    pub fn is_conclusive(&self) -> bool {
        self.basis == VerdictBasis::Observed
    }
}

/// The result record for one requested URL.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub url: String,
    pub result: Result<FetchSuccess, FailureCause>,
    /// Set by the security annotator, never before.
    pub security: Option<SecurityVerdict>,
}

impl FetchOutcome {
    pub fn success(url: impl Into<String>, success: FetchSuccess) -> Self {
        Self {
            url: url.into(),
            result: Ok(success),
            security: None,
        }
    }

    pub fn failure(url: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            result: Err(FailureCause::new(kind, message)),
            security: None,
        }
    }

    /// Returns the same outcome with its verdict set; nothing else changes.
    pub fn with_security(self, verdict: SecurityVerdict) -> Self {
        Self {
            security: Some(verdict),
            ..self
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.result.as_ref().ok().map(|s| s.status_code)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.result.as_ref().ok().map(|s| s.content_length)
    }

    pub fn timing(&self) -> Option<&PerformanceMetrics> {
        self.result.as_ref().ok().map(|s| &s.timing)
    }

    pub fn response(&self) -> Option<&ResponseSnapshot> {
        self.result.as_ref().ok().map(|s| &s.response)
    }

    pub fn failure_cause(&self) -> Option<&FailureCause> {
        self.result.as_ref().err()
    }
}
