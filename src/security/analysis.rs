//! Security signal computation.

use chrono::{DateTime, Utc};
use http::HeaderMap;

use crate::config::HEADER_CONTENT_SECURITY_POLICY;
use crate::models::{ResponseSnapshot, SecurityVerdict, TlsSnapshot};

/// Computes the verdict for a response that was actually received.
///
/// Pure: the same snapshot and `now` always give the same verdict.
pub fn assess(response: &ResponseSnapshot, now: DateTime<Utc>) -> SecurityVerdict {
    SecurityVerdict::observed(
        headers_secure(&response.headers),
        tls_cert_valid(response.tls.as_ref(), now),
    )
}

/// A `Content-Security-Policy` header with a non-blank value is present.
pub fn headers_secure(headers: &HeaderMap) -> bool {
    headers
        .get(HEADER_CONTENT_SECURITY_POLICY)
        .is_some_and(|value| !value.as_bytes().trim_ascii().is_empty())
}

/// The response came over TLS and the leaf certificate has not yet expired.
///
/// Only the leaf's expiry is checked here; chain and hostname verification
/// happen during the handshake.
pub fn tls_cert_valid(tls: Option<&TlsSnapshot>, now: DateTime<Utc>) -> bool {
    tls.and_then(TlsSnapshot::leaf)
        .and_then(|leaf| leaf.not_after)
        .is_some_and(|not_after| now < not_after)
}
