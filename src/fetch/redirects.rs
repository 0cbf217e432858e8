//! Redirect detection and `Location` resolution.

use http::header::LOCATION;
use http::{HeaderMap, StatusCode};
use url::Url;

/// Whether the status code asks the client to follow `Location`.
pub(crate) fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Resolves the next hop for a redirect response.
///
/// Returns `None` when the response is final: either not a redirect status or a
/// redirect without a `Location` header. A relative `Location` is resolved
/// against `current`.
pub(crate) fn redirect_target(
    current: &Url,
    status: StatusCode,
    headers: &HeaderMap,
) -> Option<Result<Url, String>> {
    if !is_redirect(status) {
        return None;
    }
    let Some(location) = headers.get(LOCATION) else {
        log::warn!("Redirect status {status} for {current} but no Location header");
        return None;
    };

    let target = location
        .to_str()
        .map_err(|e| format!("failed to read Location header: {e}"))
        .and_then(|loc| {
            current
                .join(loc)
                .map_err(|e| format!("failed to parse Location header {loc:?}: {e}"))
        });
    Some(target)
}
