//! HTTP/1.1 client transport with connection lifecycle hooks.
//!
//! The [`Transport`] trait performs a single request/response exchange and
//! reports connection events to a [`ConnectionObserver`]. [`PooledTransport`]
//! is the production implementation: it keeps idle keep-alive connections per
//! scheme/host/port and caps live connections per host.
//!
//! Redirects are not followed here; that is the fetcher's job.

mod client;
mod connect;
mod error;
mod observer;
mod pool;

use std::convert::Infallible;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use url::Url;

use crate::models::TlsSnapshot;

pub use client::PooledTransport;
pub use error::{BodyError, TransportError};
pub use observer::{ConnectionObserver, NoopObserver};

/// Streaming response body.
pub type ResponseBody = UnsyncBoxBody<Bytes, BodyError>;

/// A GET request to send.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    /// Extra headers. `Host` is always derived from the URL.
    pub headers: HeaderMap,
}

impl TransportRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
        }
    }
}

/// Status, headers and a body that still has to be read.
///
/// The underlying connection goes back to its pool only once the body has
/// been read to the end with [`drain`](Self::drain). Dropping the response
/// earlier closes the connection.
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// TLS state of the connection that carried the response.
    pub tls: Option<TlsSnapshot>,
    body: ResponseBody,
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl TransportResponse {
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        tls: Option<TlsSnapshot>,
        body: ResponseBody,
    ) -> Self {
        Self {
            status,
            headers,
            tls,
            body,
            on_complete: None,
        }
    }

    /// A response with a fully buffered body.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = Full::new(body.into())
            .map_err(|never: Infallible| -> BodyError { match never {} })
            .boxed_unsync();
        Self::new(status, headers, None, body)
    }

    /// Registers a callback that runs once the body has been read completely.
    pub fn on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Reads the body to the end and returns the number of bytes received.
    pub async fn drain(&mut self) -> Result<u64, TransportError> {
        let mut received = 0u64;
        while let Some(frame) = self.body.frame().await {
            let frame = frame.map_err(TransportError::Body)?;
            if let Some(data) = frame.data_ref() {
                received += data.len() as u64;
            }
        }
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
        Ok(received)
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

/// Performs one request/response exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(
        &self,
        request: &TransportRequest,
        observer: &mut dyn ConnectionObserver,
    ) -> Result<TransportResponse, TransportError>;
}
