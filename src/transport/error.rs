use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use trust_dns_resolver::error::ResolveError;

use crate::error_handling::FailureKind;

/// Boxed error produced while streaming a response body.
pub type BodyError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while obtaining a connection or exchanging a request.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("unsupported request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("DNS lookup for {host} failed: {source}")]
    Dns {
        host: String,
        #[source]
        source: ResolveError,
    },

    #[error("DNS lookup for {host} returned no addresses")]
    NoAddresses { host: String },

    #[error("TCP connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("TCP connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },

    #[error("invalid TLS server name {0}")]
    InvalidServerName(String),

    #[error("TLS handshake with {host} failed: {source}")]
    TlsHandshake {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {host} timed out after {timeout:?}")]
    TlsHandshakeTimeout { host: String, timeout: Duration },

    #[error("HTTP/1.1 handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("request failed: {0}")]
    Http(#[source] hyper::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] BodyError),
}

impl TransportError {
    /// Maps the error onto the per-URL failure taxonomy.
    ///
    /// Anything that prevents a connection from existing is a connection
    /// failure; errors on an established connection are transport errors.
    pub fn kind(&self) -> FailureKind {
        match self {
            TransportError::InvalidUrl { .. } => FailureKind::InvalidRequest,
            TransportError::Dns { .. }
            | TransportError::NoAddresses { .. }
            | TransportError::Connect { .. }
            | TransportError::ConnectTimeout { .. }
            | TransportError::InvalidServerName(_)
            | TransportError::TlsHandshake { .. }
            | TransportError::TlsHandshakeTimeout { .. } => FailureKind::ConnectionFailed,
            TransportError::Handshake(_) | TransportError::Http(_) | TransportError::Body(_) => {
                FailureKind::TransportError
            }
        }
    }
}
