//! TLS client setup and handshake.
//!
//! Connections are verified against the bundled webpki root store, plus any
//! extra trust anchors from the transport settings, and negotiate HTTP/1.1
//! over ALPN. The peer chain is parsed once, right after
//! the handshake, into a [`TlsSnapshot`] that travels with the pooled
//! connection.

mod extract;

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::error_handling::InitializationError;
use crate::models::TlsSnapshot;
use crate::transport::TransportError;

pub use extract::snapshot_from_connection;

const ALPN_HTTP_1_1: &[u8] = b"http/1.1";

/// Builds the shared TLS connector trusting the webpki roots and `extra_roots`.
///
/// # Errors
///
/// Returns an error if an extra root is not a usable trust anchor or the
/// crypto provider rejects the default protocol versions.
pub fn build_connector(
    extra_roots: &[CertificateDer<'static>],
) -> Result<TlsConnector, InitializationError> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    for root in extra_roots {
        root_store.add(root.clone())?;
    }
    if !extra_roots.is_empty() {
        log::debug!("Trusting {} extra root certificate(s)", extra_roots.len());
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    config.alpn_protocols = vec![ALPN_HTTP_1_1.to_vec()];

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Runs the client handshake over an established TCP stream.
///
/// The handshake is bounded by `timeout`; an elapsed timer is reported as
/// [`TransportError::TlsHandshakeTimeout`].
pub async fn handshake(
    connector: &TlsConnector,
    host: &str,
    tcp: TcpStream,
    timeout: Duration,
) -> Result<(TlsStream<TcpStream>, TlsSnapshot), TransportError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| TransportError::InvalidServerName(host.to_string()))?;

    let stream = match tokio::time::timeout(timeout, connector.connect(server_name, tcp)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(TransportError::TlsHandshake {
                host: host.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(TransportError::TlsHandshakeTimeout {
                host: host.to_string(),
                timeout,
            })
        }
    };

    let snapshot = snapshot_from_connection(stream.get_ref().1);
    log::debug!(
        "TLS handshake with {host} complete ({}, {} peer certificate(s))",
        snapshot.protocol_version.as_deref().unwrap_or("unknown version"),
        snapshot.peer_certificates.len()
    );
    Ok((stream, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_connector_succeeds() {
        assert!(build_connector(&[]).is_ok());
    }

    #[test]
    fn test_build_connector_accepts_extra_root() {
        let certified = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("self-signed cert");
        assert!(build_connector(&[certified.cert.der().clone()]).is_ok());
    }

    #[test]
    fn test_build_connector_rejects_garbage_root() {
        let garbage = CertificateDer::from(b"not a certificate".to_vec());
        let err = build_connector(&[garbage]).err().expect("garbage root");
        assert!(matches!(err, InitializationError::TlsConfigError(_)), "{err}");
    }

    #[tokio::test]
    async fn test_handshake_rejects_invalid_server_name() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        let tcp = TcpStream::connect(addr).await.expect("connect");
        let connector = build_connector(&[]).expect("connector");

        let err = handshake(&connector, "not a hostname", tcp, Duration::from_secs(1))
            .await
            .expect_err("invalid server name must fail");
        assert!(matches!(err, TransportError::InvalidServerName(_)));
    }

    #[tokio::test]
    async fn test_handshake_times_out_on_silent_peer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        // Accept and hold the socket open without ever answering the ClientHello.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let tcp = TcpStream::connect(addr).await.expect("connect");
        let connector = build_connector(&[]).expect("connector");
        let err = handshake(&connector, "localhost", tcp, Duration::from_millis(100))
            .await
            .expect_err("silent peer must time out");
        assert!(matches!(err, TransportError::TlsHandshakeTimeout { .. }));
        server.abort();
    }
}
