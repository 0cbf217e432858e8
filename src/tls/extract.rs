//! Certificate extraction utilities.

use chrono::DateTime;
use rustls::ClientConnection;

use crate::models::{PeerCertificate, TlsSnapshot};

/// Captures the negotiated version and the parsed peer chain of a finished handshake.
pub fn snapshot_from_connection(conn: &ClientConnection) -> TlsSnapshot {
    let protocol_version = conn.protocol_version().map(|v| format!("{v:?}"));
    let peer_certificates = conn
        .peer_certificates()
        .map(|certs| {
            certs
                .iter()
                .map(|cert| parse_peer_certificate(cert.as_ref()))
                .collect()
        })
        .unwrap_or_default();

    TlsSnapshot {
        protocol_version,
        peer_certificates,
    }
}

/// Parses one DER certificate.
///
/// A certificate x509-parser cannot read is kept with an empty subject and no
/// expiry, so chain positions stay intact and the leaf is never misidentified.
pub fn parse_peer_certificate(der: &[u8]) -> PeerCertificate {
    match x509_parser::parse_x509_certificate(der) {
        Ok((_, cert)) => {
            let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0);
            PeerCertificate {
                subject: cert.subject().to_string(),
                not_after,
            }
        }
        Err(e) => {
            log::debug!("Failed to parse peer certificate: {e}");
            PeerCertificate {
                subject: String::new(),
                not_after: None,
            }
        }
    }
}
