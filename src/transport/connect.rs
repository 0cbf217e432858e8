//! DNS, TCP and TLS connection setup for new pooled connections.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use trust_dns_resolver::TokioAsyncResolver;

use super::pool::{PoolKey, Poolable};
use super::{ConnectionObserver, TransportError};
use crate::config::TransportConfig;
use crate::error_handling::InitializationError;
use crate::initialization::init_resolver;
use crate::models::TlsSnapshot;
use crate::tls;

/// An HTTP/1.1 connection ready to carry requests.
pub(crate) struct HttpConnection {
    pub(crate) sender: SendRequest<Empty<Bytes>>,
    pub(crate) tls: Option<TlsSnapshot>,
}

impl Poolable for HttpConnection {
    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub(crate) struct Connector {
    resolver: TokioAsyncResolver,
    tls: TlsConnector,
    connect_timeout: Duration,
    tls_handshake_timeout: Duration,
}

impl Connector {
    pub(crate) fn new(config: &TransportConfig) -> Result<Self, InitializationError> {
        Ok(Self {
            resolver: init_resolver(),
            tls: tls::build_connector(&config.extra_root_certificates)?,
            connect_timeout: config.connect_timeout,
            tls_handshake_timeout: config.tls_handshake_timeout,
        })
    }

    /// Opens a new connection for `key`, reporting each phase to `observer`.
    pub(crate) async fn connect(
        &self,
        key: &PoolKey,
        observer: &mut dyn ConnectionObserver,
    ) -> Result<HttpConnection, TransportError> {
        let addrs = self.resolve(key, observer).await?;
        let tcp = self.open_tcp(key, addrs, observer).await?;

        if key.https {
            observer.tls_handshake_start();
            let result =
                tls::handshake(&self.tls, &key.host, tcp, self.tls_handshake_timeout).await;
            observer.tls_handshake_done(result.is_ok());
            let (stream, snapshot) = result?;
            let sender = http1_handshake(stream, key).await?;
            Ok(HttpConnection {
                sender,
                tls: Some(snapshot),
            })
        } else {
            let sender = http1_handshake(tcp, key).await?;
            Ok(HttpConnection { sender, tls: None })
        }
    }

    async fn resolve(
        &self,
        key: &PoolKey,
        observer: &mut dyn ConnectionObserver,
    ) -> Result<Vec<SocketAddr>, TransportError> {
        if let Ok(ip) = key.host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, key.port)]);
        }

        observer.dns_start(&key.host);
        let lookup = self.resolver.lookup_ip(key.host.as_str()).await;
        observer.dns_done(lookup.is_ok());

        let lookup = lookup.map_err(|source| TransportError::Dns {
            host: key.host.clone(),
            source,
        })?;
        let addrs: Vec<SocketAddr> = lookup
            .iter()
            .map(|ip| SocketAddr::new(ip, key.port))
            .collect();
        if addrs.is_empty() {
            return Err(TransportError::NoAddresses {
                host: key.host.clone(),
            });
        }
        log::debug!("Resolved {} to {} address(es)", key.host, addrs.len());
        Ok(addrs)
    }

    /// Tries each address in order and keeps the first that connects.
    async fn open_tcp(
        &self,
        key: &PoolKey,
        addrs: Vec<SocketAddr>,
        observer: &mut dyn ConnectionObserver,
    ) -> Result<TcpStream, TransportError> {
        let mut last_error = None;
        for addr in addrs {
            observer.connect_start(addr);
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    observer.connect_done(addr, true);
                    if let Err(e) = stream.set_nodelay(true) {
                        log::debug!("Failed to set TCP_NODELAY on {addr}: {e}");
                    }
                    return Ok(stream);
                }
                Ok(Err(source)) => {
                    observer.connect_done(addr, false);
                    log::debug!("TCP connect to {addr} failed: {source}");
                    last_error = Some(TransportError::Connect { addr, source });
                }
                Err(_) => {
                    observer.connect_done(addr, false);
                    log::debug!("TCP connect to {addr} timed out");
                    last_error = Some(TransportError::ConnectTimeout {
                        addr,
                        timeout: self.connect_timeout,
                    });
                }
            }
        }
        Err(last_error.unwrap_or_else(|| TransportError::NoAddresses {
            host: key.host.clone(),
        }))
    }
}

async fn http1_handshake<S>(
    io: S,
    key: &PoolKey,
) -> Result<SendRequest<Empty<Bytes>>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, conn) = http1::handshake(TokioIo::new(io))
        .await
        .map_err(TransportError::Handshake)?;

    let label = key.to_string();
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            log::debug!("Connection to {label} ended with error: {e}");
        }
    });
    Ok(sender)
}
