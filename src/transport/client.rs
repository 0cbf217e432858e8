use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, CONNECTION, HOST, USER_AGENT};
use http::{HeaderMap, HeaderValue, Request};
use http_body_util::{BodyExt, Empty};
use url::Position;

use super::connect::{Connector, HttpConnection};
use super::pool::{Acquired, Leased, Pool, PoolKey, PoolLimits};
use super::{
    BodyError, ConnectionObserver, Transport, TransportError, TransportRequest,
    TransportResponse,
};
use crate::config::TransportConfig;
use crate::error_handling::InitializationError;

/// Keep-alive HTTP/1.1 transport over a shared connection pool.
///
/// One instance is shared by every fetch of a run.
pub struct PooledTransport {
    connector: Connector,
    pool: Arc<Pool<HttpConnection>>,
    user_agent: HeaderValue,
}

impl PooledTransport {
    /// # Errors
    ///
    /// Fails when the TLS configuration cannot be built or the User-Agent is
    /// not a valid header value.
    pub fn new(config: &TransportConfig) -> Result<Self, InitializationError> {
        let limits = PoolLimits {
            max_idle: config.max_idle_connections,
            max_idle_per_host: config.max_idle_per_host,
            max_per_host: config.max_connections_per_host,
            idle_timeout: config.idle_timeout,
        };
        log::debug!("Creating transport with {limits:?}");

        Ok(Self {
            connector: Connector::new(config)?,
            pool: Arc::new(Pool::new(limits)),
            user_agent: HeaderValue::from_str(&config.user_agent)?,
        })
    }

    /// Number of connections currently parked in the pool.
    pub fn idle_connections(&self) -> usize {
        self.pool.idle_count()
    }

    async fn checkout(
        &self,
        key: &PoolKey,
        observer: &mut dyn ConnectionObserver,
    ) -> Result<(Leased<HttpConnection>, bool), TransportError> {
        loop {
            match self.pool.acquire(key).await {
                Acquired::Idle(mut leased) => {
                    if leased.conn.sender.ready().await.is_ok() {
                        return Ok((leased, true));
                    }
                    log::debug!("Discarding closed pooled connection to {key}");
                }
                Acquired::Fresh(permit) => {
                    let conn = self.connector.connect(key, observer).await?;
                    return Ok((Leased::new(conn, permit), false));
                }
            }
        }
    }

    fn build_request(
        &self,
        request: &TransportRequest,
    ) -> Result<Request<Empty<Bytes>>, TransportError> {
        let url = &request.url;
        let invalid = |reason: String| TransportError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let host = url.host_str().ok_or_else(|| invalid("missing host".to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let target = &url[Position::BeforePath..Position::AfterQuery];

        let mut builder = Request::get(target).header(HOST, authority);
        for (name, value) in &request.headers {
            if name != HOST {
                builder = builder.header(name, value);
            }
        }
        if !request.headers.contains_key(USER_AGENT) {
            builder = builder.header(USER_AGENT, self.user_agent.clone());
        }
        if !request.headers.contains_key(ACCEPT) {
            builder = builder.header(ACCEPT, "*/*");
        }
        builder
            .body(Empty::new())
            .map_err(|e| invalid(e.to_string()))
    }
}

#[async_trait]
impl Transport for PooledTransport {
    async fn round_trip(
        &self,
        request: &TransportRequest,
        observer: &mut dyn ConnectionObserver,
    ) -> Result<TransportResponse, TransportError> {
        let key = PoolKey::from_url(&request.url)?;
        let http_request = self.build_request(request)?;

        let (mut leased, reused) = self.checkout(&key, observer).await?;
        observer.got_connection(reused);

        let response = leased
            .conn
            .sender
            .send_request(http_request)
            .await
            .map_err(TransportError::Http)?;
        observer.first_response_byte();

        let (parts, body) = response.into_parts();
        let reusable = !wants_close(&parts.headers);
        let tls = leased.conn.tls.clone();
        let body = body.map_err(BodyError::from).boxed_unsync();

        let pool = Arc::clone(&self.pool);
        Ok(
            TransportResponse::new(parts.status, parts.headers, tls, body).on_complete(move || {
                if reusable {
                    pool.put(key, leased);
                }
            }),
        )
    }
}

fn wants_close(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("close"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::NoopObserver;
    use std::net::SocketAddr;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct Recorder {
        reused: Vec<bool>,
        connects: usize,
        first_bytes: usize,
    }

    impl ConnectionObserver for Recorder {
        fn connect_start(&mut self, _addr: SocketAddr) {
            self.connects += 1;
        }
        fn got_connection(&mut self, reused: bool) {
            self.reused.push(reused);
        }
        fn first_response_byte(&mut self) {
            self.first_bytes += 1;
        }
    }

    fn transport() -> PooledTransport {
        PooledTransport::new(&TransportConfig::default()).expect("transport")
    }

    #[tokio::test]
    async fn test_round_trip_sends_user_agent_and_reads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .and(header("user-agent", crate::config::DEFAULT_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("hi there"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/hello", server.uri())).expect("url");
        let transport = transport();
        let mut recorder = Recorder::default();
        let mut response = transport
            .round_trip(&TransportRequest::get(url), &mut recorder)
            .await
            .expect("round trip");

        assert_eq!(response.status.as_u16(), 200);
        assert!(response.tls.is_none());
        assert_eq!(response.drain().await.expect("body"), 8);
        assert_eq!(recorder.reused, vec![false]);
        assert_eq!(recorder.first_bytes, 1);
    }

    #[tokio::test]
    async fn test_drained_connection_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).expect("url");
        let transport = transport();
        let mut recorder = Recorder::default();

        for _ in 0..2 {
            let mut response = transport
                .round_trip(&TransportRequest::get(url.clone()), &mut recorder)
                .await
                .expect("round trip");
            response.drain().await.expect("body");
        }

        assert_eq!(recorder.reused, vec![false, true]);
        assert_eq!(recorder.connects, 1);
    }

    #[tokio::test]
    async fn test_undrained_response_is_not_pooled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).expect("url");
        let transport = transport();
        let response = transport
            .round_trip(&TransportRequest::get(url), &mut NoopObserver)
            .await
            .expect("round trip");
        drop(response);
        assert_eq!(transport.idle_connections(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_invalid_url() {
        let url = Url::parse("ftp://example.com/file").expect("url");
        let err = transport()
            .round_trip(&TransportRequest::get(url), &mut NoopObserver)
            .await
            .expect_err("ftp is not supported");
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn test_wants_close() {
        let mut headers = HeaderMap::new();
        assert!(!wants_close(&headers));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, Close"));
        assert!(wants_close(&headers));
    }
}
