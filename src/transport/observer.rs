//! Connection lifecycle hooks.

use std::net::SocketAddr;

/// Receives lifecycle events while a transport establishes a connection and
/// sends a request.
///
/// Events arrive in lifecycle order on the fetching task. A reused pooled
/// connection fires only [`got_connection`](Self::got_connection) and
/// [`first_response_byte`](Self::first_response_byte). IP-literal hosts skip
/// the DNS events and plaintext connections skip the TLS events.
pub trait ConnectionObserver: Send {
    fn dns_start(&mut self, _host: &str) {}
    fn dns_done(&mut self, _succeeded: bool) {}
    /// Fires once per address attempted.
    fn connect_start(&mut self, _addr: SocketAddr) {}
    fn connect_done(&mut self, _addr: SocketAddr, _succeeded: bool) {}
    fn tls_handshake_start(&mut self) {}
    fn tls_handshake_done(&mut self, _succeeded: bool) {}
    fn got_connection(&mut self, _reused: bool) {}
    /// The response status line and headers have been read.
    fn first_response_byte(&mut self) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ConnectionObserver for NoopObserver {}
