//! Per-request timing capture.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;

use crate::models::PerformanceMetrics;
use crate::transport::ConnectionObserver;

#[derive(Debug, Default, Clone, Copy)]
struct Phase {
    start: Option<Instant>,
    done: Option<Instant>,
}

impl Phase {
    fn begin(&mut self) {
        self.start = Some(Instant::now());
        self.done = None;
    }

    fn end(&mut self) {
        self.done = Some(Instant::now());
    }

    fn duration(&self) -> Duration {
        match (self.start, self.done) {
            (Some(start), Some(done)) => done.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}

/// Records connection lifecycle instants for one fetch.
///
/// Redirect hops feed the same recorder, so a phase that happens more than
/// once reports its most recent occurrence.
#[derive(Debug)]
pub(crate) struct TimingRecorder {
    start: Instant,
    dns: Phase,
    connect: Phase,
    tls: Phase,
    first_byte: Option<Instant>,
    completed: Option<Instant>,
}

impl TimingRecorder {
    pub(crate) fn start() -> Self {
        Self {
            start: Instant::now(),
            dns: Phase::default(),
            connect: Phase::default(),
            tls: Phase::default(),
            first_byte: None,
            completed: None,
        }
    }

    /// Marks the final response body as fully read.
    pub(crate) fn response_complete(&mut self) {
        self.completed = Some(Instant::now());
    }

    pub(crate) fn metrics(&self) -> PerformanceMetrics {
        let since_start = |at: Option<Instant>| {
            at.map(|at| at.saturating_duration_since(self.start))
                .unwrap_or_default()
        };
        let time_to_first_byte = since_start(self.first_byte);
        let total = since_start(self.completed).max(time_to_first_byte);

        PerformanceMetrics {
            dns_lookup: self.dns.duration(),
            tcp_connect: self.connect.duration(),
            tls_handshake: self.tls.duration(),
            time_to_first_byte,
            total,
        }
    }
}

impl ConnectionObserver for TimingRecorder {
    fn dns_start(&mut self, host: &str) {
        log::trace!("DNS lookup for {host} started");
        self.dns.begin();
    }

    fn dns_done(&mut self, _succeeded: bool) {
        self.dns.end();
    }

    fn connect_start(&mut self, addr: SocketAddr) {
        log::trace!("Connecting to {addr}");
        self.connect.begin();
    }

    fn connect_done(&mut self, _addr: SocketAddr, _succeeded: bool) {
        self.connect.end();
    }

    fn tls_handshake_start(&mut self) {
        self.tls.begin();
    }

    fn tls_handshake_done(&mut self, _succeeded: bool) {
        self.tls.end();
    }

    fn got_connection(&mut self, reused: bool) {
        log::trace!("Got connection (reused: {reused})");
    }

    fn first_response_byte(&mut self) {
        self.first_byte = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fresh_tls_connection_phases() {
        let addr: SocketAddr = "192.0.2.1:443".parse().expect("addr");
        let mut recorder = TimingRecorder::start();

        recorder.dns_start("example.com");
        tokio::time::advance(Duration::from_millis(5)).await;
        recorder.dns_done(true);
        recorder.connect_start(addr);
        tokio::time::advance(Duration::from_millis(10)).await;
        recorder.connect_done(addr, true);
        recorder.tls_handshake_start();
        tokio::time::advance(Duration::from_millis(20)).await;
        recorder.tls_handshake_done(true);
        recorder.got_connection(false);
        tokio::time::advance(Duration::from_millis(30)).await;
        recorder.first_response_byte();
        tokio::time::advance(Duration::from_millis(40)).await;
        recorder.response_complete();

        let metrics = recorder.metrics();
        assert_eq!(metrics.dns_lookup, Duration::from_millis(5));
        assert_eq!(metrics.tcp_connect, Duration::from_millis(10));
        assert_eq!(metrics.tls_handshake, Duration::from_millis(20));
        assert_eq!(metrics.time_to_first_byte, Duration::from_millis(65));
        assert_eq!(metrics.total, Duration::from_millis(105));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reused_connection_leaves_setup_phases_zero() {
        let mut recorder = TimingRecorder::start();
        recorder.got_connection(true);
        tokio::time::advance(Duration::from_millis(7)).await;
        recorder.first_response_byte();
        recorder.response_complete();

        let metrics = recorder.metrics();
        assert_eq!(metrics.dns_lookup, Duration::ZERO);
        assert_eq!(metrics.tcp_connect, Duration::ZERO);
        assert_eq!(metrics.tls_handshake, Duration::ZERO);
        assert_eq!(metrics.time_to_first_byte, Duration::from_millis(7));
        assert_eq!(metrics.total, Duration::from_millis(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_connect_attempt_wins() {
        let first: SocketAddr = "192.0.2.1:80".parse().expect("addr");
        let second: SocketAddr = "192.0.2.2:80".parse().expect("addr");
        let mut recorder = TimingRecorder::start();

        recorder.connect_start(first);
        tokio::time::advance(Duration::from_millis(100)).await;
        recorder.connect_done(first, false);
        recorder.connect_start(second);
        tokio::time::advance(Duration::from_millis(3)).await;
        recorder.connect_done(second, true);

        assert_eq!(recorder.metrics().tcp_connect, Duration::from_millis(3));
    }

    #[test]
    fn test_unfinished_phase_is_zero() {
        let mut recorder = TimingRecorder::start();
        recorder.dns_start("example.com");
        let metrics = recorder.metrics();
        assert_eq!(metrics.dns_lookup, Duration::ZERO);
        assert!(metrics.total >= metrics.time_to_first_byte);
    }
}
