//! Timing metrics aggregation.
//!
//! Per-fetch [`PerformanceMetrics`] are folded into [`TimingStats`] so a run
//! can report average phase durations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::models::PerformanceMetrics;

/// Aggregated timing statistics across all successful fetches.
///
/// Sums are kept in microseconds for precision and converted to milliseconds
/// only when displayed.
#[derive(Debug, Default)]
pub struct TimingStats {
    count: AtomicU64,
    dns_lookup_sum_us: AtomicU64,
    tcp_connect_sum_us: AtomicU64,
    tls_handshake_sum_us: AtomicU64,
    time_to_first_byte_sum_us: AtomicU64,
    total_sum_us: AtomicU64,
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the timing of one fetch.
    pub fn record(&self, metrics: &PerformanceMetrics) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.dns_lookup_sum_us
            .fetch_add(duration_to_micros(metrics.dns_lookup), Ordering::Relaxed);
        self.tcp_connect_sum_us
            .fetch_add(duration_to_micros(metrics.tcp_connect), Ordering::Relaxed);
        self.tls_handshake_sum_us
            .fetch_add(duration_to_micros(metrics.tls_handshake), Ordering::Relaxed);
        self.time_to_first_byte_sum_us.fetch_add(
            duration_to_micros(metrics.time_to_first_byte),
            Ordering::Relaxed,
        );
        self.total_sum_us
            .fetch_add(duration_to_micros(metrics.total), Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Average of each phase over all recorded fetches.
    pub fn averages(&self) -> PerformanceMetrics {
        let count = self.count();
        if count == 0 {
            return PerformanceMetrics::default();
        }
        let avg = |sum: &AtomicU64| Duration::from_micros(sum.load(Ordering::Relaxed) / count);

        PerformanceMetrics {
            dns_lookup: avg(&self.dns_lookup_sum_us),
            tcp_connect: avg(&self.tcp_connect_sum_us),
            tls_handshake: avg(&self.tls_handshake_sum_us),
            time_to_first_byte: avg(&self.time_to_first_byte_sum_us),
            total: avg(&self.total_sum_us),
        }
    }

    /// Logs a summary of timing statistics.
    pub fn log_summary(&self) {
        let count = self.count();
        if count == 0 {
            log::info!("No timing data collected");
            return;
        }

        let avg = self.averages();
        let total_ms = micros_to_ms(avg.total);
        let percentage = |part: u64| -> f64 {
            if total_ms == 0 {
                0.0
            } else {
                part as f64 / total_ms as f64 * 100.0
            }
        };

        log::info!("=== Timing Metrics Summary ({count} URLs) ===");
        log::info!("Average times per URL:");
        for (name, phase, sum) in [
            ("DNS Lookup:", avg.dns_lookup, &self.dns_lookup_sum_us),
            ("TCP Connect:", avg.tcp_connect, &self.tcp_connect_sum_us),
            ("TLS Handshake:", avg.tls_handshake, &self.tls_handshake_sum_us),
            (
                "Time to First Byte:",
                avg.time_to_first_byte,
                &self.time_to_first_byte_sum_us,
            ),
        ] {
            let avg_ms = micros_to_ms(phase);
            log::info!(
                "{}",
                format_timing_with_micros(
                    sum.load(Ordering::Relaxed),
                    avg_ms,
                    name,
                    percentage(avg_ms)
                )
            );
        }
        log::info!("  Total:               {total_ms:>6} ms");

        let total_sum_us = self.total_sum_us.load(Ordering::Relaxed);
        log::info!(
            "Total time across all URLs: {} ms ({:.2} seconds)",
            (total_sum_us + 500) / 1000,
            total_sum_us as f64 / 1_000_000.0
        );
    }
}

fn duration_to_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Rounds to the nearest millisecond.
fn micros_to_ms(duration: Duration) -> u64 {
    (duration_to_micros(duration) + 500) / 1000
}

/// Shows the microsecond total when the average rounds down to 0 ms.
fn format_timing_with_micros(sum_micros: u64, avg_ms: u64, name: &str, percentage: f64) -> String {
    if avg_ms == 0 && sum_micros > 0 {
        format!("  {name:20} {avg_ms:>6} ms ({percentage:.1}%) (< 1ms avg, {sum_micros}μs total)")
    } else {
        format!("  {name:20} {avg_ms:>6} ms ({percentage:.1}%)")
    }
}
