//! DNS resolver initialization.

use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Initializes the DNS resolver used for every new connection.
///
/// Reads the system configuration (`/etc/resolv.conf` on Unix). When that
/// fails, logs a warning and falls back to the resolver defaults.
pub fn init_resolver() -> TokioAsyncResolver {
    match TokioAsyncResolver::tokio_from_system_conf() {
        Ok(resolver) => resolver,
        Err(e) => {
            log::warn!("Failed to read system DNS configuration ({e}); using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_resolver_never_fails() {
        let resolver = init_resolver();
        // IP literals resolve locally without touching the network.
        let lookup = resolver.lookup_ip("127.0.0.1").await.expect("ip literal");
        assert!(lookup.iter().any(|ip| ip.is_loopback()));
    }
}
