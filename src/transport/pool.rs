//! Keyed pool of idle connections with a per-host cap on live connections.
//!
//! Every live connection (idle or in use) holds one permit of its host's
//! semaphore, so the number of connections per host never exceeds
//! `max_connections_per_host`. Idle connections are handed out most recent
//! first and expire after `idle_timeout`. A host entry lives only while it
//! has a live connection or a waiter, so the map tracks active hosts rather
//! than every host seen.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use url::{Host, Url};

use super::TransportError;

/// Connections are shared only between requests with the same scheme, host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PoolKey {
    pub(crate) https: bool,
    /// Domain name or bare IP literal (no brackets).
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl PoolKey {
    pub(crate) fn from_url(url: &Url) -> Result<Self, TransportError> {
        let invalid = |reason: &str| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let https = match url.scheme() {
            "http" => false,
            "https" => true,
            _ => return Err(invalid("scheme must be http or https")),
        };
        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(invalid("missing host")),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(Self { https, host, port })
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.https { "https" } else { "http" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

/// A connection the pool can tell is dead without doing I/O.
pub(crate) trait Poolable: Send + 'static {
    fn is_closed(&self) -> bool;
}

/// A live connection together with the host permit it occupies.
pub(crate) struct Leased<C> {
    pub(crate) conn: C,
    _permit: OwnedSemaphorePermit,
}

impl<C> Leased<C> {
    pub(crate) fn new(conn: C, permit: OwnedSemaphorePermit) -> Self {
        Self {
            conn,
            _permit: permit,
        }
    }
}

/// Result of [`Pool::acquire`].
pub(crate) enum Acquired<C> {
    /// An idle connection; the caller should verify it is still usable.
    Idle(Leased<C>),
    /// Room for a new connection; the permit must be attached to it.
    Fresh(OwnedSemaphorePermit),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PoolLimits {
    pub(crate) max_idle: usize,
    pub(crate) max_idle_per_host: usize,
    pub(crate) max_per_host: usize,
    pub(crate) idle_timeout: Duration,
}

struct IdleEntry<C> {
    leased: Leased<C>,
    since: Instant,
}

struct HostEntry<C> {
    /// Oldest at the front.
    idle: VecDeque<IdleEntry<C>>,
    limit: Arc<Semaphore>,
    returned: Arc<Notify>,
}

struct PoolState<C> {
    hosts: HashMap<PoolKey, HostEntry<C>>,
    idle_total: usize,
}

pub(crate) struct Pool<C> {
    state: Mutex<PoolState<C>>,
    limits: PoolLimits,
}

impl<C: Poolable> Pool<C> {
    pub(crate) fn new(limits: PoolLimits) -> Self {
        Self {
            state: Mutex::new(PoolState {
                hosts: HashMap::new(),
                idle_total: 0,
            }),
            limits,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn host_handles(&self, key: &PoolKey) -> (Arc<Semaphore>, Arc<Notify>) {
        let max_per_host = self.limits.max_per_host.max(1);
        let mut state = self.lock();
        if !state.hosts.contains_key(key) {
            prune_unused_hosts(&mut state.hosts);
        }
        let host = state
            .hosts
            .entry(key.clone())
            .or_insert_with(|| HostEntry {
                idle: VecDeque::new(),
                limit: Arc::new(Semaphore::new(max_per_host)),
                returned: Arc::new(Notify::new()),
            });
        (Arc::clone(&host.limit), Arc::clone(&host.returned))
    }

    /// Waits until either an idle connection or room for a new one is available.
    pub(crate) async fn acquire(&self, key: &PoolKey) -> Acquired<C> {
        let (limit, returned) = self.host_handles(key);
        loop {
            // Registered before looking at the idle list so a connection
            // returned in between still wakes us.
            let notified = returned.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(leased) = self.take_idle(key) {
                return Acquired::Idle(leased);
            }

            tokio::select! {
                permit = Arc::clone(&limit).acquire_owned() => {
                    if let Ok(permit) = permit {
                        return Acquired::Fresh(permit);
                    }
                }
                _ = &mut notified => {}
            }
        }
    }

    fn take_idle(&self, key: &PoolKey) -> Option<Leased<C>> {
        let idle_timeout = self.limits.idle_timeout;
        let mut state = self.lock();
        let state = &mut *state;
        let host = state.hosts.get_mut(key)?;

        while host
            .idle
            .front()
            .is_some_and(|entry| entry.since.elapsed() >= idle_timeout)
        {
            host.idle.pop_front();
            state.idle_total -= 1;
            log::debug!("Expired idle connection to {key}");
        }

        while let Some(entry) = host.idle.pop_back() {
            state.idle_total -= 1;
            if !entry.leased.conn.is_closed() {
                return Some(entry.leased);
            }
        }
        None
    }

    /// Returns a connection for reuse, or drops it when the pool is full or it is closed.
    pub(crate) fn put(&self, key: PoolKey, leased: Leased<C>) {
        if leased.conn.is_closed()
            || self.limits.max_idle == 0
            || self.limits.max_idle_per_host == 0
        {
            return;
        }

        let returned = {
            let mut state = self.lock();
            let state = &mut *state;
            let Some(host) = state.hosts.get_mut(&key) else {
                return;
            };
            host.idle.push_back(IdleEntry {
                leased,
                since: Instant::now(),
            });
            state.idle_total += 1;

            if host.idle.len() > self.limits.max_idle_per_host {
                host.idle.pop_front();
                state.idle_total -= 1;
            }
            let returned = Arc::clone(&host.returned);

            while state.idle_total > self.limits.max_idle {
                if !evict_oldest(state) {
                    break;
                }
            }
            returned
        };
        returned.notify_waiters();
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.lock().idle_total
    }

    #[cfg(test)]
    fn host_count(&self) -> usize {
        self.lock().hosts.len()
    }
}

/// Drops hosts nobody references: every live connection and every pending
/// `acquire` holds a clone of the host semaphore.
fn prune_unused_hosts<C>(hosts: &mut HashMap<PoolKey, HostEntry<C>>) {
    hosts.retain(|_, host| !host.idle.is_empty() || Arc::strong_count(&host.limit) > 1);
}

fn evict_oldest<C>(state: &mut PoolState<C>) -> bool {
    let oldest = state
        .hosts
        .iter()
        .filter_map(|(key, host)| host.idle.front().map(|entry| (entry.since, key)))
        .min_by_key(|(since, _)| *since)
        .map(|(_, key)| key.clone());

    match oldest.and_then(|key| state.hosts.get_mut(&key)) {
        Some(host) => {
            host.idle.pop_front();
            state.idle_total -= 1;
            true
        }
        None => false,
    }
}
