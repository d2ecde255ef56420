//! The delegation cache: zone → ordered name-server snapshot.
//!
//! Populated from referral authority sections so a later resolve under
//! the same zone can start at the delegated servers instead of repeating
//! the referral walk.

use dashmap::DashMap;
use hearth_dns_domain::{ResolverOpts, ServerStream};
use rustc_hash::FxBuildHasher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct NsEntry {
    servers: Vec<SocketAddr>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct AuthoritativeNsCache {
    map: DashMap<Arc<str>, NsEntry, FxBuildHasher>,
}

impl AuthoritativeNsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the server snapshot for `zone` in stream order.
    pub fn insert(&self, zone: Arc<str>, servers: Vec<SocketAddr>, ttl: u32, opts: &ResolverOpts) {
        let ttl = opts.clamp_ttl(ttl);
        if ttl == 0 || servers.is_empty() {
            return;
        }
        debug!(zone = %zone, servers = servers.len(), ttl = ttl, "caching delegation");
        self.map.insert(
            zone,
            NsEntry {
                servers,
                expires_at: Instant::now() + Duration::from_secs(u64::from(ttl)),
            },
        );
    }

    /// A fresh stream over the cached snapshot, when one is still live.
    pub fn get(&self, zone: &str) -> Option<ServerStream> {
        let now = Instant::now();
        let stream = {
            let entry = self.map.get(zone)?;
            if entry.expires_at > now {
                Some(ServerStream::sequential(entry.servers.iter().copied()))
            } else {
                None
            }
        };
        if stream.is_none() {
            self.map.remove_if(zone, |_, entry| entry.expires_at <= now);
        }
        stream
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_preserves_order() {
        let cache = AuthoritativeNsCache::new();
        let servers: Vec<SocketAddr> =
            vec!["192.0.2.10:53".parse().unwrap(), "192.0.2.11:53".parse().unwrap()];
        cache.insert(Arc::from("example.org."), servers.clone(), 3_600, &ResolverOpts::default());

        let mut stream = cache.get("example.org.").unwrap();
        assert_eq!(stream.next(), Some(servers[0]));
        assert_eq!(stream.next(), Some(servers[1]));
    }

    #[test]
    fn unknown_zone_misses() {
        let cache = AuthoritativeNsCache::new();
        assert!(cache.get("example.net.").is_none());
    }
}
