//! The alias cache: one `alias → target` edge per name.
//!
//! Chains are not stored; a resolve re-walks them hop by hop, with every
//! hop cache-warm after the first traversal.

use dashmap::DashMap;
use hearth_dns_domain::ResolverOpts;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CnameEntry {
    target: Arc<str>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct CnameCache {
    map: DashMap<Arc<str>, CnameEntry, FxBuildHasher>,
}

impl CnameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `alias → target`, replacing any previous mapping for the
    /// alias. Zero-TTL edges (after clamping) are not cached.
    pub fn insert(&self, alias: Arc<str>, target: Arc<str>, ttl: u32, opts: &ResolverOpts) {
        let ttl = opts.clamp_ttl(ttl);
        if ttl == 0 {
            return;
        }
        debug!(alias = %alias, target = %target, ttl = ttl, "caching CNAME edge");
        self.map.insert(
            alias,
            CnameEntry {
                target,
                expires_at: Instant::now() + Duration::from_secs(u64::from(ttl)),
            },
        );
    }

    pub fn get(&self, alias: &str) -> Option<Arc<str>> {
        let now = Instant::now();
        let target = {
            let entry = self.map.get(alias)?;
            if entry.expires_at > now {
                Some(Arc::clone(&entry.target))
            } else {
                None
            }
        };
        if target.is_none() {
            self.map.remove_if(alias, |_, entry| entry.expires_at <= now);
        }
        target
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
