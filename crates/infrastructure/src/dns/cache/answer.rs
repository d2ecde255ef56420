//! The resolved-address cache.
//!
//! Keyed by owner name. A name holds either any number of positive
//! address entries or exactly one negative entry; inserting one kind
//! displaces the other, so the two never mix. Expired entries are
//! invisible to lookups and pruned lazily. Answers obtained with
//! user-supplied additionals never reach this cache; the callers enforce
//! that rule.

use dashmap::DashMap;
use hearth_dns_domain::{ResolveError, ResolvedRecord, ResolverOpts};
use rustc_hash::FxBuildHasher;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct PositiveEntry {
    address: IpAddr,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
enum NameEntries {
    Positive(Vec<PositiveEntry>),
    Negative {
        cause: ResolveError,
        expires_at: Instant,
    },
}

/// A lookup result: live addresses in insertion order, or the cached
/// failure.
#[derive(Debug, Clone)]
pub enum CachedAnswer {
    Addresses(Vec<IpAddr>),
    Negative(ResolveError),
}

#[derive(Debug, Default)]
pub struct AnswerCache {
    map: DashMap<Arc<str>, NameEntries, FxBuildHasher>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches a batch of address records under `name`, TTL-clamped per
    /// entry. Zero-TTL entries (after clamping) are not cached. A
    /// pre-existing negative entry is displaced; the per-name cap evicts
    /// the oldest positives first.
    pub fn insert_addresses(&self, name: Arc<str>, records: &[ResolvedRecord], opts: &ResolverOpts) {
        let now = Instant::now();
        let mut incoming: Vec<PositiveEntry> = Vec::with_capacity(records.len());
        for record in records {
            let ttl = opts.clamp_ttl(record.ttl);
            if ttl == 0 {
                continue;
            }
            incoming.push(PositiveEntry {
                address: record.address,
                expires_at: now + Duration::from_secs(u64::from(ttl)),
            });
        }
        if incoming.is_empty() {
            return;
        }

        let mut slot = self
            .map
            .entry(Arc::clone(&name))
            .or_insert_with(|| NameEntries::Positive(Vec::new()));
        if matches!(slot.value(), NameEntries::Negative { .. }) {
            *slot.value_mut() = NameEntries::Positive(Vec::new());
        }
        let NameEntries::Positive(entries) = slot.value_mut() else {
            unreachable!("negative entries were displaced above")
        };
        entries.retain(|e| e.expires_at > now);

        for entry in incoming {
            // A re-learned address refreshes in place instead of piling up.
            entries.retain(|existing| existing.address != entry.address);
            entries.push(entry);
        }
        while entries.len() > opts.max_entries_per_name {
            entries.remove(0);
        }
        debug!(name = %name, entries = entries.len(), "answer cache updated");
    }

    /// Caches a resolution failure for `name`. Disabled entirely while
    /// `negative_ttl_secs` is zero; an authority SOA minimum tightens but
    /// never extends the configured TTL.
    pub fn insert_negative(
        &self,
        name: Arc<str>,
        cause: ResolveError,
        soa_ttl: Option<u32>,
        opts: &ResolverOpts,
    ) {
        if opts.negative_ttl_secs == 0 {
            return;
        }
        let ttl = soa_ttl
            .map_or(opts.negative_ttl_secs, |soa| soa.min(opts.negative_ttl_secs));
        if ttl == 0 {
            return;
        }
        debug!(name = %name, ttl = ttl, "caching negative answer");
        self.map.insert(
            name,
            NameEntries::Negative {
                cause,
                expires_at: Instant::now() + Duration::from_secs(u64::from(ttl)),
            },
        );
    }

    /// Live entries for `name`. Fully expired names are pruned here.
    pub fn get(&self, name: &str) -> Option<CachedAnswer> {
        let now = Instant::now();
        let answer = {
            let entry = self.map.get(name)?;
            match entry.value() {
                NameEntries::Positive(entries) => {
                    let live: Vec<IpAddr> = entries
                        .iter()
                        .filter(|e| e.expires_at > now)
                        .map(|e| e.address)
                        .collect();
                    if live.is_empty() {
                        None
                    } else {
                        Some(CachedAnswer::Addresses(live))
                    }
                }
                NameEntries::Negative { cause, expires_at } => {
                    if *expires_at > now {
                        Some(CachedAnswer::Negative(cause.clone()))
                    } else {
                        None
                    }
                }
            }
        };
        if answer.is_none() {
            self.map.remove_if(name, |_, entries| match entries {
                NameEntries::Positive(entries) => entries.iter().all(|e| e.expires_at <= now),
                NameEntries::Negative { expires_at, .. } => *expires_at <= now,
            });
        }
        answer
    }

    /// Longest remaining lifetime among the live entries for `name`.
    pub fn remaining_ttl(&self, name: &str) -> Option<Duration> {
        let now = Instant::now();
        let entry = self.map.get(name)?;
        let expires_at = match entry.value() {
            NameEntries::Positive(entries) => {
                entries.iter().map(|e| e.expires_at).filter(|t| *t > now).max()?
            }
            NameEntries::Negative { expires_at, .. } => {
                if *expires_at > now {
                    *expires_at
                } else {
                    return None;
                }
            }
        };
        Some(expires_at - now)
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

    fn opts() -> ResolverOpts {
        ResolverOpts {
            negative_ttl_secs: 30,
            ..ResolverOpts::default()
        }
    }

    fn name() -> Arc<str> {
        Arc::from("example.org.")
    }

    fn v4(last: u8) -> IpAddr {
        IpAddr::V4(std::net::Ipv4Addr::new(192, 0, 2, last))
    }

    fn rec(last: u8, ttl: u32) -> ResolvedRecord {
        ResolvedRecord::new(name(), v4(last), ttl)
    }

    #[test]
    fn positive_round_trip() {
        let cache = AnswerCache::new();
        cache.insert_addresses(name(), &[rec(1, 300), rec(2, 300)], &opts());
        match cache.get("example.org.") {
            Some(CachedAnswer::Addresses(addrs)) => assert_eq!(addrs, vec![v4(1), v4(2)]),
            other => panic!("unexpected cache state: {other:?}"),
        }
        let ttl = cache.remaining_ttl("example.org.").unwrap();
        assert!(ttl <= Duration::from_secs(300) && ttl > Duration::from_secs(298));
    }

    #[test]
    fn zero_ttl_entries_are_not_cached() {
        let cache = AnswerCache::new();
        cache.insert_addresses(name(), &[rec(1, 0)], &opts());
        assert!(cache.get("example.org.").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn ttl_is_clamped_on_insert() {
        let cache = AnswerCache::new();
        let opts = ResolverOpts {
            max_ttl_secs: 60,
            ..ResolverOpts::default()
        };
        cache.insert_addresses(name(), &[rec(1, 86_400)], &opts);
        assert!(cache.remaining_ttl("example.org.").unwrap() <= Duration::from_secs(60));
    }

    #[test]
    fn negative_displaces_positives_and_back() {
        let cache = AnswerCache::new();
        cache.insert_addresses(name(), &[rec(1, 300)], &opts());
        cache.insert_negative(
            name(),
            ResolveError::UnknownHost {
                hostname: name(),
                cause: None,
            },
            None,
            &opts(),
        );
        assert!(matches!(
            cache.get("example.org."),
            Some(CachedAnswer::Negative(_))
        ));

        cache.insert_addresses(name(), &[rec(3, 300)], &opts());
        match cache.get("example.org.") {
            Some(CachedAnswer::Addresses(addrs)) => assert_eq!(addrs, vec![v4(3)]),
            other => panic!("unexpected cache state: {other:?}"),
        }
    }

    #[test]
    fn negative_caching_disabled_by_default() {
        let cache = AnswerCache::new();
        cache.insert_negative(
            name(),
            ResolveError::UnknownHost {
                hostname: name(),
                cause: None,
            },
            None,
            &ResolverOpts::default(),
        );
        assert!(cache.get("example.org.").is_none());
    }

    #[test]
    fn soa_minimum_tightens_negative_ttl() {
        let cache = AnswerCache::new();
        cache.insert_negative(
            name(),
            ResolveError::UnknownHost {
                hostname: name(),
                cause: None,
            },
            Some(5),
            &opts(),
        );
        assert!(cache.remaining_ttl("example.org.").unwrap() <= Duration::from_secs(5));
    }

    #[test]
    fn per_name_cap_evicts_oldest_first() {
        let cache = AnswerCache::new();
        let opts = ResolverOpts {
            max_entries_per_name: 2,
            ..ResolverOpts::default()
        };
        cache.insert_addresses(name(), &[rec(1, 300)], &opts);
        cache.insert_addresses(name(), &[rec(2, 300)], &opts);
        cache.insert_addresses(name(), &[rec(3, 300)], &opts);
        match cache.get("example.org.") {
            Some(CachedAnswer::Addresses(addrs)) => assert_eq!(addrs, vec![v4(2), v4(3)]),
            other => panic!("unexpected cache state: {other:?}"),
        }
    }

    #[test]
    fn reinserted_address_refreshes_instead_of_duplicating() {
        let cache = AnswerCache::new();
        cache.insert_addresses(name(), &[rec(1, 300)], &opts());
        cache.insert_addresses(name(), &[rec(1, 300)], &opts());
        match cache.get("example.org.") {
            Some(CachedAnswer::Addresses(addrs)) => assert_eq!(addrs, vec![v4(1)]),
            other => panic!("unexpected cache state: {other:?}"),
        }
    }

    #[test]
    fn expired_entries_are_invisible() {
        let cache = AnswerCache::new();
        cache.insert_addresses(name(), &[rec(1, 1)], &opts());
        std::thread::sleep(Duration::from_millis(1_100));
        assert!(cache.get("example.org.").is_none());
        // The stale name was pruned by the failed lookup.
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = AnswerCache::new();
        cache.insert_addresses(name(), &[rec(1, 300)], &opts());
        cache.clear();
        assert!(cache.is_empty());
    }
}
