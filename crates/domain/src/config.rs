use super::address_family::ResolvedAddressTypes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Resolver behavior knobs.
///
/// Every field has a serde default so partial config files work; the
/// builder applies the same defaults for programmatic construction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverOpts {
    /// Per-query timeout in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Budget across all queries issued on behalf of one resolve.
    #[serde(default = "default_max_queries_per_resolve")]
    pub max_queries_per_resolve: u16,

    /// Advertised EDNS0 receive-buffer size; also the UDP receive cap.
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: u16,

    #[serde(default)]
    pub resolved_address_types: ResolvedAddressTypes,

    /// Sets the RD bit on outgoing queries.
    #[serde(default = "default_true")]
    pub recursion_desired: bool,

    /// Emit the EDNS0 OPT pseudo-record.
    #[serde(default = "default_true")]
    pub opt_resource_enabled: bool,

    #[serde(default)]
    pub search_domains: Vec<Arc<str>>,

    #[serde(default = "default_ndots")]
    pub ndots: usize,

    /// Punycode-decode names found in responses.
    #[serde(default = "default_true")]
    pub decode_idn: bool,

    /// Settle the user future as soon as the preferred family answers,
    /// letting the secondary query finish in the background.
    #[serde(default)]
    pub complete_once_preferred_resolved: bool,

    /// Lower clamp applied to answer TTLs at cache-insert time.
    #[serde(default)]
    pub min_ttl_secs: u32,

    /// Upper clamp applied to answer TTLs at cache-insert time.
    #[serde(default = "default_max_ttl_secs")]
    pub max_ttl_secs: u32,

    /// TTL for cached negative answers. Zero disables negative caching.
    #[serde(default)]
    pub negative_ttl_secs: u32,

    /// Per-name cap on positive answer-cache entries; oldest evicted.
    #[serde(default = "default_max_entries_per_name")]
    pub max_entries_per_name: usize,

    #[serde(default = "default_max_redirects")]
    pub max_cname_redirects: u8,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: u8,
}

impl Default for ResolverOpts {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            max_queries_per_resolve: default_max_queries_per_resolve(),
            max_payload_size: default_max_payload_size(),
            resolved_address_types: ResolvedAddressTypes::default(),
            recursion_desired: true,
            opt_resource_enabled: true,
            search_domains: Vec::new(),
            ndots: default_ndots(),
            decode_idn: true,
            complete_once_preferred_resolved: false,
            min_ttl_secs: 0,
            max_ttl_secs: default_max_ttl_secs(),
            negative_ttl_secs: 0,
            max_entries_per_name: default_max_entries_per_name(),
            max_cname_redirects: default_max_redirects(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl ResolverOpts {
    /// TTL clamp for positive answers.
    pub fn clamp_ttl(&self, ttl: u32) -> u32 {
        ttl.clamp(self.min_ttl_secs, self.max_ttl_secs)
    }
}

fn default_query_timeout_ms() -> u64 {
    5_000
}

fn default_max_queries_per_resolve() -> u16 {
    8
}

fn default_max_payload_size() -> u16 {
    4_096
}

fn default_ndots() -> usize {
    1
}

fn default_max_ttl_secs() -> u32 {
    u32::MAX
}

fn default_max_entries_per_name() -> usize {
    64
}

fn default_max_redirects() -> u8 {
    16
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = ResolverOpts::default();
        assert_eq!(opts.query_timeout_ms, 5_000);
        assert_eq!(opts.max_queries_per_resolve, 8);
        assert_eq!(opts.max_payload_size, 4_096);
        assert!(opts.recursion_desired);
        assert!(opts.opt_resource_enabled);
        assert_eq!(opts.ndots, 1);
        assert_eq!(opts.negative_ttl_secs, 0);
        assert_eq!(opts.max_cname_redirects, 16);
    }

    #[test]
    fn ttl_clamping() {
        let opts = ResolverOpts {
            min_ttl_secs: 60,
            max_ttl_secs: 3_600,
            ..ResolverOpts::default()
        };
        assert_eq!(opts.clamp_ttl(10), 60);
        assert_eq!(opts.clamp_ttl(600), 600);
        assert_eq!(opts.clamp_ttl(100_000), 3_600);
    }
}
