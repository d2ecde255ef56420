use hearth_dns_domain::AddressFamily;
use std::net::IpAddr;

/// Port for the local hosts-file overlay consulted before any cache or
/// network work.
///
/// `lookup` returns every address mapped to `name` whose family appears
/// in `families`, in `families` order. An implementation that only ever
/// hands back one address is simply this contract capped at length one.
///
/// Lookups are synchronous: hosts data lives in memory, and the resolve
/// path must not await a file read per query.
pub trait HostsFileResolver: Send + Sync {
    fn lookup(&self, name: &str, families: &[AddressFamily]) -> Vec<IpAddr>;
}

/// An overlay that maps nothing; useful to switch the hosts file off.
#[derive(Debug, Default)]
pub struct NoHosts;

impl HostsFileResolver for NoHosts {
    fn lookup(&self, _name: &str, _families: &[AddressFamily]) -> Vec<IpAddr> {
        Vec::new()
    }
}
