use super::record_type::RecordType;
use std::net::IpAddr;
use std::sync::Arc;

/// An address record as seen by the resolver's callers: the owner name it
/// resolved from, the concrete address and the TTL the authority gave it.
///
/// Non-address record data stays in the codec's own record type; this is
/// the domain-level shape used by the hosts overlay and the answer cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    pub name: Arc<str>,
    pub record_type: RecordType,
    pub address: IpAddr,
    pub ttl: u32,
}

impl ResolvedRecord {
    pub fn new(name: Arc<str>, address: IpAddr, ttl: u32) -> Self {
        let record_type = match address {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::AAAA,
        };
        Self {
            name,
            record_type,
            address,
            ttl,
        }
    }
}
