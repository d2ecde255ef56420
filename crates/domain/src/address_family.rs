use super::record_type::RecordType;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Internet protocol family of a resolved address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn matches(self, addr: &IpAddr) -> bool {
        match self {
            AddressFamily::Ipv4 => addr.is_ipv4(),
            AddressFamily::Ipv6 => addr.is_ipv6(),
        }
    }

    pub fn loopback(self) -> IpAddr {
        match self {
            AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::LOCALHOST),
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::LOCALHOST),
        }
    }

    pub fn record_type(self) -> RecordType {
        match self {
            AddressFamily::Ipv4 => RecordType::A,
            AddressFamily::Ipv6 => RecordType::AAAA,
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

/// Which address families a resolve asks for, and in which order the
/// answers count.
///
/// The variant picks both the record types queried and the family order
/// used when filtering and interleaving results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedAddressTypes {
    Ipv4Only,
    #[default]
    Ipv4Preferred,
    Ipv6Only,
    Ipv6Preferred,
}

impl ResolvedAddressTypes {
    /// Record types to query, preferred first.
    pub fn record_types(self) -> &'static [RecordType] {
        match self {
            ResolvedAddressTypes::Ipv4Only => &[RecordType::A],
            ResolvedAddressTypes::Ipv4Preferred => &[RecordType::A, RecordType::AAAA],
            ResolvedAddressTypes::Ipv6Only => &[RecordType::AAAA],
            ResolvedAddressTypes::Ipv6Preferred => &[RecordType::AAAA, RecordType::A],
        }
    }

    /// Families whose answers are returned, preference order.
    pub fn families(self) -> &'static [AddressFamily] {
        match self {
            ResolvedAddressTypes::Ipv4Only => &[AddressFamily::Ipv4],
            ResolvedAddressTypes::Ipv4Preferred => {
                &[AddressFamily::Ipv4, AddressFamily::Ipv6]
            }
            ResolvedAddressTypes::Ipv6Only => &[AddressFamily::Ipv6],
            ResolvedAddressTypes::Ipv6Preferred => {
                &[AddressFamily::Ipv6, AddressFamily::Ipv4]
            }
        }
    }

    pub fn preferred(self) -> AddressFamily {
        self.families()[0]
    }

    pub fn supports(self, family: AddressFamily) -> bool {
        self.families().contains(&family)
    }
}
