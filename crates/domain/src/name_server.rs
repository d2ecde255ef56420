use super::address_family::AddressFamily;
use smallvec::SmallVec;
use std::net::SocketAddr;

/// An ordered, endlessly cycling stream of candidate name servers.
///
/// The resolve loop counts queries, not positions, so `next()` simply
/// wraps around. Construction sorts candidates so servers reachable over
/// the resolver's preferred address family come first; the sort is stable,
/// preserving the provider's order within each family.
#[derive(Debug, Clone)]
pub struct ServerStream {
    servers: SmallVec<[SocketAddr; 4]>,
    pos: usize,
}

impl ServerStream {
    /// Keeps the given order as-is.
    pub fn sequential(servers: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            servers: servers.into_iter().collect(),
            pos: 0,
        }
    }

    /// Stable-sorts the candidates so `preferred`-family servers lead.
    pub fn preferring(
        servers: impl IntoIterator<Item = SocketAddr>,
        preferred: AddressFamily,
    ) -> Self {
        let mut servers: SmallVec<[SocketAddr; 4]> = servers.into_iter().collect();
        servers.sort_by_key(|addr| !preferred.matches(&addr.ip()));
        Self { servers, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn size(&self) -> usize {
        self.servers.len()
    }

    pub fn next(&mut self) -> Option<SocketAddr> {
        if self.servers.is_empty() {
            return None;
        }
        let server = self.servers[self.pos % self.servers.len()];
        self.pos += 1;
        Some(server)
    }

    /// The candidate list in stream order, independent of the cursor.
    pub fn snapshot(&self) -> &[SocketAddr] {
        &self.servers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn cycles_indefinitely() {
        let mut stream = ServerStream::sequential([addr("192.0.2.1:53"), addr("192.0.2.2:53")]);
        assert_eq!(stream.next(), Some(addr("192.0.2.1:53")));
        assert_eq!(stream.next(), Some(addr("192.0.2.2:53")));
        assert_eq!(stream.next(), Some(addr("192.0.2.1:53")));
    }

    #[test]
    fn preferred_family_sorts_first_stably() {
        let mut stream = ServerStream::preferring(
            [
                addr("192.0.2.1:53"),
                addr("[2001:db8::1]:53"),
                addr("192.0.2.2:53"),
                addr("[2001:db8::2]:53"),
            ],
            AddressFamily::Ipv6,
        );
        assert_eq!(stream.next(), Some(addr("[2001:db8::1]:53")));
        assert_eq!(stream.next(), Some(addr("[2001:db8::2]:53")));
        assert_eq!(stream.next(), Some(addr("192.0.2.1:53")));
        assert_eq!(stream.next(), Some(addr("192.0.2.2:53")));
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let mut stream = ServerStream::sequential([]);
        assert!(stream.next().is_none());
        assert!(stream.is_empty());
    }
}
