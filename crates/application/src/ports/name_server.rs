use hearth_dns_domain::{ResolveError, ServerStream};
use std::net::SocketAddr;

/// Port answering "which name servers should this hostname be asked of,
/// and in what order".
///
/// The engine calls this once per resolve with the effective hostname, so
/// an implementation can route different zones to different servers.
pub trait NameServerStreamProvider: Send + Sync {
    fn name_server_stream(&self, hostname: &str) -> ServerStream;
}

/// Provider over a fixed server list, handed to every hostname alike.
#[derive(Debug, Clone)]
pub struct StaticNameServerProvider {
    servers: Vec<SocketAddr>,
}

impl StaticNameServerProvider {
    pub fn new(servers: Vec<SocketAddr>) -> Result<Self, ResolveError> {
        if servers.is_empty() {
            return Err(ResolveError::NoServers);
        }
        Ok(Self { servers })
    }

    pub fn servers(&self) -> &[SocketAddr] {
        &self.servers
    }
}

impl NameServerStreamProvider for StaticNameServerProvider {
    fn name_server_stream(&self, _hostname: &str) -> ServerStream {
        ServerStream::sequential(self.servers.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_server_list() {
        assert!(StaticNameServerProvider::new(Vec::new()).is_err());
    }

    #[test]
    fn same_stream_for_every_hostname() {
        let provider =
            StaticNameServerProvider::new(vec!["192.0.2.1:53".parse().unwrap()]).unwrap();
        let mut a = provider.name_server_stream("a.example.org.");
        let mut b = provider.name_server_stream("b.example.org.");
        assert_eq!(a.next(), b.next());
    }
}
