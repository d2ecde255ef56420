use async_trait::async_trait;
use hearth_dns_domain::ResolveError;
use std::net::IpAddr;

/// Port for anything that can turn a host name into addresses.
///
/// The concrete engine in the infrastructure layer implements this;
/// callers that only need name-to-address translation depend on the port
/// so tests can substitute a canned resolver.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// First address in the preferred family.
    async fn resolve(&self, name: &str) -> Result<IpAddr, ResolveError>;

    /// Every address in every enabled family, preference order first.
    async fn resolve_all(&self, name: &str) -> Result<Vec<IpAddr>, ResolveError>;
}
