//! Resolver construction.

use super::{DnsResolver, ResolverShared};
use crate::dns::hosts::HostsFileEntries;
use crate::dns::transport::DatagramTransport;
use hearth_dns_application::{
    HostsFileResolver, NameServerStreamProvider, NoopLifecycleObserverFactory,
    QueryLifecycleObserverFactory, StaticNameServerProvider,
};
use hearth_dns_domain::{ResolveError, ResolvedAddressTypes, ResolverOpts};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Builds a [`DnsResolver`].
///
/// Name servers come from either a static list or an injected stream
/// provider; every policy knob of [`ResolverOpts`] has a dedicated
/// setter, and `with_opts` swaps the whole block at once.
pub struct DnsResolverBuilder {
    opts: ResolverOpts,
    servers: Vec<SocketAddr>,
    provider: Option<Arc<dyn NameServerStreamProvider>>,
    hosts: Option<Arc<dyn HostsFileResolver>>,
    observers: Option<Arc<dyn QueryLifecycleObserverFactory>>,
    tcp_fallback: bool,
    bind_addr: Option<SocketAddr>,
    redirect_port: u16,
}

impl Default for DnsResolverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsResolverBuilder {
    pub fn new() -> Self {
        Self {
            opts: ResolverOpts::default(),
            servers: Vec::new(),
            provider: None,
            hosts: None,
            observers: None,
            tcp_fallback: false,
            bind_addr: None,
            redirect_port: 53,
        }
    }

    /// Replaces the whole option block.
    pub fn with_opts(mut self, opts: ResolverOpts) -> Self {
        self.opts = opts;
        self
    }

    /// The name servers asked in order. Ignored when a stream provider
    /// is injected.
    pub fn name_servers(mut self, servers: Vec<SocketAddr>) -> Self {
        self.servers = servers;
        self
    }

    pub fn name_server_provider(mut self, provider: Arc<dyn NameServerStreamProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn hosts_file(mut self, hosts: Arc<dyn HostsFileResolver>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    pub fn lifecycle_observer_factory(
        mut self,
        factory: Arc<dyn QueryLifecycleObserverFactory>,
    ) -> Self {
        self.observers = Some(factory);
        self
    }

    /// Enables reissuing truncated UDP answers over TCP.
    pub fn tcp_fallback(mut self, enabled: bool) -> Self {
        self.tcp_fallback = enabled;
        self
    }

    /// Local address for the UDP socket; an ephemeral port on the
    /// unspecified address by default.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Port used when contacting servers learned through referrals.
    /// Defaults to 53; overridable so tests can point delegations at
    /// mock servers on ephemeral ports.
    pub fn redirect_server_port(mut self, port: u16) -> Self {
        self.redirect_port = port;
        self
    }

    pub fn query_timeout_ms(mut self, millis: u64) -> Self {
        self.opts.query_timeout_ms = millis;
        self
    }

    pub fn max_queries_per_resolve(mut self, max: u16) -> Self {
        self.opts.max_queries_per_resolve = max;
        self
    }

    pub fn max_payload_size(mut self, size: u16) -> Self {
        self.opts.max_payload_size = size;
        self
    }

    pub fn resolved_address_types(mut self, types: ResolvedAddressTypes) -> Self {
        self.opts.resolved_address_types = types;
        self
    }

    pub fn recursion_desired(mut self, desired: bool) -> Self {
        self.opts.recursion_desired = desired;
        self
    }

    pub fn opt_resource_enabled(mut self, enabled: bool) -> Self {
        self.opts.opt_resource_enabled = enabled;
        self
    }

    pub fn search_domains(mut self, domains: Vec<Arc<str>>) -> Self {
        self.opts.search_domains = domains;
        self
    }

    pub fn ndots(mut self, ndots: usize) -> Self {
        self.opts.ndots = ndots;
        self
    }

    pub fn decode_idn(mut self, decode: bool) -> Self {
        self.opts.decode_idn = decode;
        self
    }

    pub fn complete_once_preferred_resolved(mut self, enabled: bool) -> Self {
        self.opts.complete_once_preferred_resolved = enabled;
        self
    }

    pub fn ttl_bounds(mut self, min_secs: u32, max_secs: u32) -> Self {
        self.opts.min_ttl_secs = min_secs;
        self.opts.max_ttl_secs = max_secs;
        self
    }

    pub fn negative_ttl_secs(mut self, secs: u32) -> Self {
        self.opts.negative_ttl_secs = secs;
        self
    }

    /// Binds the socket, starts the receive loop and assembles the
    /// resolver.
    pub async fn build(self) -> Result<DnsResolver, ResolveError> {
        let provider: Arc<dyn NameServerStreamProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(StaticNameServerProvider::new(self.servers.clone())?),
        };

        let bind_addr = self.bind_addr.unwrap_or_else(|| {
            if self.servers.iter().any(|s| s.is_ipv6()) {
                "[::]:0".parse().expect("valid bind address")
            } else {
                "0.0.0.0:0".parse().expect("valid bind address")
            }
        });

        let transport = DatagramTransport::bind(bind_addr, self.opts.max_payload_size).await?;

        let hosts = self
            .hosts
            .unwrap_or_else(|| Arc::new(HostsFileEntries::load_system()));
        let observers = self
            .observers
            .unwrap_or_else(|| Arc::new(NoopLifecycleObserverFactory));

        info!(
            address_types = ?self.opts.resolved_address_types,
            timeout_ms = self.opts.query_timeout_ms,
            max_queries = self.opts.max_queries_per_resolve,
            tcp_fallback = self.tcp_fallback,
            "building DNS resolver"
        );

        let shared = ResolverShared::new(
            self.opts,
            transport,
            hosts,
            provider,
            observers,
            self.tcp_fallback,
            self.redirect_port,
        );
        Ok(DnsResolver::from_shared(Arc::new(shared)))
    }
}
