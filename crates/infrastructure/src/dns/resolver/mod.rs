//! The resolver façade.
//!
//! Owns the shared transport, the three caches and the configured
//! policy; exposes `resolve` / `resolve_all` for addresses,
//! `resolve_all_records` for arbitrary questions, and raw one-shot
//! `query` / `query_server`. Entry points short-circuit in order: empty
//! name, IP literal, hosts overlay, caches, network.

pub mod builder;

pub use builder::DnsResolverBuilder;

use crate::dns::cache::{AnswerCache, AuthoritativeNsCache, CachedAnswer, CnameCache};
use crate::dns::envelope::ResponseEnvelope;
use crate::dns::query::QueryContext;
use crate::dns::resolve::{AddressResolveContext, QueryBudget, QuestionOutcome, ResolveEngine};
use crate::dns::transport::DatagramTransport;
use async_trait::async_trait;
use hearth_dns_application::{
    AddressResolver, HostsFileResolver, NameServerStreamProvider, QueryLifecycleObserverFactory,
};
use hearth_dns_domain::{
    normalize_hostname, parse_ip_literal, AddressFamily, DnsQuestion, RecordType, ResolveError,
    ResolverOpts, ServerStream,
};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{Name, RData, Record};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// TTL stamped onto records synthesized from the hosts overlay, which
/// has no reload mechanism.
const HOSTS_SYNTHETIC_TTL: u32 = 86_400;

pub(crate) struct ResolverShared {
    pub opts: ResolverOpts,
    pub transport: DatagramTransport,
    pub answer_cache: AnswerCache,
    pub cname_cache: CnameCache,
    pub authoritative_cache: AuthoritativeNsCache,
    pub hosts: Arc<dyn HostsFileResolver>,
    pub provider: Arc<dyn NameServerStreamProvider>,
    pub observers: Arc<dyn QueryLifecycleObserverFactory>,
    pub tcp_fallback: bool,
    /// Port queried on servers learned through referrals; 53 outside of
    /// tests.
    pub redirect_port: u16,
    closed: AtomicBool,
    /// Round-robin stream backing `query()` when no server is named.
    query_stream: Mutex<Option<ServerStream>>,
}

/// A recursive-capable DNS stub resolver.
///
/// Cloning is cheap; all clones share one socket, one in-flight table
/// and one set of caches.
#[derive(Clone)]
pub struct DnsResolver {
    shared: Arc<ResolverShared>,
}

impl DnsResolver {
    pub fn builder() -> DnsResolverBuilder {
        DnsResolverBuilder::new()
    }

    pub(crate) fn from_shared(shared: Arc<ResolverShared>) -> Self {
        Self { shared }
    }

    pub fn opts(&self) -> &ResolverOpts {
        &self.shared.opts
    }

    pub fn answer_cache(&self) -> &AnswerCache {
        &self.shared.answer_cache
    }

    pub fn cname_cache(&self) -> &CnameCache {
        &self.shared.cname_cache
    }

    pub fn authoritative_ns_cache(&self) -> &AuthoritativeNsCache {
        &self.shared.authoritative_cache
    }

    /// First address in the preferred family.
    pub async fn resolve(&self, name: &str) -> Result<IpAddr, ResolveError> {
        self.resolve_with_additionals(name, &[]).await
    }

    pub async fn resolve_with_additionals(
        &self,
        name: &str,
        additionals: &[Record],
    ) -> Result<IpAddr, ResolveError> {
        let addresses = self.resolve_all_with_additionals(name, additionals).await?;
        addresses
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::UnknownHost {
                hostname: Arc::from(name),
                cause: None,
            })
    }

    /// Every address in every enabled family, family preference order
    /// first, answer order within a family.
    pub async fn resolve_all(&self, name: &str) -> Result<Vec<IpAddr>, ResolveError> {
        self.resolve_all_with_additionals(name, &[]).await
    }

    pub async fn resolve_all_with_additionals(
        &self,
        name: &str,
        additionals: &[Record],
    ) -> Result<Vec<IpAddr>, ResolveError> {
        self.ensure_open()?;
        let opts = &self.shared.opts;

        if name.trim().is_empty() {
            // An empty host behaves like a loopback lookup.
            return Ok(vec![opts.resolved_address_types.preferred().loopback()]);
        }
        if let Some(literal) = parse_ip_literal(name) {
            return Ok(vec![literal]);
        }

        let hostname = normalize_hostname(name)?;

        let hosts_hit = self
            .shared
            .hosts
            .lookup(&hostname, opts.resolved_address_types.families());
        if !hosts_hit.is_empty() {
            debug!(hostname = %hostname, addresses = hosts_hit.len(), "hosts overlay hit");
            return Ok(hosts_hit);
        }

        if additionals.is_empty() {
            if let Some(cached) = self.cached_lookup(&hostname)? {
                return Ok(cached);
            }
        }

        let context = AddressResolveContext::new(
            Arc::clone(&self.shared),
            Arc::from(name.trim()),
            hostname,
            additionals.to_vec(),
        );
        context.resolve_all().await
    }

    /// Cache fast path: chase alias edges, then read the answer cache at
    /// the terminal name. A cached negative surfaces as the stored
    /// failure; `Ok(None)` means the network path must run.
    fn cached_lookup(&self, hostname: &str) -> Result<Option<Vec<IpAddr>>, ResolveError> {
        let shared = &self.shared;
        let mut cursor: Arc<str> = Arc::from(hostname);
        let mut hops = 0u8;
        while let Some(target) = shared.cname_cache.get(&cursor) {
            hops += 1;
            if hops > shared.opts.max_cname_redirects {
                return Err(ResolveError::CnameLoop {
                    max: shared.opts.max_cname_redirects,
                });
            }
            cursor = target;
        }

        match shared.answer_cache.get(&cursor) {
            Some(CachedAnswer::Negative(cause)) => Err(cause),
            Some(CachedAnswer::Addresses(addresses)) => {
                let mut ordered = Vec::with_capacity(addresses.len());
                for family in shared.opts.resolved_address_types.families() {
                    ordered.extend(addresses.iter().filter(|a| family.matches(a)).copied());
                }
                if ordered.is_empty() {
                    // Cached entries exist but none in an enabled family.
                    Ok(None)
                } else {
                    debug!(hostname = %hostname, terminal = %cursor, "resolved from cache");
                    Ok(Some(ordered))
                }
            }
            None => Ok(None),
        }
    }

    /// Resolves the records matched by an arbitrary question, following
    /// referrals and CNAMEs. For A/AAAA questions the hosts overlay is
    /// consulted first and yields synthetic records; other question
    /// types go straight to the name servers. No cache participates in
    /// this path.
    pub async fn resolve_all_records(
        &self,
        question: &DnsQuestion,
        additionals: &[Record],
    ) -> Result<Vec<Record>, ResolveError> {
        self.ensure_open()?;
        let shared = &self.shared;

        if question.record_type().is_address() {
            let family = match question.record_type() {
                RecordType::AAAA => AddressFamily::Ipv6,
                _ => AddressFamily::Ipv4,
            };
            let overlay = shared.hosts.lookup(question.name(), &[family]);
            if !overlay.is_empty() {
                return synthesize_hosts_records(question.name(), &overlay);
            }
        }

        let mut budget = QueryBudget::new(shared.opts.max_queries_per_resolve);
        let mut redirect_depth = 0u8;
        let mut hops = 0u8;
        let mut current = question.clone();

        loop {
            let mut stream = shared.provider.name_server_stream(current.name());
            let engine = ResolveEngine::new(&self.shared);
            match engine
                .resolve_question(&current, additionals, &mut stream, &mut budget, &mut redirect_depth)
                .await?
            {
                QuestionOutcome::Answered { records, .. } => {
                    return Ok(records);
                }
                QuestionOutcome::Cname { edges, tail } => {
                    hops = hops.saturating_add(edges.len().max(1) as u8);
                    if hops > shared.opts.max_cname_redirects {
                        return Err(ResolveError::CnameLoop {
                            max: shared.opts.max_cname_redirects,
                        });
                    }
                    current = DnsQuestion::from_normalized(tail, current.record_type());
                }
                QuestionOutcome::NoAnswer { .. } => {
                    return Err(ResolveError::UnknownHost {
                        hostname: current.name_arc(),
                        cause: None,
                    });
                }
            }
        }
    }

    /// One-shot query against a round-robin-chosen name server,
    /// bypassing every cache and all CNAME handling.
    pub async fn query(&self, question: &DnsQuestion) -> Result<ResponseEnvelope, ResolveError> {
        let server = self.next_query_server()?;
        self.query_server(server, question, &[]).await
    }

    /// One-shot query against a specific server.
    pub async fn query_server(
        &self,
        server: SocketAddr,
        question: &DnsQuestion,
        additionals: &[Record],
    ) -> Result<ResponseEnvelope, ResolveError> {
        self.ensure_open()?;
        let shared = &self.shared;
        let observer = shared.observers.new_observer(question.name());
        let context = QueryContext::new(
            &shared.transport,
            &shared.opts,
            server,
            question,
            additionals,
            observer,
            shared.tcp_fallback,
        );
        context.run(1).await
    }

    fn next_query_server(&self) -> Result<SocketAddr, ResolveError> {
        let mut guard = self
            .shared
            .query_stream
            .lock()
            .expect("query stream lock");
        let stream = guard
            .get_or_insert_with(|| self.shared.provider.name_server_stream("."));
        stream.next().ok_or(ResolveError::NoServers)
    }

    /// Closes the transport and clears every cache. Every later call
    /// fails with `ResolverClosed`; in-flight queries observe a closed
    /// settlement channel.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.transport.shutdown();
        self.shared.answer_cache.clear();
        self.shared.cname_cache.clear();
        self.shared.authoritative_cache.clear();
        info!("resolver closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ResolveError> {
        if self.is_closed() {
            return Err(ResolveError::ResolverClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl AddressResolver for DnsResolver {
    async fn resolve(&self, name: &str) -> Result<IpAddr, ResolveError> {
        DnsResolver::resolve(self, name).await
    }

    async fn resolve_all(&self, name: &str) -> Result<Vec<IpAddr>, ResolveError> {
        DnsResolver::resolve_all(self, name).await
    }
}

impl ResolverShared {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        opts: ResolverOpts,
        transport: DatagramTransport,
        hosts: Arc<dyn HostsFileResolver>,
        provider: Arc<dyn NameServerStreamProvider>,
        observers: Arc<dyn QueryLifecycleObserverFactory>,
        tcp_fallback: bool,
        redirect_port: u16,
    ) -> Self {
        Self {
            opts,
            transport,
            answer_cache: AnswerCache::new(),
            cname_cache: CnameCache::new(),
            authoritative_cache: AuthoritativeNsCache::new(),
            hosts,
            provider,
            observers,
            tcp_fallback,
            redirect_port,
            closed: AtomicBool::new(false),
            query_stream: Mutex::new(None),
        }
    }
}

fn synthesize_hosts_records(name: &str, addresses: &[IpAddr]) -> Result<Vec<Record>, ResolveError> {
    let owner = Name::from_utf8(name)
        .map_err(|e| ResolveError::InvalidHostname(format!("{name}: {e}").into()))?;
    Ok(addresses
        .iter()
        .map(|address| match address {
            IpAddr::V4(v4) => {
                Record::from_rdata(owner.clone(), HOSTS_SYNTHETIC_TTL, RData::A(A(*v4)))
            }
            IpAddr::V6(v6) => {
                Record::from_rdata(owner.clone(), HOSTS_SYNTHETIC_TTL, RData::AAAA(AAAA(*v6)))
            }
        })
        .collect())
}
