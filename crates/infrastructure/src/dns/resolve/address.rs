//! Address resolution on top of the record loop.
//!
//! Adds the A/AAAA-specific policy: search-domain expansion, CNAME
//! chasing through the alias cache, dual-stack ordering with optional
//! early completion on the preferred family, family filtering, and the
//! cache writes (positive per terminal owner, negative for the original
//! hostname once every expansion is exhausted).

use super::engine::{QueryBudget, QuestionOutcome, ResolveEngine};
use crate::dns::cache::CachedAnswer;
use crate::dns::message::ResponseParser;
use crate::dns::resolver::ResolverShared;
use hearth_dns_domain::{
    AddressFamily, DnsQuestion, RecordType, ResolveError, SearchNameIter,
};
use hickory_proto::rr::Record;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// Outcome of resolving one effective (post-expansion) name.
struct CandidateOutcome {
    addresses: Vec<IpAddr>,
    soa_ttl: Option<u32>,
}

enum FamilyOutcome {
    Addresses(Vec<IpAddr>),
    None { nxdomain: bool, soa_ttl: Option<u32> },
}

pub struct AddressResolveContext {
    shared: Arc<ResolverShared>,
    /// The name as the caller wrote it; absoluteness (a trailing dot)
    /// decides whether search domains apply at all.
    query_name: Arc<str>,
    /// Normalized form; the key for the negative cache and the final
    /// `UnknownHost`.
    hostname: Arc<str>,
    additionals: Vec<Record>,
}

impl AddressResolveContext {
    pub fn new(
        shared: Arc<ResolverShared>,
        query_name: Arc<str>,
        hostname: Arc<str>,
        additionals: Vec<Record>,
    ) -> Self {
        Self {
            shared,
            query_name,
            hostname,
            additionals,
        }
    }

    /// Resolves every enabled family for the hostname, walking search
    /// expansions until one yields addresses. Exhausting them all caches
    /// and returns `UnknownHost`.
    pub async fn resolve_all(self) -> Result<Vec<IpAddr>, ResolveError> {
        let opts = &self.shared.opts;
        let mut budget = QueryBudget::new(opts.max_queries_per_resolve);
        let mut redirect_depth = 0u8;
        let mut last_soa_ttl = None;

        let expansions = SearchNameIter::new(&self.query_name, &opts.search_domains, opts.ndots);
        for candidate in expansions {
            // An expansion that found nothing comes back as empty
            // addresses; budget exhaustion and loop errors are their own
            // user-visible failures and propagate as-is.
            let outcome = self
                .resolve_candidate(&candidate, &mut budget, &mut redirect_depth)
                .await?;
            if !outcome.addresses.is_empty() {
                return Ok(outcome.addresses);
            }
            last_soa_ttl = outcome.soa_ttl.or(last_soa_ttl);
        }

        let failure = ResolveError::UnknownHost {
            hostname: Arc::clone(&self.hostname),
            cause: None,
        };
        if self.additionals.is_empty() {
            self.shared.answer_cache.insert_negative(
                Arc::clone(&self.hostname),
                failure.clone(),
                last_soa_ttl,
                opts,
            );
        }
        Err(failure)
    }

    /// One effective name, every enabled family.
    async fn resolve_candidate(
        &self,
        name: &Arc<str>,
        budget: &mut QueryBudget,
        redirect_depth: &mut u8,
    ) -> Result<CandidateOutcome, ResolveError> {
        let opts = &self.shared.opts;
        let record_types = opts.resolved_address_types.record_types();

        let preferred = self
            .resolve_family(name, record_types[0], budget, redirect_depth)
            .await?;

        let mut per_type: Vec<Vec<IpAddr>> = vec![Vec::new(); record_types.len()];
        let mut soa_ttl = None;
        match preferred {
            FamilyOutcome::None { nxdomain: true, soa_ttl } => {
                // The name does not exist; asking for the other family
                // would burn budget on the same NXDOMAIN.
                return Ok(CandidateOutcome {
                    addresses: Vec::new(),
                    soa_ttl,
                });
            }
            FamilyOutcome::Addresses(addresses) => {
                if opts.complete_once_preferred_resolved
                    && record_types.len() > 1
                    && !addresses.is_empty()
                {
                    self.spawn_secondary(name, record_types[1], budget.remaining());
                    return Ok(CandidateOutcome {
                        addresses,
                        soa_ttl: None,
                    });
                }
                per_type[0] = addresses;
            }
            FamilyOutcome::None { soa_ttl: ttl, .. } => soa_ttl = ttl,
        }

        for (slot, record_type) in record_types.iter().enumerate().skip(1) {
            match self
                .resolve_family(name, *record_type, budget, redirect_depth)
                .await
            {
                Ok(FamilyOutcome::Addresses(addresses)) => per_type[slot] = addresses,
                Ok(FamilyOutcome::None { soa_ttl: ttl, .. }) => soa_ttl = ttl.or(soa_ttl),
                // The preferred family already answered: budget running
                // out on the secondary must not fail the resolve.
                Err(ResolveError::SearchBudgetExceeded { .. }) if !per_type[0].is_empty() => {}
                Err(e) => return Err(e),
            }
        }

        // Family preference order, answer order within a family.
        let addresses: Vec<IpAddr> = per_type.into_iter().flatten().collect();
        Ok(CandidateOutcome { addresses, soa_ttl })
    }

    /// One name, one record type, CNAME chase included.
    async fn resolve_family(
        &self,
        name: &Arc<str>,
        record_type: RecordType,
        budget: &mut QueryBudget,
        redirect_depth: &mut u8,
    ) -> Result<FamilyOutcome, ResolveError> {
        let shared = &self.shared;
        let opts = &shared.opts;
        let family = match record_type {
            RecordType::AAAA => AddressFamily::Ipv6,
            _ => AddressFamily::Ipv4,
        };

        let mut cursor = Arc::clone(name);
        let mut hops = 0u8;

        // Warm hops: follow already-known alias edges before any query.
        while let Some(target) = shared.cname_cache.get(&cursor) {
            hops += 1;
            if hops > opts.max_cname_redirects {
                return Err(ResolveError::CnameLoop {
                    max: opts.max_cname_redirects,
                });
            }
            debug!(alias = %cursor, target = %target, "alias cache hop");
            cursor = target;
        }

        loop {
            if self.additionals.is_empty() {
                match shared.answer_cache.get(&cursor) {
                    Some(CachedAnswer::Addresses(addresses)) => {
                        let of_family: Vec<IpAddr> = addresses
                            .into_iter()
                            .filter(|a| family.matches(a))
                            .collect();
                        if !of_family.is_empty() {
                            debug!(name = %cursor, family = ?family, "answer cache hit");
                            return Ok(FamilyOutcome::Addresses(of_family));
                        }
                    }
                    Some(CachedAnswer::Negative(_)) => {
                        debug!(name = %cursor, "negative cache hit");
                        return Ok(FamilyOutcome::None {
                            nxdomain: true,
                            soa_ttl: None,
                        });
                    }
                    None => {}
                }
            }

            let question = DnsQuestion::from_normalized(Arc::clone(&cursor), record_type);
            let mut stream = shared.provider.name_server_stream(&cursor);
            let engine = ResolveEngine::new(shared);
            let outcome = engine
                .resolve_question(&question, &self.additionals, &mut stream, budget, redirect_depth)
                .await?;

            match outcome {
                QuestionOutcome::Answered { records, edges } => {
                    let terminal = edges
                        .last()
                        .map(|edge| Arc::clone(&edge.target))
                        .unwrap_or_else(|| Arc::clone(&cursor));
                    for edge in edges {
                        shared.cname_cache.insert(edge.alias, edge.target, edge.ttl, opts);
                    }
                    let resolved = ResponseParser::addresses(&records);
                    if self.additionals.is_empty() {
                        shared
                            .answer_cache
                            .insert_addresses(terminal, &resolved, opts);
                    }
                    return Ok(FamilyOutcome::Addresses(
                        resolved.into_iter().map(|r| r.address).collect(),
                    ));
                }
                QuestionOutcome::Cname { edges, tail } => {
                    hops = hops.saturating_add(edges.len().max(1) as u8);
                    if hops > opts.max_cname_redirects {
                        return Err(ResolveError::CnameLoop {
                            max: opts.max_cname_redirects,
                        });
                    }
                    for edge in edges {
                        shared.cname_cache.insert(edge.alias, edge.target, edge.ttl, opts);
                    }
                    debug!(tail = %tail, hops = hops, "chasing CNAME");
                    cursor = tail;
                }
                QuestionOutcome::NoAnswer { nxdomain, soa_ttl } => {
                    return Ok(FamilyOutcome::None { nxdomain, soa_ttl });
                }
            }
        }
    }

    /// Fire-and-forget secondary-family query that only warms the cache;
    /// the user future has already settled with the preferred answer.
    fn spawn_secondary(&self, name: &Arc<str>, record_type: RecordType, budget_left: u16) {
        if budget_left == 0 {
            return;
        }
        let context = AddressResolveContext::new(
            Arc::clone(&self.shared),
            Arc::clone(name),
            Arc::clone(name),
            Vec::new(),
        );
        tokio::spawn(async move {
            let name = Arc::clone(&context.hostname);
            let mut budget = QueryBudget::new(budget_left);
            let mut redirect_depth = 0u8;
            if let Err(e) = context
                .resolve_family(&name, record_type, &mut budget, &mut redirect_depth)
                .await
            {
                debug!(name = %name, error = %e, "background secondary lookup failed");
            }
        });
    }
}
