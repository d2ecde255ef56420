//! The record-level resolve loop.
//!
//! One call to [`ResolveEngine::resolve_question`] drives a single
//! question to a conclusion: it walks the candidate server stream under
//! the shared query budget, follows referrals (rebuilding the stream
//! from delegated servers, resolving glue-less NS names with the same
//! budget), and reports CNAMEs and empty answers upward for policy
//! handling. SERVFAIL, timeouts and transport errors advance to the next
//! server; the accumulated cause chain rides on the final error.

use crate::dns::message::{CnameEdge, ResponseParser};
use crate::dns::query::QueryContext;
use crate::dns::resolver::ResolverShared;
use hearth_dns_domain::{DnsQuestion, ResolveError, ServerStream};
use hickory_proto::rr::Record;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The per-resolve query allowance. Shared by every question issued on
/// behalf of one user call: search expansions, CNAME hops, both address
/// families and nested NS-address lookups all draw from the same pool.
#[derive(Debug)]
pub struct QueryBudget {
    remaining: u16,
    issued: u16,
}

impl QueryBudget {
    pub fn new(max_queries: u16) -> Self {
        Self {
            remaining: max_queries,
            issued: 0,
        }
    }

    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.issued += 1;
        true
    }

    pub fn issued(&self) -> u16 {
        self.issued
    }

    pub fn remaining(&self) -> u16 {
        self.remaining
    }
}

/// How one question concluded, short of a hard error.
#[derive(Debug)]
pub enum QuestionOutcome {
    /// Records of the asked type whose owner is the question name or
    /// reachable from it through `edges`.
    Answered {
        records: Vec<Record>,
        edges: Vec<CnameEdge>,
    },
    /// The answer was an alias chain with no terminal record; the
    /// resolve continues under `tail`.
    Cname {
        edges: Vec<CnameEdge>,
        tail: Arc<str>,
    },
    /// A well-formed response with nothing usable in it.
    NoAnswer {
        nxdomain: bool,
        soa_ttl: Option<u32>,
    },
}

pub struct ResolveEngine<'a> {
    shared: &'a Arc<ResolverShared>,
}

type BoxedResolve<'s, T> = Pin<Box<dyn Future<Output = Result<T, ResolveError>> + Send + 's>>;

impl<'a> ResolveEngine<'a> {
    pub fn new(shared: &'a Arc<ResolverShared>) -> Self {
        Self { shared }
    }

    /// Drives `question` against `stream` until it answers, aliases out,
    /// or definitively has no answer.
    ///
    /// Boxed because referral handling may recurse back into the engine
    /// to resolve glue-less NS names.
    pub fn resolve_question<'s>(
        &'s self,
        question: &'s DnsQuestion,
        additionals: &'s [Record],
        stream: &'s mut ServerStream,
        budget: &'s mut QueryBudget,
        redirect_depth: &'s mut u8,
    ) -> BoxedResolve<'s, QuestionOutcome> {
        Box::pin(async move {
            let shared = self.shared;
            let mut last_cause: Option<ResolveError> = None;

            loop {
                if !budget.try_consume() {
                    return Err(ResolveError::SearchBudgetExceeded {
                        attempts: budget.issued(),
                        last_cause: last_cause.map(Box::new),
                    });
                }
                let Some(server) = stream.next() else {
                    return Err(last_cause.unwrap_or(ResolveError::NoServers));
                };

                let observer = shared.observers.new_observer(question.name());
                let context = QueryContext::new(
                    &shared.transport,
                    &shared.opts,
                    server,
                    question,
                    additionals,
                    Arc::clone(&observer),
                    shared.tcp_fallback,
                );

                let envelope = match context.run(budget.issued()).await {
                    Ok(envelope) => envelope,
                    Err(e) if e.is_retryable() => {
                        debug!(server = %server, error = %e, "query attempt failed, trying next server");
                        observer.query_failed(&e);
                        if matches!(e, ResolveError::NoMoreIds { .. }) {
                            // Give in-flight queries a moment to free IDs
                            // before hitting a different server.
                            tokio::time::sleep(Duration::from_millis(fastrand::u64(1..=20))).await;
                        }
                        last_cause = Some(e);
                        continue;
                    }
                    Err(e) => {
                        observer.query_failed(&e);
                        return Err(e);
                    }
                };

                let classified = ResponseParser::classify(
                    &envelope.message,
                    question.name(),
                    question.record_type(),
                );

                if classified.is_server_error() {
                    observer.query_no_answer(u16::from(classified.rcode.low()));
                    last_cause = Some(ResolveError::transport(
                        server,
                        format!("server answered {:?}", classified.rcode),
                    ));
                    continue;
                }

                if classified.is_nxdomain() {
                    observer.query_no_answer(u16::from(classified.rcode.low()));
                    return Ok(QuestionOutcome::NoAnswer {
                        nxdomain: true,
                        soa_ttl: classified.soa_negative_ttl,
                    });
                }

                if !classified.matching.is_empty() {
                    observer.query_succeeded();
                    return Ok(QuestionOutcome::Answered {
                        records: classified.matching,
                        edges: classified.cname_edges,
                    });
                }

                if let Some(tail) = classified.chain_tail {
                    observer.query_cnamed(&crate::dns::message::display_name(
                        &tail,
                        shared.opts.decode_idn,
                    ));
                    return Ok(QuestionOutcome::Cname {
                        edges: classified.cname_edges,
                        tail,
                    });
                }

                if classified.is_referral() {
                    *redirect_depth += 1;
                    if *redirect_depth > shared.opts.max_redirects {
                        return Err(ResolveError::RedirectLoop {
                            max: shared.opts.max_redirects,
                        });
                    }
                    match self
                        .referral_stream(&classified.referrals, budget, redirect_depth)
                        .await?
                    {
                        Some(child) => {
                            observer.query_redirected(child.snapshot());
                            debug!(
                                servers = child.size(),
                                depth = *redirect_depth,
                                "following referral"
                            );
                            *stream = child;
                            continue;
                        }
                        None => {
                            observer.query_no_answer(u16::from(classified.rcode.low()));
                            last_cause = Some(ResolveError::transport(
                                server,
                                "referral without reachable name servers",
                            ));
                            continue;
                        }
                    }
                }

                // NOERROR with an empty answer section.
                observer.query_no_answer(u16::from(classified.rcode.low()));
                return Ok(QuestionOutcome::NoAnswer {
                    nxdomain: false,
                    soa_ttl: classified.soa_negative_ttl,
                });
            }
        })
    }

    /// Builds the child server stream for a referral.
    ///
    /// Glue addresses are taken as-is. An NS target without glue costs an
    /// address resolution of its own, drawn from the same budget; the
    /// first target to produce addresses wins. The assembled snapshot is
    /// recorded in the delegation cache under the referred zone.
    async fn referral_stream(
        &self,
        referrals: &[crate::dns::message::ReferralNs],
        budget: &mut QueryBudget,
        redirect_depth: &mut u8,
    ) -> Result<Option<ServerStream>, ResolveError> {
        let shared = self.shared;
        let zone = match referrals.first() {
            Some(r) => Arc::clone(&r.zone),
            None => return Ok(None),
        };

        if let Some(cached) = shared.authoritative_cache.get(&zone) {
            debug!(zone = %zone, "delegation served from cache");
            return Ok(Some(cached));
        }

        let mut servers: Vec<SocketAddr> = Vec::new();
        for referral in referrals {
            for glue in &referral.glue {
                let addr = SocketAddr::new(*glue, shared.redirect_port);
                if !servers.contains(&addr) {
                    servers.push(addr);
                }
            }
        }

        if servers.is_empty() {
            // No glue anywhere: resolve NS targets ourselves, first
            // answer wins.
            for referral in referrals {
                if budget.remaining() == 0 {
                    break;
                }
                match self
                    .resolve_ns_addresses(&referral.ns_name, budget, redirect_depth)
                    .await
                {
                    Ok(addresses) if !addresses.is_empty() => {
                        servers = addresses
                            .into_iter()
                            .map(|ip| SocketAddr::new(ip, shared.redirect_port))
                            .collect();
                        break;
                    }
                    Ok(_) => continue,
                    Err(e @ ResolveError::SearchBudgetExceeded { .. }) => return Err(e),
                    Err(e) => {
                        debug!(ns = %referral.ns_name, error = %e, "could not resolve referred NS");
                        continue;
                    }
                }
            }
        }

        if servers.is_empty() {
            return Ok(None);
        }

        let ttl = referrals.iter().map(|r| r.ttl).min().unwrap_or(0);
        shared
            .authoritative_cache
            .insert(zone, servers.clone(), ttl, &shared.opts);

        Ok(Some(ServerStream::preferring(
            servers,
            shared.opts.resolved_address_types.preferred(),
        )))
    }

    /// Resolves a referred NS name to addresses via the provider's
    /// stream, preferred family first with one fallback to the other.
    async fn resolve_ns_addresses(
        &self,
        ns_name: &str,
        budget: &mut QueryBudget,
        redirect_depth: &mut u8,
    ) -> Result<Vec<IpAddr>, ResolveError> {
        let shared = self.shared;
        let name: Arc<str> = Arc::from(ns_name);

        if let Some(crate::dns::cache::CachedAnswer::Addresses(addresses)) =
            shared.answer_cache.get(&name)
        {
            return Ok(addresses);
        }

        for record_type in shared.opts.resolved_address_types.record_types() {
            let question = DnsQuestion::from_normalized(Arc::clone(&name), *record_type);
            let mut stream = shared.provider.name_server_stream(&name);
            let outcome = self
                .resolve_question(&question, &[], &mut stream, budget, redirect_depth)
                .await?;
            if let QuestionOutcome::Answered { records, .. } = outcome {
                let resolved = ResponseParser::addresses(&records);
                shared
                    .answer_cache
                    .insert_addresses(Arc::clone(&name), &resolved, &shared.opts);
                return Ok(resolved.into_iter().map(|r| r.address).collect());
            }
        }
        Ok(Vec::new())
    }
}
