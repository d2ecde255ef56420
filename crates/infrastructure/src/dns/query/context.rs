//! A single outstanding question against one server.
//!
//! The context allocates an ID, encodes and sends the datagram, then
//! waits for the demultiplexed response under the query timeout. The ID
//! slot is released exactly once on every path: a matched response
//! removes it in the manager, while timeout, send failure and
//! cancellation release it through the drop guard.

use crate::dns::envelope::ResponseEnvelope;
use crate::dns::message::MessageBuilder;
use crate::dns::query::{InFlightQuery, QueryContextManager};
use crate::dns::transport::{tcp, DatagramTransport};
use hearth_dns_application::QueryLifecycleObserver;
use hearth_dns_domain::{DnsQuestion, ResolveError, ResolverOpts};
use hickory_proto::rr::Record;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct QueryContext<'a> {
    transport: &'a DatagramTransport,
    opts: &'a ResolverOpts,
    server: SocketAddr,
    question: &'a DnsQuestion,
    additionals: &'a [Record],
    observer: Arc<dyn QueryLifecycleObserver>,
    tcp_fallback: bool,
}

impl<'a> QueryContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: &'a DatagramTransport,
        opts: &'a ResolverOpts,
        server: SocketAddr,
        question: &'a DnsQuestion,
        additionals: &'a [Record],
        observer: Arc<dyn QueryLifecycleObserver>,
        tcp_fallback: bool,
    ) -> Self {
        Self {
            transport,
            opts,
            server,
            question,
            additionals,
            observer,
            tcp_fallback,
        }
    }

    /// Issues the query and waits for its response envelope.
    ///
    /// NXDOMAIN and SERVFAIL are successful completions at this layer;
    /// interpreting them is resolve-context policy. A truncated response
    /// is retried over TCP when fallback is enabled, and the truncated
    /// answer itself is returned when the TCP attempt fails.
    pub async fn run(self, attempt: u16) -> Result<ResponseEnvelope, ResolveError> {
        let wire_query = MessageBuilder::wire_query(self.question)?;
        let (entry, rx) = InFlightQuery::new(wire_query.clone());
        let id = self.transport.manager().add(self.server, entry)?;
        let mut guard = IdGuard::armed(
            self.transport.manager(),
            self.server,
            id,
            Arc::clone(&self.observer),
            attempt,
        );

        let bytes = MessageBuilder::build_query(id, wire_query.clone(), self.additionals, self.opts)?;
        let started = Instant::now();
        if let Err(e) = self.transport.send_to(&bytes, self.server).await {
            guard.release();
            return Err(e);
        }
        self.observer.query_written(self.server, id);

        let timeout = Duration::from_millis(self.opts.query_timeout_ms);
        let message = match tokio::time::timeout(timeout, rx).await {
            Err(_elapsed) => {
                guard.release();
                debug!(server = %self.server, id = id, "query timed out");
                return Err(ResolveError::Timeout {
                    server: self.server,
                    elapsed: started.elapsed(),
                });
            }
            // The manager was cleared under us: the resolver is closing.
            Ok(Err(_closed)) => {
                guard.disarm();
                return Err(ResolveError::ResolverClosed);
            }
            Ok(Ok(message)) => {
                guard.disarm();
                message
            }
        };

        let message = if message.truncated() && self.tcp_fallback {
            debug!(server = %self.server, id = id, "response truncated, retrying over TCP");
            let remaining = timeout
                .checked_sub(started.elapsed())
                .unwrap_or(Duration::from_millis(500));
            match tcp::exchange(self.server, &bytes, remaining).await {
                Ok(full) if full.id() == id && full.queries().first() == Some(&wire_query) => full,
                Ok(_) => {
                    debug!(server = %self.server, "TCP response failed verification, keeping truncated answer");
                    message
                }
                Err(e) => {
                    debug!(server = %self.server, error = %e, "TCP fallback failed, keeping truncated answer");
                    message
                }
            }
        } else {
            message
        };

        Ok(ResponseEnvelope::new(
            self.server,
            self.transport.local_addr(),
            message,
        ))
    }
}

/// Releases the `(server, id)` slot when the context does not settle
/// through a matched response. Timeout and send failure release
/// explicitly; a drop while still armed means the owning resolve was
/// abandoned, which is the one place cancellation becomes observable.
struct IdGuard<'a> {
    manager: &'a QueryContextManager,
    server: SocketAddr,
    id: u16,
    observer: Arc<dyn QueryLifecycleObserver>,
    attempt: u16,
    armed: bool,
}

impl<'a> IdGuard<'a> {
    fn armed(
        manager: &'a QueryContextManager,
        server: SocketAddr,
        id: u16,
        observer: Arc<dyn QueryLifecycleObserver>,
        attempt: u16,
    ) -> Self {
        Self {
            manager,
            server,
            id,
            observer,
            attempt,
            armed: true,
        }
    }

    /// Frees the ID slot on a path that reports its own outcome.
    fn release(&mut self) {
        if self.armed {
            self.armed = false;
            self.manager.claim(self.server, self.id);
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.claim(self.server, self.id);
            self.observer.query_cancelled(self.attempt);
        }
    }
}
