use hearth_dns_domain::ResolveError;
use std::net::SocketAddr;
use std::sync::Arc;

/// Observer for the lifecycle of a single query attempt.
///
/// One observer is created per query; the engine reports each state
/// transition exactly once. Implementations typically feed metrics and
/// must not block.
pub trait QueryLifecycleObserver: Send + Sync {
    /// The encoded question left the socket toward `server` as `id`.
    fn query_written(&self, server: SocketAddr, id: u16);

    /// The owning resolve was abandoned before this attempt settled.
    fn query_cancelled(&self, tries_so_far: u16);

    /// A referral replaced the server set for the rest of the resolve.
    fn query_redirected(&self, new_servers: &[SocketAddr]);

    /// The answer was an alias; the resolve continues under `target`.
    fn query_cnamed(&self, target: &str);

    /// A well-formed response carried no usable answer (`code` rcode).
    fn query_no_answer(&self, code: u16);

    fn query_failed(&self, cause: &ResolveError);

    fn query_succeeded(&self);
}

/// Factory invoked once per query attempt.
pub trait QueryLifecycleObserverFactory: Send + Sync {
    fn new_observer(&self, hostname: &str) -> Arc<dyn QueryLifecycleObserver>;
}

/// Observer that ignores everything; the default when no factory is
/// injected.
#[derive(Debug, Default)]
pub struct NoopLifecycleObserverFactory;

struct NoopObserver;

impl QueryLifecycleObserver for NoopObserver {
    fn query_written(&self, _server: SocketAddr, _id: u16) {}
    fn query_cancelled(&self, _tries_so_far: u16) {}
    fn query_redirected(&self, _new_servers: &[SocketAddr]) {}
    fn query_cnamed(&self, _target: &str) {}
    fn query_no_answer(&self, _code: u16) {}
    fn query_failed(&self, _cause: &ResolveError) {}
    fn query_succeeded(&self) {}
}

impl QueryLifecycleObserverFactory for NoopLifecycleObserverFactory {
    fn new_observer(&self, _hostname: &str) -> Arc<dyn QueryLifecycleObserver> {
        Arc::new(NoopObserver)
    }
}
