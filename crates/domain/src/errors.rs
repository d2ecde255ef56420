use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Resolution failure kinds.
///
/// These are behavioral categories, not transport minutiae: the resolve
/// loop retries `Timeout` and `Transport` against the next candidate
/// server, while the remaining kinds surface to the caller directly.
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("unknown host: {hostname}")]
    UnknownHost {
        hostname: Arc<str>,
        #[source]
        cause: Option<Box<ResolveError>>,
    },

    #[error("query to {server} timed out after {elapsed:?}")]
    Timeout { server: SocketAddr, elapsed: Duration },

    #[error("transport error talking to {server}: {message}")]
    Transport { server: SocketAddr, message: Arc<str> },

    #[error("query budget exhausted after {attempts} queries")]
    SearchBudgetExceeded {
        attempts: u16,
        #[source]
        last_cause: Option<Box<ResolveError>>,
    },

    #[error("CNAME chain exceeded {max} redirects")]
    CnameLoop { max: u8 },

    #[error("referral chain exceeded {max} redirects")]
    RedirectLoop { max: u8 },

    #[error("no free query IDs for server {server}")]
    NoMoreIds { server: SocketAddr },

    #[error("malformed DNS message: {0}")]
    Decode(Arc<str>),

    #[error("resolver is closed")]
    ResolverClosed,

    #[error("invalid hostname: {0}")]
    InvalidHostname(Arc<str>),

    #[error("no name servers available")]
    NoServers,
}

impl ResolveError {
    pub fn decode(message: impl Into<Arc<str>>) -> Self {
        ResolveError::Decode(message.into())
    }

    pub fn transport(server: SocketAddr, message: impl Into<Arc<str>>) -> Self {
        ResolveError::Transport {
            server,
            message: message.into(),
        }
    }

    /// Whether the resolve loop should advance to the next server instead
    /// of failing the user promise.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolveError::Timeout { .. }
                | ResolveError::Transport { .. }
                | ResolveError::NoMoreIds { .. }
        )
    }
}
