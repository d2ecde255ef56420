//! Hearth DNS Infrastructure Layer
//!
//! The stub resolver engine: shared UDP transport with response
//! demultiplexing, the query-context manager, the three resolver caches,
//! the referral/CNAME resolve loop and the public [`DnsResolver`] façade.
pub mod dns;

pub use dns::cache::{AnswerCache, AuthoritativeNsCache, CachedAnswer, CnameCache};
pub use dns::envelope::ResponseEnvelope;
pub use dns::hosts::HostsFileEntries;
pub use dns::resolver::{DnsResolver, DnsResolverBuilder};
