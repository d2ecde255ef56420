//! Hearth DNS Application Layer
//!
//! Ports only: the traits the resolver engine is programmed against. The
//! implementations live in the infrastructure layer and are injected at
//! build time.
pub mod ports;

pub use ports::{
    AddressResolver, HostsFileResolver, NameServerStreamProvider,
    NoopLifecycleObserverFactory, QueryLifecycleObserver, QueryLifecycleObserverFactory,
    StaticNameServerProvider,
};
