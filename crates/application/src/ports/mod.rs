pub mod address_resolver;
pub mod hosts_file;
pub mod lifecycle;
pub mod name_server;

pub use address_resolver::AddressResolver;
pub use hosts_file::HostsFileResolver;
pub use lifecycle::{
    NoopLifecycleObserverFactory, QueryLifecycleObserver, QueryLifecycleObserverFactory,
};
pub use name_server::{NameServerStreamProvider, StaticNameServerProvider};
