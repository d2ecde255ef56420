//! Hosts-file overlay.
//!
//! Parses the platform hosts format (address first, any number of names
//! after it, `#` comments) into an in-memory table the resolve path can
//! consult synchronously. Also usable as a purely programmatic overlay
//! for tests and embedders.

use hearth_dns_application::HostsFileResolver;
use hearth_dns_domain::{normalize_hostname, AddressFamily};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone)]
pub struct HostsFileEntries {
    map: HashMap<Arc<str>, Vec<IpAddr>>,
}

impl HostsFileEntries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses hosts-file content. Unparseable lines are skipped with a
    /// warning rather than failing the whole file.
    pub fn parse(content: &str) -> Self {
        let mut map: HashMap<Arc<str>, Vec<IpAddr>> = HashMap::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(address_field) = fields.next() else {
                continue;
            };
            let Ok(address) = address_field.parse::<IpAddr>() else {
                warn!(line = %line, "skipping hosts line with unparseable address");
                continue;
            };
            for name in fields {
                let Ok(normalized) = normalize_hostname(name) else {
                    warn!(name = %name, "skipping invalid hosts name");
                    continue;
                };
                let addresses = map.entry(normalized).or_default();
                if !addresses.contains(&address) {
                    addresses.push(address);
                }
            }
        }
        debug!(names = map.len(), "hosts file parsed");
        Self { map }
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// The platform hosts file, or an empty overlay when it cannot be
    /// read.
    pub fn load_system() -> Self {
        let path = if cfg!(windows) {
            r"C:\Windows\System32\drivers\etc\hosts".to_string()
        } else {
            "/etc/hosts".to_string()
        };
        match Self::from_path(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path, error = %e, "hosts file unreadable, overlay disabled");
                Self::empty()
            }
        }
    }

    /// Adds a mapping programmatically; the in-memory variant of the
    /// overlay.
    pub fn insert(&mut self, name: &str, address: IpAddr) {
        if let Ok(normalized) = normalize_hostname(name) {
            self.map.entry(normalized).or_default().push(address);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl HostsFileResolver for HostsFileEntries {
    fn lookup(&self, name: &str, families: &[AddressFamily]) -> Vec<IpAddr> {
        let Some(addresses) = self.map.get(name) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        for family in families {
            result.extend(addresses.iter().filter(|a| family.matches(a)).copied());
        }
        result
    }
}
