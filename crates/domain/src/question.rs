use super::errors::ResolveError;
use super::hostname::normalize_hostname;
use super::record_type::RecordType;
use std::fmt;
use std::sync::Arc;

/// DNS class. Only `IN` is ever sent; the variant list exists so decoded
/// questions can be compared faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DnsClass {
    #[default]
    In,
    Other(u16),
}

impl DnsClass {
    pub fn code(self) -> u16 {
        match self {
            DnsClass::In => 1,
            DnsClass::Other(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => DnsClass::In,
            other => DnsClass::Other(other),
        }
    }
}

/// A normalized DNS question.
///
/// The name is lowercase ASCII with the trailing dot made explicit, so
/// two questions for the same owner always compare equal. Uses `Arc<str>`
/// so a question clones cheaply across the resolve → query → cache path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnsQuestion {
    name: Arc<str>,
    record_type: RecordType,
    class: DnsClass,
}

impl DnsQuestion {
    /// Builds a question from a raw hostname, normalizing it first.
    pub fn new(name: &str, record_type: RecordType) -> Result<Self, ResolveError> {
        let name = normalize_hostname(name)?;
        Ok(Self {
            name,
            record_type,
            class: DnsClass::In,
        })
    }

    /// Builds a question from an already-normalized name. Callers must
    /// only hand in names produced by [`normalize_hostname`].
    pub fn from_normalized(name: Arc<str>, record_type: RecordType) -> Self {
        Self {
            name,
            record_type,
            class: DnsClass::In,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn class(&self) -> DnsClass {
        self.class
    }

    /// Same owner, different record type.
    pub fn with_record_type(&self, record_type: RecordType) -> Self {
        Self {
            name: Arc::clone(&self.name),
            record_type,
            class: self.class,
        }
    }
}

impl fmt::Display for DnsQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} IN", self.name, self.record_type)
    }
}
