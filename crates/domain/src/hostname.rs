use super::errors::ResolveError;
use std::net::IpAddr;
use std::sync::Arc;

/// Normalizes a hostname for use as a question name and cache key:
/// ASCII-lowercased, trailing dot made explicit.
///
/// Rejects names that are empty after normalization, exceed the 253-octet
/// limit, or contain characters that cannot appear in a wire-format name.
/// Unicode labels are not mangled here; IDN conversion is the codec's job
/// and anything non-ASCII is passed through lowercased.
pub fn normalize_hostname(raw: &str) -> Result<Arc<str>, ResolveError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Err(ResolveError::InvalidHostname(Arc::from(raw)));
    }
    if trimmed.len() > 254 {
        return Err(ResolveError::InvalidHostname(Arc::from(raw)));
    }
    if trimmed.contains("..") || trimmed.starts_with('.') {
        return Err(ResolveError::InvalidHostname(Arc::from(raw)));
    }

    let mut name = trimmed.to_ascii_lowercase();
    if !name.ends_with('.') {
        name.push('.');
    }
    Ok(Arc::from(name.as_str()))
}

/// Returns the address when the input is a literal IPv4/IPv6 address,
/// including the bracketed `[::1]` form.
pub fn parse_ip_literal(raw: &str) -> Option<IpAddr> {
    let s = raw.trim();
    if let Ok(addr) = s.parse::<IpAddr>() {
        return Some(addr);
    }
    let inner = s.strip_prefix('[')?.strip_suffix(']')?;
    inner.parse::<IpAddr>().ok()
}

/// Number of interior dots, ignoring one trailing root dot. Drives the
/// ndots decision in search-domain expansion.
pub fn count_dots(name: &str) -> usize {
    let name = name.strip_suffix('.').unwrap_or(name);
    name.bytes().filter(|b| *b == b'.').count()
}

/// Whether the caller wrote the name as absolute (explicit root dot), in
/// which case search domains are never applied.
pub fn is_absolute(raw: &str) -> bool {
    raw.trim_end().ends_with('.')
}
