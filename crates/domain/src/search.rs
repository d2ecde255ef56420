use super::hostname::{count_dots, is_absolute};
use std::sync::Arc;

/// Iterator over the effective names tried for a lookup, applying
/// search-domain suffixes under the ndots rule.
///
/// A name the caller wrote as absolute (trailing dot) is tried alone.
/// Otherwise, when the name has at least `ndots` interior dots it is
/// tried as-is first and suffixed afterwards; with fewer dots the
/// suffixed forms come first and the bare name last.
#[derive(Debug, Clone)]
pub struct SearchNameIter {
    names: Vec<Arc<str>>,
    pos: usize,
}

impl SearchNameIter {
    pub fn new(raw: &str, search_domains: &[Arc<str>], ndots: usize) -> Self {
        let bare = raw.trim().trim_end_matches('.').to_ascii_lowercase();

        if is_absolute(raw) || search_domains.is_empty() {
            return Self {
                names: vec![Arc::from(format!("{bare}.").as_str())],
                pos: 0,
            };
        }

        let suffixed = search_domains.iter().map(|suffix| {
            let suffix = suffix.trim_matches('.');
            Arc::from(format!("{bare}.{suffix}.").as_str())
        });

        let absolute: Arc<str> = Arc::from(format!("{bare}.").as_str());
        let names = if count_dots(&bare) >= ndots {
            std::iter::once(absolute).chain(suffixed).collect()
        } else {
            suffixed.chain(std::iter::once(absolute)).collect()
        };
        Self { names, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.names.len() - self.pos
    }
}

impl Iterator for SearchNameIter {
    type Item = Arc<str>;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.names.get(self.pos)?;
        self.pos += 1;
        Some(Arc::clone(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(list: &[&str]) -> Vec<Arc<str>> {
        list.iter().map(|s| Arc::from(*s)).collect()
    }

    #[test]
    fn absolute_name_skips_search() {
        let names: Vec<_> = SearchNameIter::new("host.example.org.", &domains(&["corp.local"]), 1)
            .collect();
        assert_eq!(names, vec![Arc::from("host.example.org.")]);
    }

    #[test]
    fn enough_dots_tries_bare_name_first() {
        let names: Vec<_> =
            SearchNameIter::new("host.example.org", &domains(&["corp.local"]), 1).collect();
        assert_eq!(
            names,
            vec![
                Arc::from("host.example.org."),
                Arc::from("host.example.org.corp.local."),
            ]
        );
    }

    #[test]
    fn short_name_tries_suffixes_first() {
        let names: Vec<_> =
            SearchNameIter::new("nas", &domains(&["corp.local", "lan"]), 1).collect();
        assert_eq!(
            names,
            vec![
                Arc::from("nas.corp.local."),
                Arc::from("nas.lan."),
                Arc::from("nas."),
            ]
        );
    }

    #[test]
    fn no_search_domains_tries_bare_name_only() {
        let names: Vec<_> = SearchNameIter::new("nas", &[], 1).collect();
        assert_eq!(names, vec![Arc::from("nas.")]);
    }
}
