use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

use crate::name::XmlName;

/// Errors raised while compiling a selector path
#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("selector path contains no element names")]
    EmptyPath,

    #[error("selector path must start with `/'")]
    MissingLeadingSeparator,

    #[error("adjacent descendant axes (`///') are not allowed")]
    AdjacentDescendantAxes,

    #[error("invalid name pattern")]
    Pattern(#[from] regex::Error),
}

/// One concrete selector segment: a namespace URI (or the `*` wildcard) and a
/// local name that may contain `*` and `?` globs
#[derive(Debug, Clone)]
pub struct NameMatcher {
    namespace: String,
    ns_any: bool,
    local: String,
    local_pattern: Option<Regex>,
}

impl NameMatcher {
    fn compile(namespace: String, local: &str) -> Result<Self, SelectorError> {
        let ns_any = namespace == "*";
        let local_pattern = if local.chars().any(|c| c == '*' || c == '?') {
            let mut pattern = String::from("^");
            for c in local.chars() {
                match c {
                    '*' => pattern.push_str(".*"),
                    '?' => pattern.push('.'),
                    c => pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
                }
            }
            pattern.push('$');
            Some(Regex::new(&pattern)?)
        } else {
            None
        };

        Ok(Self {
            namespace,
            ns_any,
            local: local.to_string(),
            local_pattern,
        })
    }

    /// Whether the given element name satisfies this segment
    pub fn matches(&self, name: &XmlName) -> bool {
        (self.ns_any || self.namespace == name.namespace)
            && match &self.local_pattern {
                Some(pattern) => pattern.is_match(&name.local),
                None => self.local == name.local,
            }
    }
}

/// A compiled selector path.
///
/// The path starts with `/' and consists of `/'-separated segments of the
/// form `[prefix:]localname`. An empty segment (`//') denotes the
/// descendant-or-self axis. Prefixes are resolved through the binding map
/// given at parse time; an unmapped prefix resolves to the empty URI and
/// therefore only matches elements in no namespace, while the prefix `*`
/// matches any namespace.
///
/// A parsed selector is immutable and can be shared between splitters.
#[derive(Debug, Clone)]
pub struct Selector {
    entries: Vec<Option<NameMatcher>>,
}

impl Selector {
    pub fn parse(
        path: &str,
        bindings: Option<&HashMap<String, String>>,
    ) -> Result<Self, SelectorError> {
        if path.is_empty() {
            return Err(SelectorError::EmptyPath);
        }
        let Some(rest) = path.strip_prefix('/') else {
            return Err(SelectorError::MissingLeadingSeparator);
        };

        // trailing separators carry no segment
        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return Err(SelectorError::EmptyPath);
        }

        let mut entries: Vec<Option<NameMatcher>> = Vec::new();
        for segment in rest.split('/') {
            if segment.is_empty() {
                if matches!(entries.last(), Some(None)) {
                    return Err(SelectorError::AdjacentDescendantAxes);
                }
                entries.push(None);
            } else {
                let (prefix, local) = match segment.find(':') {
                    Some(d) if d > 0 => (&segment[..d], &segment[d + 1..]),
                    _ => ("", segment),
                };
                let namespace = if prefix == "*" {
                    "*".to_string()
                } else {
                    bindings
                        .and_then(|m| m.get(prefix))
                        .cloned()
                        .unwrap_or_default()
                };
                entries.push(Some(NameMatcher::compile(namespace, local)?));
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The matcher at the given position, or [`None`] for a
    /// descendant-or-self marker
    pub fn entry(&self, index: usize) -> Option<&NameMatcher> {
        self.entries.get(index).and_then(Option::as_ref)
    }

    /// Whether the given position is a descendant-or-self marker
    pub fn is_descendant_axis(&self, index: usize) -> bool {
        matches!(self.entries.get(index), Some(None))
    }
}
