use std::collections::HashSet;

use quick_xml::escape::escape;
use regex::Regex;

use crate::{
    name::XmlName,
    namespaces::{NamespaceScope, Prefix},
};

/// Matches `xmlns' and `xmlns:prefix' declarations inside a start tag
const NS_DECL_PATTERN: &str = r#"xmlns(:\w+)?\s*=\s*("[^"]*"|'[^']*')"#;

/// # Panic safety
/// The unit test `ns_decl_pattern_is_valid` asserts that the pattern
/// compiles, so the `expect` cannot be reached.
pub(crate) fn ns_decl_regex() -> Regex {
    Regex::new(NS_DECL_PATTERN).expect("the namespace declaration pattern should be valid")
}

/// Assemble a wrapped fragment: the recorded ancestor openings, the text
/// immediately preceding the match, the matched element verbatim, and a
/// synthesized closing tag for every element still open.
pub(crate) fn wrap_fragment(
    openings: &[String],
    lead: &str,
    raw: &str,
    open_path: &[XmlName],
) -> String {
    let mut out = String::with_capacity(
        openings.iter().map(String::len).sum::<usize>()
            + lead.len()
            + raw.len()
            + open_path.len() * 8,
    );
    for opening in openings {
        out.push_str(opening);
    }
    out.push_str(lead);
    out.push_str(raw);
    for name in open_path.iter().rev() {
        out.push_str("</");
        if let Some(prefix) = &name.prefix {
            out.push_str(prefix);
            out.push(':');
        }
        out.push_str(&name.local);
        out.push('>');
    }
    out
}

/// Splice the in-scope namespace bindings into the start tag of `raw`.
///
/// Prefixes the tag already declares itself are skipped, and the splice
/// reuses the quote style of the tag's own declarations (`"` if it has
/// none). The remainder of `raw` is appended unchanged.
pub(crate) fn inject_bindings(raw: &str, scope: &NamespaceScope, decl_re: &Regex) -> String {
    let stag_end = raw.find('>').map_or(raw.len(), |i| i + 1);
    let stag = &raw[..stag_end];

    let mut declared: HashSet<Prefix> = HashSet::new();
    let mut quote = None;
    for caps in decl_re.captures_iter(stag) {
        let prefix = match caps.get(1) {
            Some(p) => Prefix::Named(p.as_str()[1..].to_string()),
            None => Prefix::Default,
        };
        declared.insert(prefix);
        if quote.is_none() {
            quote = caps.get(2).and_then(|v| v.as_str().chars().next());
        }
    }
    let quote = quote.unwrap_or('"');

    let splice_at = stag_end - if stag.ends_with("/>") { 2 } else { 1 };
    let mut out = String::with_capacity(raw.len() + 32 * scope.len());
    out.push_str(&raw[..splice_at]);
    for (prefix, uri) in scope {
        if declared.contains(prefix) {
            continue;
        }
        match prefix {
            Prefix::Default => out.push_str(" xmlns="),
            Prefix::Named(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
                out.push('=');
            }
        }
        out.push(quote);
        out.push_str(&escape(uri));
        out.push(quote);
    }
    out.push_str(&raw[splice_at..]);
    out
}
