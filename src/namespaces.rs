use std::collections::BTreeMap;

use quick_xml::{escape::unescape, events::BytesStart, name::PrefixDeclaration, NsReader};

/// An XML namespace prefix declaration
#[derive(PartialEq, Eq, Hash, Clone, Debug, Ord, PartialOrd)]
pub enum Prefix {
    Default,
    Named(String),
}

/// The complete set of prefix bindings in scope at one element. Iteration is
/// ordered: the default binding first, then named prefixes lexicographically.
pub type NamespaceScope = BTreeMap<Prefix, String>;

/// Extracts the namespace bindings declared directly on the given XML tag,
/// in declaration order
pub fn declared_bindings<R>(
    tag: &BytesStart,
    reader: &NsReader<R>,
) -> Result<Vec<(Prefix, String)>, quick_xml::Error> {
    let mut bindings = Vec::new();

    for attr in tag.attributes() {
        let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
        if let Some(decl) = attr.key.as_namespace_binding() {
            let prefix = match decl {
                PrefixDeclaration::Default => Prefix::Default,
                PrefixDeclaration::Named(b"") => Prefix::Default,
                PrefixDeclaration::Named(n) => {
                    Prefix::Named(reader.decoder().decode(n)?.into_owned())
                }
            };
            let value = reader.decoder().decode(&attr.value)?;
            let value = unescape(&value)?.into_owned();
            bindings.push((prefix, value));
        }
    }

    Ok(bindings)
}

/// Derive the scope of a child element: the parent scope with the child's own
/// declarations layered on top (a redeclared prefix overrides the parent)
pub fn child_scope(parent: Option<&NamespaceScope>, declared: &[(Prefix, String)]) -> NamespaceScope {
    let mut scope = parent.cloned().unwrap_or_default();
    for (prefix, uri) in declared {
        scope.insert(prefix.clone(), uri.clone());
    }
    scope
}

#[cfg(test)]
mod tests {
    use quick_xml::{events::Event, NsReader};

    use super::{child_scope, declared_bindings, NamespaceScope, Prefix};

    fn bindings_of(xml: &str) -> Vec<(Prefix, String)> {
        let mut reader = NsReader::from_str(xml);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(tag) | Event::Empty(tag) => {
                    return declared_bindings(&tag, &reader).unwrap();
                }
                Event::Eof => panic!("no element found"),
                _ => {}
            }
        }
    }

    #[test]
    fn simple() {
        let bindings = bindings_of(
            r#"<root xmlns:zoo="https://zoo.com" xmlns="https://example.com" key="value" />"#,
        );
        assert_eq!(
            bindings,
            vec![
                (Prefix::Named("zoo".to_string()), "https://zoo.com".to_string()),
                (Prefix::Default, "https://example.com".to_string()),
            ]
        );
    }

    #[test]
    fn escaped_value() {
        let bindings = bindings_of(r#"<root xmlns="https://example.com?a=1&amp;b=2"/>"#);
        assert_eq!(
            bindings,
            vec![(Prefix::Default, "https://example.com?a=1&b=2".to_string())]
        );
    }

    /// A child redeclaration overrides the inherited binding
    #[test]
    fn child_overrides_parent() {
        let mut parent = NamespaceScope::new();
        parent.insert(Prefix::Default, "u".to_string());
        parent.insert(Prefix::Named("x".to_string()), "xu".to_string());

        let scope = child_scope(
            Some(&parent),
            &[
                (Prefix::Default, "v".to_string()),
                (Prefix::Named("y".to_string()), "yu".to_string()),
            ],
        );

        assert_eq!(scope.get(&Prefix::Default), Some(&"v".to_string()));
        assert_eq!(scope.get(&Prefix::Named("x".to_string())), Some(&"xu".to_string()));
        assert_eq!(scope.get(&Prefix::Named("y".to_string())), Some(&"yu".to_string()));
    }

    /// The default binding sorts before any named prefix
    #[test]
    fn scope_iteration_order() {
        let scope = child_scope(
            None,
            &[
                (Prefix::Named("z".to_string()), "zu".to_string()),
                (Prefix::Default, "u".to_string()),
                (Prefix::Named("a".to_string()), "au".to_string()),
            ],
        );
        let prefixes: Vec<_> = scope.keys().cloned().collect();
        assert_eq!(
            prefixes,
            vec![
                Prefix::Default,
                Prefix::Named("a".to_string()),
                Prefix::Named("z".to_string()),
            ]
        );
    }
}
