use std::fmt;

/// An expanded XML element name.
///
/// Two names are equal when their namespace URIs and local parts are equal;
/// the prefix is presentational only and is kept so that synthesized closing
/// tags can reproduce the source spelling. An empty namespace means the
/// element is in no namespace.
#[derive(Debug, Clone, Eq)]
pub struct XmlName {
    pub namespace: String,
    pub local: String,
    pub prefix: Option<String>,
}

impl PartialEq for XmlName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl fmt::Display for XmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local),
            None => f.write_str(&self.local),
        }
    }
}
