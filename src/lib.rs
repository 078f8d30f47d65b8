//! Streaming extraction of XML fragments by path selector.
//!
//! A [`SelectorSplitter`] reads an XML byte stream once, front to back, and
//! yields one standalone fragment per element matched by a path selector
//! such as `/catalog/item`, `//gml:featureMember` or `/r/*:it?m`. The
//! matched element's source text is reproduced verbatim; namespace bindings
//! inherited from ancestors are preserved either by repeating the ancestor
//! start tags around the fragment ([`Mode::Wrap`]) or by splicing the
//! bindings into the fragment's own start tag ([`Mode::Inject`]), so every
//! fragment parses on its own.
//!
//! ```
//! use std::io::Cursor;
//! use xmlchunk::{Mode, SelectorSplitter};
//!
//! let xml = r#"<catalog><item id="1"/><item id="2"/></catalog>"#;
//! let splitter = SelectorSplitter::from_path("/catalog/item", None, Mode::Inject, Cursor::new(xml))?;
//! let items = splitter.collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(items, vec![r#"<item id="1"/>"#, r#"<item id="2"/>"#]);
//! # Ok::<(), xmlchunk::SplitterError>(())
//! ```

mod fragment;
mod name;
mod namespaces;
mod selector;
mod splitter;
pub mod util;

pub use name::XmlName;
pub use namespaces::{NamespaceScope, Prefix};
pub use selector::{NameMatcher, Selector, SelectorError};
pub use splitter::{Mode, SelectorSplitter, SplitterError};
