use std::{
    collections::HashMap,
    io::{BufReader, Read},
    ops::Range,
};

use quick_xml::{
    events::Event,
    name::{Namespace, QName, ResolveResult},
    NsReader,
};
use regex::Regex;
use thiserror::Error;
use tracing::trace;

use crate::{
    fragment::{inject_bindings, ns_decl_regex, wrap_fragment},
    name::XmlName,
    namespaces::{child_scope, declared_bindings, NamespaceScope, Prefix},
    selector::{NameMatcher, Selector, SelectorError},
    util::{window::WindowError, window_read::WindowRead},
};

/// Errors that can occur while splitting an XML stream
#[derive(Error, Debug)]
pub enum SplitterError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("unable to parse XML stream")]
    Parser(#[from] quick_xml::Error),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("prefix `{0}' is not bound to a namespace")]
    UnboundPrefix(String),

    #[error("reader reported a nonzero start position ({0})")]
    ReaderPosition(usize),

    #[error("unexpected end of document inside an element")]
    UnexpectedEof,

    #[error("end tag without matching start tag")]
    UnmatchedEndTag,
}

/// How emitted chunks carry their document context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Repeat the recorded ancestor start tags around the matched element
    /// and synthesize the corresponding closing tags
    Wrap,

    /// Emit the matched element alone, with inherited namespace bindings
    /// spliced into its start tag
    Inject,
}

/// A start or empty tag, reduced to what the match engine needs
struct StartData {
    name: XmlName,
    declared: Vec<(Prefix, String)>,
    span: Range<usize>,
}

enum RawEvent {
    Start(StartData),
    Empty(StartData),
    End(XmlName),
    Eof,
    Other,
}

/// Splits an XML stream into standalone fragments, one per element matched
/// by a [`Selector`].
///
/// The splitter pulls events from the stream lazily; each call to
/// [`Iterator::next`] reads just far enough to produce the next fragment.
/// Fragments are emitted in the document order of their start tags and
/// reproduce the matched element's source text verbatim. The splitter does
/// not own the input stream; [`into_inner`](Self::into_inner) hands it back.
pub struct SelectorSplitter<R> {
    reader: NsReader<BufReader<WindowRead<R>>>,
    buf: Vec<u8>,
    selector: Selector,
    mode: Mode,

    /// Current position in the selector
    index: usize,
    /// Current element nesting depth; the root is at depth 1
    depth: usize,
    /// Depth of the most recent match, counted down while ascending out of
    /// it; -1 while no match is active
    track_depth: isize,
    backtrack: bool,
    /// Absolute byte position up to which the stream has been captured
    consumed: usize,

    /// Names of the currently open ancestors
    path: Vec<XmlName>,
    /// In-scope bindings per open ancestor (inject mode)
    scopes: Vec<NamespaceScope>,
    /// Verbatim text per recorded opening (wrap mode)
    openings: Vec<String>,
    opening_log: Vec<XmlName>,

    decl_re: Regex,
    finished: bool,
}

impl<R: Read> SelectorSplitter<R> {
    /// Create a splitter over the given byte stream
    pub fn new(selector: Selector, mode: Mode, input: R) -> Result<Self, SplitterError> {
        let reader = NsReader::from_reader(BufReader::new(WindowRead::new(input)));
        let pos = reader.buffer_position();
        if pos != 0 {
            return Err(SplitterError::ReaderPosition(pos));
        }

        Ok(Self {
            reader,
            buf: Vec::new(),
            selector,
            mode,
            index: 0,
            depth: 0,
            track_depth: -1,
            backtrack: false,
            consumed: 0,
            path: Vec::new(),
            scopes: Vec::new(),
            openings: Vec::new(),
            opening_log: Vec::new(),
            decl_re: ns_decl_regex(),
            finished: false,
        })
    }

    /// Compile `path` against the given prefix bindings and create a
    /// splitter over the byte stream
    pub fn from_path(
        path: &str,
        bindings: Option<&HashMap<String, String>>,
        mode: Mode,
        input: R,
    ) -> Result<Self, SplitterError> {
        Self::new(Selector::parse(path, bindings)?, mode, input)
    }

    /// Release the parser and return the underlying byte stream
    pub fn into_inner(self) -> R {
        self.reader.into_inner().into_inner().into_inner()
    }

    fn is_descendant(&self) -> bool {
        self.selector.is_descendant_axis(self.index)
    }

    fn current(&self) -> Option<&NameMatcher> {
        self.selector
            .entry(self.index + usize::from(self.is_descendant()))
    }

    fn is_bottom(&self) -> bool {
        self.index + if self.is_descendant() { 2 } else { 1 } == self.selector.len()
    }

    fn down(&mut self) {
        if self.is_descendant() {
            self.index += 1;
        }
        self.index += 1;
    }

    fn decode_span(&self, span: Range<usize>) -> Result<String, SplitterError> {
        let bytes = self.reader.get_ref().get_ref().window().get_bytes(span)?;
        Ok(self.reader.decoder().decode(&bytes)?.into_owned())
    }

    fn advance_window(&mut self) -> Result<(), SplitterError> {
        let consumed = self.consumed;
        self.reader
            .get_mut()
            .get_mut()
            .window_mut()
            .advance_to(consumed)?;
        Ok(())
    }

    /// Read the next event and reduce it to owned data
    fn advance(&mut self) -> Result<RawEvent, SplitterError> {
        self.buf.clear();
        let start = self.reader.buffer_position();
        let event = self.reader.read_event_into(&mut self.buf)?;
        let end = self.reader.buffer_position();

        let raw = match event {
            Event::Start(e) => {
                let name = resolve_name(&self.reader, e.name())?;
                let declared = if self.mode == Mode::Inject {
                    declared_bindings(&e, &self.reader)?
                } else {
                    Vec::new()
                };
                RawEvent::Start(StartData {
                    name,
                    declared,
                    span: start..end,
                })
            }
            Event::Empty(e) => {
                let name = resolve_name(&self.reader, e.name())?;
                let declared = if self.mode == Mode::Inject {
                    declared_bindings(&e, &self.reader)?
                } else {
                    Vec::new()
                };
                RawEvent::Empty(StartData {
                    name,
                    declared,
                    span: start..end,
                })
            }
            Event::End(e) => RawEvent::End(resolve_name(&self.reader, e.name())?),
            Event::Eof => RawEvent::Eof,
            _ => RawEvent::Other,
        };

        Ok(raw)
    }

    /// Pull events until the next chunk has been assembled or the document
    /// ends
    fn next_chunk(&mut self) -> Result<Option<String>, SplitterError> {
        loop {
            match self.advance()? {
                RawEvent::Start(start) => {
                    self.depth += 1;
                    trace!(
                        name = %start.name,
                        depth = self.depth,
                        track_depth = self.track_depth,
                        "start element"
                    );
                    if let Some(chunk) = self.handle_start(start)? {
                        return Ok(Some(chunk));
                    }
                }
                RawEvent::Empty(start) => {
                    if let Some(chunk) = self.handle_empty(start)? {
                        return Ok(Some(chunk));
                    }
                }
                RawEvent::End(name) => {
                    trace!(name = %name, depth = self.depth, "end element");
                    self.depth = self
                        .depth
                        .checked_sub(1)
                        .ok_or(SplitterError::UnmatchedEndTag)?;
                    self.handle_end(&name);
                }
                RawEvent::Eof => {
                    return if self.depth == 0 {
                        Ok(None)
                    } else {
                        Err(SplitterError::UnexpectedEof)
                    };
                }
                RawEvent::Other => {}
            }
        }
    }

    fn handle_start(&mut self, start: StartData) -> Result<Option<String>, SplitterError> {
        let StartData {
            name,
            declared,
            span,
        } = start;
        let was_backtrack = self.backtrack;
        self.backtrack = false;

        let matched = self.current().map_or(false, |m| m.matches(&name));
        if matched && self.is_bottom() {
            let end = self.read_subtree()?;
            let chunk = self.emit_chunk(&declared, span.start, end, was_backtrack)?;
            return Ok(Some(chunk));
        }

        self.record_opening(&name, &declared, &span, was_backtrack)?;
        if matched {
            self.down();
        } else if !self.is_descendant() {
            self.skip_subtree()?;
        }
        Ok(None)
    }

    /// A self-closing tag is a start immediately followed by its end at the
    /// same position
    fn handle_empty(&mut self, start: StartData) -> Result<Option<String>, SplitterError> {
        let StartData {
            name,
            declared,
            span,
        } = start;
        self.depth += 1;
        trace!(
            name = %name,
            depth = self.depth,
            track_depth = self.track_depth,
            "empty element"
        );
        let was_backtrack = self.backtrack;
        self.backtrack = false;

        let matched = self.current().map_or(false, |m| m.matches(&name));
        if matched && self.is_bottom() {
            self.depth -= 1;
            let chunk = self.emit_chunk(&declared, span.start, span.end, was_backtrack)?;
            return Ok(Some(chunk));
        }

        self.record_opening(&name, &declared, &span, was_backtrack)?;
        if matched {
            self.down();
        }
        self.depth -= 1;
        self.handle_end(&name);
        Ok(None)
    }

    /// Capture the text between the previous checkpoint and the end of this
    /// start tag and push the element onto the context stacks
    fn record_opening(
        &mut self,
        name: &XmlName,
        declared: &[(Prefix, String)],
        span: &Range<usize>,
        was_backtrack: bool,
    ) -> Result<(), SplitterError> {
        if self.mode == Mode::Wrap {
            // when a level is re-entered while backtracking, the stale text
            // between the previous sibling and this tag is dropped
            let from = if was_backtrack { span.start } else { self.consumed };
            let opening = self.decode_span(from..span.end)?;
            self.openings.push(opening);
            self.opening_log.push(name.clone());
        }
        self.consumed = span.end;
        self.advance_window()?;

        self.path.push(name.clone());
        if self.mode == Mode::Inject {
            let scope = child_scope(self.scopes.last(), declared);
            self.scopes.push(scope);
        }
        Ok(())
    }

    /// Assemble the chunk for a match whose subtree has been fully read.
    /// `tag_start..end` is the byte span of the matched element.
    fn emit_chunk(
        &mut self,
        declared: &[(Prefix, String)],
        tag_start: usize,
        end: usize,
        was_backtrack: bool,
    ) -> Result<String, SplitterError> {
        let lead = if self.mode == Mode::Wrap && !was_backtrack {
            self.decode_span(self.consumed..tag_start)?
        } else {
            String::new()
        };
        let raw = self.decode_span(tag_start..end)?;

        let chunk = match self.mode {
            Mode::Wrap => wrap_fragment(&self.openings, &lead, &raw, &self.path),
            Mode::Inject => {
                let scope = child_scope(self.scopes.last(), declared);
                inject_bindings(&raw, &scope, &self.decl_re)
            }
        };

        self.consumed = end;
        self.advance_window()?;
        self.backtrack = true;
        self.track_depth = self.depth as isize;
        trace!(depth = self.depth, index = self.index, "chunk emitted");
        Ok(chunk)
    }

    fn handle_end(&mut self, name: &XmlName) {
        self.path.pop();
        if self.mode == Mode::Inject {
            self.scopes.pop();
        }

        if self.backtrack || (self.track_depth > 0 && self.depth as isize == self.track_depth - 1)
        {
            self.backtrack = true;
            self.track_depth -= 1;

            if self.mode == Mode::Wrap {
                // drop recorded openings down to and including this element
                while let Some(top) = self.opening_log.pop() {
                    self.openings.pop();
                    if top == *name {
                        break;
                    }
                }
            }

            if self.index > 0 {
                let ascend = self
                    .selector
                    .entry(self.index - 1)
                    .map_or(true, |m| m.matches(name));
                if ascend {
                    self.index -= 1;
                }
            }
        }
    }

    /// Consume events up to and including the end tag of the current
    /// element, leaving the selector untouched, then process that end tag
    fn skip_subtree(&mut self) -> Result<(), SplitterError> {
        let target = self.depth;
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf)?;
            match event {
                Event::Start(_) => self.depth += 1,
                Event::End(e) => {
                    self.depth = self
                        .depth
                        .checked_sub(1)
                        .ok_or(SplitterError::UnmatchedEndTag)?;
                    if self.depth + 1 == target {
                        let name = resolve_name(&self.reader, e.name())?;
                        self.handle_end(&name);
                        return Ok(());
                    }
                }
                Event::Eof => return Err(SplitterError::UnexpectedEof),
                _ => {}
            }
        }
    }

    /// Consume events up to and including the end tag of the current
    /// element and return the byte position just past it
    fn read_subtree(&mut self) -> Result<usize, SplitterError> {
        let target = self.depth;
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf)?;
            match event {
                Event::Start(_) => self.depth += 1,
                Event::End(_) => {
                    self.depth = self
                        .depth
                        .checked_sub(1)
                        .ok_or(SplitterError::UnmatchedEndTag)?;
                    if self.depth + 1 == target {
                        return Ok(self.reader.buffer_position());
                    }
                }
                Event::Eof => return Err(SplitterError::UnexpectedEof),
                _ => {}
            }
        }
    }
}

impl<R: Read> Iterator for SelectorSplitter<R> {
    type Item = Result<String, SplitterError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Expand an element name through the reader's namespace resolver
fn resolve_name<R>(
    reader: &NsReader<R>,
    qname: QName,
) -> Result<XmlName, SplitterError> {
    let (resolution, local) = reader.resolve_element(qname);
    let namespace = match resolution {
        ResolveResult::Unbound => String::new(),
        ResolveResult::Bound(Namespace(uri)) => reader.decoder().decode(uri)?.into_owned(),
        ResolveResult::Unknown(prefix) => {
            return Err(SplitterError::UnboundPrefix(
                String::from_utf8_lossy(&prefix).into_owned(),
            ))
        }
    };
    let local = reader.decoder().decode(local.into_inner())?.into_owned();
    let prefix = match qname.prefix() {
        Some(p) => Some(reader.decoder().decode(p.into_inner())?.into_owned()),
        None => None,
    };
    Ok(XmlName {
        namespace,
        local,
        prefix,
    })
}
