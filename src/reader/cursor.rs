//! Token Cursors
//!
//! A cursor is a forward-only view of a token stream that tracks nesting
//! depth: at a start tag the depth includes that element, at an end tag it
//! no longer does. So the depth after an end tag always equals the depth
//! immediately before its matching start tag.

use super::events::{StartElement, XmlEvent};
use crate::core::entities::resolve_entity;
use crate::core::{Attributes, NamespaceDecl, QName};
use crate::error::{BindError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use std::io::BufRead;

/// Depth-tracked pull interface over XML tokens
pub trait TokenCursor {
    /// Token the cursor is positioned at
    fn current(&self) -> &XmlEvent;

    /// Move to the next token; a no-op once the document has ended
    fn advance(&mut self) -> Result<()>;

    /// Number of currently open elements
    fn depth(&self) -> usize;

    fn is_exhausted(&self) -> bool {
        matches!(self.current(), XmlEvent::EndDocument)
    }

    /// Advance until positioned at a start tag, end tag, or end of input
    fn next_tag(&mut self) -> Result<()> {
        loop {
            self.advance()?;
            match self.current() {
                XmlEvent::StartElement(_) | XmlEvent::EndElement(_) | XmlEvent::EndDocument => {
                    return Ok(())
                }
                _ => {}
            }
        }
    }
}

/// Cursor over a `quick-xml` namespace-aware reader
pub struct XmlCursor<R> {
    reader: NsReader<R>,
    /// Buffer for quick-xml events
    buf: Vec<u8>,
    current: XmlEvent,
    depth: usize,
    /// End event owed for an `<empty/>` element
    pending_end: Option<QName>,
}

impl<'a> XmlCursor<&'a [u8]> {
    /// Cursor over an in-memory document
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(xml: &'a str) -> Self {
        Self::new(NsReader::from_str(xml))
    }
}

impl<R: BufRead> XmlCursor<R> {
    /// Cursor over any buffered byte source (UTF-8)
    pub fn from_reader(reader: R) -> Self {
        Self::new(NsReader::from_reader(reader))
    }

    fn new(reader: NsReader<R>) -> Self {
        XmlCursor {
            reader,
            buf: Vec::with_capacity(1024),
            current: XmlEvent::StartDocument,
            depth: 0,
            pending_end: None,
        }
    }

    /// Read the next event from quick-xml and convert it
    fn read_next(&mut self) -> Result<XmlEvent> {
        if let Some(name) = self.pending_end.take() {
            return Ok(XmlEvent::EndElement(name));
        }

        loop {
            self.buf.clear();
            let (resolve, event) = self.reader.read_resolved_event_into(&mut self.buf)?;
            let namespace = namespace_uri(resolve)?;

            match event {
                Event::Start(e) => {
                    let start = read_start(&self.reader, namespace, &e)?;
                    return Ok(XmlEvent::StartElement(start));
                }
                Event::Empty(e) => {
                    let start = read_start(&self.reader, namespace, &e)?;
                    self.pending_end = Some(start.name.clone());
                    return Ok(XmlEvent::StartElement(start));
                }
                Event::End(e) => {
                    return Ok(XmlEvent::EndElement(qname(namespace, e.name())?));
                }
                Event::Text(e) => {
                    let text = e.decode().map_err(|e| BindError::Encoding(e.to_string()))?;
                    if !text.is_empty() {
                        return Ok(XmlEvent::Characters(text.into_owned()));
                    }
                }
                Event::CData(e) => {
                    let text = utf8(e.as_ref())?;
                    if !text.is_empty() {
                        return Ok(XmlEvent::Characters(text));
                    }
                }
                Event::GeneralRef(e) => {
                    let raw = e.decode().map_err(|e| BindError::Encoding(e.to_string()))?;
                    let text = resolve_entity(&raw)
                        .ok_or_else(|| BindError::Syntax(format!("unknown entity &{};", raw)))?;
                    return Ok(XmlEvent::Characters(text));
                }
                Event::Eof => return Ok(XmlEvent::EndDocument),
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
            }
        }
    }
}

impl<R: BufRead> TokenCursor for XmlCursor<R> {
    fn current(&self) -> &XmlEvent {
        &self.current
    }

    fn advance(&mut self) -> Result<()> {
        if matches!(self.current, XmlEvent::EndDocument) {
            return Ok(());
        }
        let next = self.read_next()?;
        match &next {
            XmlEvent::StartElement(_) => self.depth += 1,
            XmlEvent::EndElement(name) => {
                self.depth = self
                    .depth
                    .checked_sub(1)
                    .ok_or_else(|| BindError::protocol(format!("unmatched end tag </{}>", name)))?;
            }
            _ => {}
        }
        self.current = next;
        Ok(())
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

/// Build a start element, splitting namespace declarations from attributes
fn read_start<R>(
    reader: &NsReader<R>,
    namespace: String,
    e: &BytesStart<'_>,
) -> Result<StartElement> {
    let mut start = StartElement::new(qname(namespace, e.name())?, Attributes::new());

    for attr in e.attributes() {
        let attr = attr?;
        let key = attr.key;
        let value = attr
            .unescape_value()
            .map_err(|e| BindError::Syntax(e.to_string()))?
            .into_owned();

        if key.as_ref() == b"xmlns" {
            start.namespaces.push(NamespaceDecl {
                prefix: String::new(),
                uri: value,
            });
            continue;
        }
        if let Some(prefix) = key.prefix() {
            if prefix.as_ref() == b"xmlns" {
                start.namespaces.push(NamespaceDecl {
                    prefix: utf8(key.local_name().as_ref())?,
                    uri: value,
                });
                continue;
            }
        }

        let (resolve, _) = reader.resolver().resolve_attribute(key);
        let name = qname(namespace_uri(resolve)?, key)?;
        start.attributes.insert(name, value);
    }

    Ok(start)
}

fn qname(namespace: String, name: quick_xml::name::QName<'_>) -> Result<QName> {
    let local = utf8(name.local_name().as_ref())?;
    let qname = QName::new(namespace, local);
    match name.prefix() {
        Some(prefix) => Ok(qname.with_prefix(utf8(prefix.as_ref())?)),
        None => Ok(qname),
    }
}

/// Resolve a namespace from quick-xml's ResolveResult
fn namespace_uri(resolve: ResolveResult<'_>) -> Result<String> {
    match resolve {
        ResolveResult::Bound(ns) => utf8(ns.as_ref()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(BindError::Syntax(format!(
            "undeclared namespace prefix {:?}",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| BindError::Encoding(e.to_string()))
}
