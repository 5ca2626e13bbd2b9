//! Cursor replay
//!
//! Replays a buffer as a [`TokenCursor`], so anything that reads from a
//! live parser can read a recording instead. Prefixes that were never
//! recorded are rebuilt with the same scoped rules the writer uses: a
//! recorded lexical name wins, then a binding in scope, then a fresh `nsN`.

use super::event::BufferedEvent;
use super::event_buffer::{EventBuffer, Mark};
use crate::core::names::split_name;
use crate::core::{ns, NamespaceDecl, QName};
use crate::error::{BindError, Result};
use crate::reader::{StartElement, TokenCursor, XmlEvent};
use crate::writer::NamespaceScopes;

/// Token cursor over a recorded buffer
pub struct BufferCursor<'a> {
    buffer: &'a EventBuffer,
    mark: Mark,
    current: XmlEvent,
    depth: usize,
    scopes: NamespaceScopes,
    open: Vec<QName>,
    next_ns: usize,
    /// Scope of the element whose end tag is current, popped on advance
    pop_pending: bool,
    /// Event read while collecting attributes
    lookahead: Option<BufferedEvent<'a>>,
}

impl<'a> BufferCursor<'a> {
    pub(crate) fn new(buffer: &'a EventBuffer) -> Self {
        BufferCursor {
            buffer,
            mark: buffer.mark(),
            current: XmlEvent::StartDocument,
            depth: 0,
            scopes: NamespaceScopes::new(),
            open: Vec::new(),
            next_ns: 0,
            pop_pending: false,
            lookahead: None,
        }
    }

    fn next_event(&mut self) -> Result<Option<BufferedEvent<'a>>> {
        if let Some(event) = self.lookahead.take() {
            return Ok(Some(event));
        }
        self.buffer.next_from(&mut self.mark)
    }

    fn start_element(
        &mut self,
        uri: &str,
        local: &str,
        hint: Option<&str>,
        mappings: Vec<NamespaceDecl>,
    ) -> Result<StartElement> {
        self.scopes.push_scope();
        for decl in &mappings {
            self.scopes.declare(&decl.prefix, &decl.uri);
        }
        let mut start = StartElement::new(QName::default(), Default::default());
        start.namespaces = mappings;
        start.name = self.reconstruct(uri, local, hint, true, &mut start.namespaces);

        loop {
            match self.next_event()? {
                Some(BufferedEvent::Attribute {
                    uri,
                    local,
                    qname,
                    value,
                    ..
                }) => {
                    let name = if uri.is_empty() {
                        QName::new("", local.as_ref())
                    } else {
                        self.reconstruct(&uri, &local, qname.as_deref(), false, &mut start.namespaces)
                    };
                    start.attributes.insert(name, value.into_owned());
                }
                other => {
                    self.lookahead = other;
                    return Ok(start);
                }
            }
        }
    }

    /// Name for `uri`/`local` with a prefix valid in the current scope
    fn reconstruct(
        &mut self,
        uri: &str,
        local: &str,
        hint: Option<&str>,
        element: bool,
        decls: &mut Vec<NamespaceDecl>,
    ) -> QName {
        let name = QName::new(uri, local);
        if uri.is_empty() {
            if element && !self.scopes.default_namespace().is_empty() {
                self.bind("", "", decls);
            }
            return name;
        }
        if uri == ns::XML {
            return name.with_prefix("xml");
        }

        match hint.map(split_name) {
            Some((Some(prefix), _)) if prefix != "xmlns" => {
                if self.scopes.resolve(prefix) == Some(uri) {
                    return name.with_prefix(prefix);
                }
                if !self.scopes.declared_here(prefix) {
                    self.bind(prefix, uri, decls);
                    return name.with_prefix(prefix);
                }
            }
            Some((None, _)) if element => {
                if self.scopes.default_namespace() == uri {
                    return name;
                }
                if !self.scopes.declared_here("") {
                    self.bind("", uri, decls);
                    return name;
                }
            }
            _ => {}
        }

        if let Some(prefix) = self.scopes.prefix_for(uri, element) {
            let prefix = prefix.to_string();
            return name.with_prefix(prefix);
        }
        loop {
            self.next_ns += 1;
            let prefix = format!("ns{}", self.next_ns);
            if self.scopes.resolve(&prefix).is_none() {
                self.bind(&prefix, uri, decls);
                return name.with_prefix(prefix);
            }
        }
    }

    fn bind(&mut self, prefix: &str, uri: &str, decls: &mut Vec<NamespaceDecl>) {
        self.scopes.declare(prefix, uri);
        decls.push(NamespaceDecl {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
    }
}

impl TokenCursor for BufferCursor<'_> {
    fn current(&self) -> &XmlEvent {
        &self.current
    }

    fn advance(&mut self) -> Result<()> {
        if matches!(self.current, XmlEvent::EndDocument) {
            return Ok(());
        }
        if self.pop_pending {
            self.scopes.pop_scope();
            self.pop_pending = false;
        }

        let mut mappings = Vec::new();
        loop {
            let Some(event) = self.next_event()? else {
                self.current = XmlEvent::EndDocument;
                return Ok(());
            };
            match event {
                BufferedEvent::StartDocument => {}
                BufferedEvent::EndDocument => {
                    self.current = XmlEvent::EndDocument;
                    return Ok(());
                }
                BufferedEvent::PrefixMapping { prefix, uri } => mappings.push(NamespaceDecl {
                    prefix: prefix.into_owned(),
                    uri: uri.into_owned(),
                }),
                BufferedEvent::StartElement { uri, local, qname } => {
                    let start = self.start_element(&uri, &local, qname.as_deref(), mappings)?;
                    self.depth += 1;
                    self.open.push(start.name.clone());
                    self.current = XmlEvent::StartElement(start);
                    return Ok(());
                }
                BufferedEvent::Attribute { local, .. } => {
                    return Err(BindError::protocol(format!(
                        "attribute {} replayed outside a start tag",
                        local
                    )));
                }
                BufferedEvent::EndElement => {
                    let name = self
                        .open
                        .pop()
                        .ok_or_else(|| BindError::protocol("recorded end tag has no start tag"))?;
                    self.depth -= 1;
                    self.pop_pending = true;
                    self.current = XmlEvent::EndElement(name);
                    return Ok(());
                }
                BufferedEvent::Characters(text) => {
                    self.current = XmlEvent::Characters(text.into_owned());
                    return Ok(());
                }
            }
        }
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::XmlCursor;
    use pretty_assertions::assert_eq;

    fn events(buffer: &EventBuffer) -> Vec<(XmlEvent, usize)> {
        let mut cursor = buffer.cursor();
        let mut out = Vec::new();
        loop {
            cursor.advance().unwrap();
            if cursor.is_exhausted() {
                return out;
            }
            out.push((cursor.current().clone(), cursor.depth()));
        }
    }

    #[test]
    fn test_replays_recorded_subtree() {
        let mut cursor = XmlCursor::from_str(r#"<p:a xmlns:p="urn:p" p:k="v">t<b/></p:a>"#);
        cursor.next_tag().unwrap();
        let mut buffer = EventBuffer::new();
        buffer.record_subtree(&mut cursor).unwrap();

        let replayed = events(&buffer);
        let depths: Vec<usize> = replayed.iter().map(|(_, d)| *d).collect();
        assert_eq!(depths, [1, 1, 2, 1, 0]);

        let start = replayed[0].0.as_start_element().unwrap();
        assert_eq!(start.name, QName::new("urn:p", "a").with_prefix("p"));
        assert_eq!(start.namespaces, [NamespaceDecl { prefix: "p".into(), uri: "urn:p".into() }]);
        assert_eq!(start.attributes.get("urn:p", "k"), Some("v"));
        assert_eq!(replayed[1].0.as_text(), Some("t"));
    }

    #[test]
    fn test_missing_prefixes_are_synthesized_once() {
        let mut buffer = EventBuffer::new();
        buffer.push_start_element("urn:x", "a", None);
        buffer.push_attribute("urn:y", "k", None, "CDATA", "v").unwrap();
        buffer.push_start_element("urn:x", "b", None);
        buffer.push_end_element();
        buffer.push_end_element();

        let replayed = events(&buffer);
        let a = replayed[0].0.as_start_element().unwrap();
        assert_eq!(a.name.prefix.as_deref(), Some("ns1"));
        assert_eq!(
            a.attributes.iter().next().map(|attr| attr.name.prefix.clone()),
            Some(Some("ns2".to_string()))
        );
        assert_eq!(a.namespaces.len(), 2);

        let b = replayed[1].0.as_start_element().unwrap();
        assert_eq!(b.name.prefix.as_deref(), Some("ns1"));
        assert!(b.namespaces.is_empty());
    }

    #[test]
    fn test_unprefixed_hint_uses_default_namespace() {
        let mut buffer = EventBuffer::new();
        buffer.push_start_element("urn:d", "a", Some("a"));
        buffer.push_start_element("", "b", Some("b"));
        buffer.push_end_element();
        buffer.push_end_element();

        let replayed = events(&buffer);
        let a = replayed[0].0.as_start_element().unwrap();
        assert_eq!(a.name.prefix, None);
        assert_eq!(a.namespaces, [NamespaceDecl { prefix: "".into(), uri: "urn:d".into() }]);
        let b = replayed[1].0.as_start_element().unwrap();
        assert_eq!(b.namespaces, [NamespaceDecl { prefix: "".into(), uri: "".into() }]);
    }

    #[test]
    fn test_unbalanced_end_is_error() {
        let mut buffer = EventBuffer::new();
        buffer.push_end_element();
        let mut cursor = buffer.cursor();
        assert!(cursor.advance().is_err());
    }
}
