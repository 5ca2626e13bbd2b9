//! Streaming Writer
//!
//! Emits markup directly to a byte sink while tracking the open elements and
//! one namespace-scope layer per open element. Prefixes come from, in order:
//! a global binding in the config, a binding already in scope, the name's
//! own prefix hint, and finally a fresh `nsN` declared on the start tag.

use super::config::WriterConfig;
use super::scope::NamespaceScopes;
use crate::core::entities::write_escaped;
use crate::core::{ns, Escape, NamespaceDecl, QName};
use crate::dom::{Content, Document, Element, NodeId, NodeKind};
use crate::error::{BindError, Result};
use crate::registry::{Registry, Serializer};
use crate::sax::EventSink;
use crate::core::Attributes;
use std::any::Any;
use std::io::Write;

/// An element whose end tag is still owed
#[derive(Debug)]
struct Frame {
    lexical: String,
    has_children: bool,
    has_text: bool,
}

/// Writer session over one byte sink
///
/// Elements left open are closed by [`StreamWriter::end_document`], by
/// [`StreamWriter::finish`], or when the writer is dropped.
pub struct StreamWriter<'w> {
    out: &'w mut dyn Write,
    registry: Option<&'w Registry>,
    config: WriterConfig,
    open: Vec<Frame>,
    scopes: NamespaceScopes,
    /// Last synthesized `nsN` suffix
    next_ns: usize,
    /// A start tag is written up to its attributes, `>` still pending
    tag_open: bool,
    /// Prefix mappings announced for the next start tag
    pending: Vec<NamespaceDecl>,
    started: bool,
    finished: bool,
}

impl<'w> StreamWriter<'w> {
    pub fn new(out: &'w mut dyn Write, config: WriterConfig) -> Self {
        StreamWriter {
            out,
            registry: None,
            config,
            open: Vec::new(),
            scopes: NamespaceScopes::new(),
            next_ns: 0,
            tag_open: false,
            pending: Vec::new(),
            started: false,
            finished: false,
        }
    }

    /// Use `registry` to find serializers for nested objects
    pub fn with_registry(mut self, registry: &'w Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn registry(&self) -> Option<&'w Registry> {
        self.registry
    }

    pub fn scopes(&self) -> &NamespaceScopes {
        &self.scopes
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn write_start_document(&mut self) -> Result<()> {
        if self.config.declaration {
            write!(
                self.out,
                "<?xml version=\"1.0\" encoding=\"{}\"?>",
                self.config.encoding.label()
            )?;
            self.started = true;
        }
        Ok(())
    }

    pub fn write_start_element(&mut self, name: &QName) -> Result<()> {
        self.check_pending(name)?;
        self.close_start_tag()?;
        let mixed = match self.open.last_mut() {
            Some(parent) => {
                parent.has_children = true;
                parent.has_text
            }
            None => false,
        };
        if !mixed {
            self.indent(self.open.len())?;
        }

        self.scopes.push_scope();
        let mut decls = std::mem::take(&mut self.pending);
        for decl in &decls {
            self.scopes.declare(&decl.prefix, &decl.uri);
        }
        let prefix = if name.namespace.is_empty() {
            if !self.scopes.default_namespace().is_empty() {
                self.bind("", "", &mut decls);
            }
            String::new()
        } else {
            self.resolve_prefix(&name.namespace, name.prefix.as_deref(), true, &mut decls)
        };
        let lexical = lexical(&prefix, &name.local);

        self.out.write_all(b"<")?;
        self.config.encoding.write_markup(&mut *self.out, &lexical)?;
        for decl in &decls {
            self.write_decl(decl)?;
        }

        self.open.push(Frame {
            lexical,
            has_children: false,
            has_text: false,
        });
        self.tag_open = true;
        self.started = true;
        Ok(())
    }

    /// Write an attribute on the start tag just written
    pub fn write_attribute(&mut self, name: &QName, value: &str) -> Result<()> {
        if !self.tag_open {
            return Err(BindError::protocol(format!(
                "attribute {} written outside a start tag",
                name
            )));
        }
        let mut decls = Vec::new();
        let prefix = if name.namespace.is_empty() {
            String::new()
        } else {
            self.resolve_prefix(&name.namespace, name.prefix.as_deref(), false, &mut decls)
        };
        for decl in &decls {
            self.write_decl(decl)?;
        }
        self.out.write_all(b" ")?;
        self.config
            .encoding
            .write_markup(&mut *self.out, &lexical(&prefix, &name.local))?;
        self.out.write_all(b"=\"")?;
        write_escaped(&mut *self.out, value, Escape::Attribute, self.config.encoding)?;
        self.out.write_all(b"\"")?;
        Ok(())
    }

    /// Declare a namespace on the open start tag, or on the next one
    pub fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        let decl = NamespaceDecl {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        };
        if !self.tag_open {
            self.pending.push(decl);
            return Ok(());
        }
        if self.scopes.resolve(prefix) == Some(uri) {
            return Ok(());
        }
        if self.scopes.declared_here(prefix) {
            return Err(BindError::protocol(format!(
                "prefix {:?} already declared on this start tag",
                prefix
            )));
        }
        self.scopes.declare(prefix, uri);
        self.write_decl(&decl)
    }

    pub fn write_characters(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let Some(frame) = self.open.last_mut() else {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(BindError::protocol("character data outside the root element"));
        };
        frame.has_text = true;
        self.close_start_tag()?;
        let mode = if self.config.escape_text {
            Escape::Text
        } else {
            Escape::None
        };
        write_escaped(&mut *self.out, text, mode, self.config.encoding)?;
        Ok(())
    }

    /// Close the innermost open element
    ///
    /// # Panics
    ///
    /// Panics when no element is open; unbalanced calls are a bug in the
    /// caller, not an input error.
    pub fn write_end_element(&mut self) -> Result<()> {
        let Some(frame) = self.open.pop() else {
            panic!("write_end_element called with no open element");
        };
        self.close_frame(frame)
    }

    /// Close the innermost open element, failing instead of panicking
    pub fn try_end_element(&mut self) -> Result<()> {
        match self.open.pop() {
            Some(frame) => self.close_frame(frame),
            None => Err(BindError::protocol("end tag with no open element")),
        }
    }

    /// Write a complete materialized element
    pub fn write_element(&mut self, element: &Element) -> Result<()> {
        self.open_element(element)?;
        self.write_end_element()
    }

    /// Write a node of a fallback document and everything below it
    pub fn write_node(&mut self, doc: &Document, id: NodeId) -> Result<()> {
        let Some(node) = doc.node(id) else {
            return Err(BindError::protocol(format!("no node {}", id)));
        };
        match node.kind() {
            NodeKind::Document => {
                for &child in node.children() {
                    self.write_node(doc, child)?;
                }
            }
            NodeKind::Element { name, attributes } => {
                self.write_start_element(name)?;
                self.write_attributes(attributes)?;
                for &child in node.children() {
                    self.write_node(doc, child)?;
                }
                self.write_end_element()?;
            }
            NodeKind::Text(text) => self.write_characters(text)?,
        }
        Ok(())
    }

    /// Write an object through its registered serializer
    pub fn write_object<T: 'static>(&mut self, object: &T) -> Result<()> {
        self.write_any(object)
    }

    /// Write a type-erased object through its registered serializer
    ///
    /// The serializer is looked up by the object's concrete type among the
    /// namespaces the config accepts.
    pub fn write_any(&mut self, object: &dyn Any) -> Result<()> {
        let Some(registry) = self.registry else {
            return Err(BindError::serialize::<dyn Any>("writer has no registry"));
        };
        let type_id = (*object).type_id();
        let entry = registry
            .serializer_in(type_id, &self.config.namespaces)
            .ok_or_else(|| BindError::serialize::<dyn Any>(format!("no serializer registered for {:?}", type_id)))?;
        entry.write(object, self)
    }

    /// Write `object` with a specific serializer
    ///
    /// The element from `create_element` is written with its attributes and
    /// content, followed by `write_child_elements`, then the end tag.
    pub fn write_with<S: Serializer + ?Sized>(&mut self, serializer: &S, object: &S::Input) -> Result<()> {
        let mut element = serializer
            .create_element(object, &self.config.namespaces)
            .ok_or_else(|| BindError::serialize::<S::Input>("serializer created no element"))?;
        serializer.initialize_element(&mut element, object, self)?;
        self.open_element(&element)?;
        serializer.write_child_elements(object, self)?;
        self.write_end_element()
    }

    /// Close every open element and flush
    pub fn end_document(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        while let Some(frame) = self.open.pop() {
            self.close_frame(frame)?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// End the document and release the sink
    pub fn finish(mut self) -> Result<()> {
        self.end_document()
    }

    fn open_element(&mut self, element: &Element) -> Result<()> {
        self.write_start_element(&element.name)?;
        self.write_attributes(&element.attributes)?;
        for content in &element.content {
            match content {
                Content::Text(text) => self.write_characters(text)?,
                Content::Element(child) => self.write_element(child)?,
            }
        }
        Ok(())
    }

    fn write_attributes(&mut self, attributes: &Attributes) -> Result<()> {
        for attr in attributes {
            self.write_attribute(&attr.name, &attr.value)?;
        }
        Ok(())
    }

    fn close_frame(&mut self, frame: Frame) -> Result<()> {
        if self.tag_open {
            self.tag_open = false;
            self.out.write_all(b"/>")?;
        } else {
            if frame.has_children && !frame.has_text {
                self.indent(self.open.len())?;
            }
            self.out.write_all(b"</")?;
            self.config.encoding.write_markup(&mut *self.out, &frame.lexical)?;
            self.out.write_all(b">")?;
        }
        self.scopes.pop_scope();
        Ok(())
    }

    fn close_start_tag(&mut self) -> Result<()> {
        if self.tag_open {
            self.tag_open = false;
            self.out.write_all(b">")?;
        }
        Ok(())
    }

    fn indent(&mut self, level: usize) -> Result<()> {
        if let Some(width) = self.config.indent {
            if self.started {
                write!(self.out, "\n{:1$}", "", width * level)?;
            }
        }
        Ok(())
    }

    /// Find or create a prefix for `uri` in the current layer
    fn resolve_prefix(
        &mut self,
        uri: &str,
        hint: Option<&str>,
        allow_default: bool,
        decls: &mut Vec<NamespaceDecl>,
    ) -> String {
        if uri == ns::XML {
            return "xml".to_string();
        }
        if let Some(prefix) = self.config.global_prefix(uri) {
            if allow_default || !prefix.is_empty() {
                let prefix = prefix.to_string();
                if self.scopes.resolve(&prefix) == Some(uri) {
                    return prefix;
                }
                if !self.scopes.declared_here(&prefix) {
                    self.bind(&prefix, uri, decls);
                    return prefix;
                }
            }
        }
        if let Some(prefix) = self.scopes.prefix_for(uri, allow_default) {
            return prefix.to_string();
        }
        if let Some(hint) = hint {
            let usable = hint != "xml" && hint != "xmlns" && (allow_default || !hint.is_empty());
            if usable && !self.scopes.declared_here(hint) {
                self.bind(hint, uri, decls);
                return hint.to_string();
            }
        }
        loop {
            self.next_ns += 1;
            let prefix = format!("ns{}", self.next_ns);
            if self.scopes.resolve(&prefix).is_none() {
                self.bind(&prefix, uri, decls);
                return prefix;
            }
        }
    }

    /// Reject pending mappings that cannot all go on the start tag of `name`
    fn check_pending(&mut self, name: &QName) -> Result<()> {
        let conflict = self.pending.iter().enumerate().find_map(|(i, decl)| {
            if self.pending[..i].iter().any(|d| d.prefix == decl.prefix) {
                Some(format!("prefix {:?} mapped twice on <{}>", decl.prefix, name))
            } else if decl.prefix.is_empty() && !decl.uri.is_empty() && name.namespace.is_empty() {
                Some(format!(
                    "default namespace {} mapped on unqualified element <{}>",
                    decl.uri, name
                ))
            } else {
                None
            }
        });
        match conflict {
            Some(msg) => {
                self.pending.clear();
                Err(BindError::protocol(msg))
            }
            None => Ok(()),
        }
    }

    fn bind(&mut self, prefix: &str, uri: &str, decls: &mut Vec<NamespaceDecl>) {
        self.scopes.declare(prefix, uri);
        decls.push(NamespaceDecl {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
    }

    fn write_decl(&mut self, decl: &NamespaceDecl) -> Result<()> {
        if decl.prefix.is_empty() {
            self.out.write_all(b" xmlns=\"")?;
        } else {
            self.out.write_all(b" xmlns:")?;
            self.config.encoding.write_markup(&mut *self.out, &decl.prefix)?;
            self.out.write_all(b"=\"")?;
        }
        write_escaped(&mut *self.out, &decl.uri, Escape::Attribute, self.config.encoding)?;
        self.out.write_all(b"\"")?;
        Ok(())
    }
}

impl Drop for StreamWriter<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.end_document();
        }
    }
}

impl EventSink for StreamWriter<'_> {
    fn start_document(&mut self) -> Result<()> {
        self.write_start_document()
    }

    fn end_document(&mut self) -> Result<()> {
        StreamWriter::end_document(self)
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.pending.push(NamespaceDecl {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<()> {
        self.write_start_element(name)?;
        self.write_attributes(attributes)
    }

    fn end_element(&mut self, _name: &QName) -> Result<()> {
        self.try_end_element()
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.write_characters(text)
    }
}

fn lexical(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutputEncoding;
    use pretty_assertions::assert_eq;

    fn config() -> WriterConfig {
        WriterConfig::new().declaration(false)
    }

    fn render(config: WriterConfig, f: impl FnOnce(&mut StreamWriter<'_>)) -> String {
        let mut out = Vec::new();
        {
            let mut writer = StreamWriter::new(&mut out, config);
            f(&mut writer);
            writer.finish().unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_nesting_and_empty_tags() {
        let xml = render(config(), |w| {
            w.write_start_element(&QName::local("a")).unwrap();
            w.write_start_element(&QName::local("b")).unwrap();
            w.write_end_element().unwrap();
            w.write_characters("x").unwrap();
            w.write_end_element().unwrap();
        });
        assert_eq!(xml, "<a><b/>x</a>");
    }

    #[test]
    fn test_pending_default_namespace_on_unqualified_element_rejected() {
        let mut out = Vec::new();
        {
            let mut writer = StreamWriter::new(&mut out, config());
            writer.write_namespace("", "urn:d").unwrap();
            let result = writer.write_start_element(&QName::local("a"));
            assert!(matches!(result, Err(BindError::ProtocolViolation(_))));
            writer.start_prefix_mapping("p", "urn:p").unwrap();
            writer.start_prefix_mapping("p", "urn:q").unwrap();
            assert!(writer.write_start_element(&QName::new("urn:p", "b")).is_err());
        }
        assert_eq!(String::from_utf8(out).unwrap(), "");

        let xml = render(config(), |w| {
            w.write_namespace("", "urn:d").unwrap();
            w.write_start_element(&QName::new("urn:d", "a")).unwrap();
        });
        assert_eq!(xml, r#"<a xmlns="urn:d"/>"#);
    }

    #[test]
    fn test_declaration() {
        let xml = render(WriterConfig::new(), |w| {
            w.write_start_document().unwrap();
            w.write_start_element(&QName::local("a")).unwrap();
        });
        assert_eq!(xml, r#"<?xml version="1.0" encoding="UTF-8"?><a/>"#);
    }

    #[test]
    fn test_synthesized_prefix_reused_by_children() {
        let xml = render(config(), |w| {
            w.write_start_element(&QName::new("urn:x", "a")).unwrap();
            w.write_start_element(&QName::new("urn:x", "b")).unwrap();
        });
        assert_eq!(xml, r#"<ns1:a xmlns:ns1="urn:x"><ns1:b/></ns1:a>"#);
    }

    #[test]
    fn test_sibling_scopes_are_independent() {
        let xml = render(config(), |w| {
            w.write_start_element(&QName::local("r")).unwrap();
            for _ in 0..2 {
                w.write_start_element(&QName::new("urn:x", "c")).unwrap();
                w.write_end_element().unwrap();
            }
        });
        assert_eq!(
            xml,
            r#"<r><ns1:c xmlns:ns1="urn:x"/><ns2:c xmlns:ns2="urn:x"/></r>"#
        );
    }

    #[test]
    fn test_prefix_hint_and_global_binding() {
        let xml = render(config().bind_prefix("urn:g", "g"), |w| {
            w.write_start_element(&QName::new("urn:g", "a").with_prefix("h")).unwrap();
            w.write_start_element(&QName::new("urn:x", "b").with_prefix("x")).unwrap();
        });
        assert_eq!(xml, r#"<g:a xmlns:g="urn:g"><x:b xmlns:x="urn:x"/></g:a>"#);
    }

    #[test]
    fn test_attribute_namespaces() {
        let xml = render(config(), |w| {
            w.write_namespace("", "urn:d").unwrap();
            w.write_start_element(&QName::new("urn:d", "e")).unwrap();
            w.write_attribute(&QName::local("plain"), "1").unwrap();
            w.write_attribute(&QName::new("urn:d", "id"), "2").unwrap();
            w.write_attribute(&QName::new(ns::XML, "lang"), "en").unwrap();
        });
        assert_eq!(
            xml,
            r#"<e xmlns="urn:d" plain="1" xmlns:ns1="urn:d" ns1:id="2" xml:lang="en"/>"#
        );
    }

    #[test]
    fn test_default_namespace_undeclared_for_unqualified_child() {
        let xml = render(config(), |w| {
            w.write_namespace("", "urn:d").unwrap();
            w.write_start_element(&QName::new("urn:d", "a")).unwrap();
            w.write_start_element(&QName::local("b")).unwrap();
        });
        assert_eq!(xml, r#"<a xmlns="urn:d"><b xmlns=""/></a>"#);
    }

    #[test]
    fn test_escaping() {
        let xml = render(config(), |w| {
            w.write_start_element(&QName::local("a")).unwrap();
            w.write_attribute(&QName::local("q"), "say \"hi\" & <go>").unwrap();
            w.write_characters("a<b&c]]>d>").unwrap();
        });
        assert_eq!(
            xml,
            r#"<a q="say &quot;hi&quot; &amp; &lt;go>">a&lt;b&amp;c]]&gt;d></a>"#
        );
    }

    #[test]
    fn test_text_escaping_can_be_disabled() {
        let xml = render(config().escape_text(false), |w| {
            w.write_start_element(&QName::local("a")).unwrap();
            w.write_characters("<b>&amp;</b>").unwrap();
        });
        assert_eq!(xml, "<a><b>&amp;</b></a>");
    }

    #[test]
    fn test_unencodable_characters_become_references() {
        let xml = render(config().encoding(OutputEncoding::Ascii), |w| {
            w.write_start_element(&QName::local("a")).unwrap();
            w.write_attribute(&QName::local("v"), "ü").unwrap();
            w.write_characters("café").unwrap();
        });
        assert_eq!(xml, r#"<a v="&#252;">caf&#233;</a>"#);
    }

    #[test]
    fn test_drop_closes_open_elements() {
        let mut out = Vec::new();
        {
            let mut writer = StreamWriter::new(&mut out, config());
            writer.write_start_element(&QName::local("a")).unwrap();
            writer.write_start_element(&QName::local("b")).unwrap();
            writer.write_characters("t").unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "<a><b>t</b></a>");
    }

    #[test]
    #[should_panic(expected = "no open element")]
    fn test_unbalanced_end_panics() {
        let mut out = Vec::new();
        let mut writer = StreamWriter::new(&mut out, config());
        let _ = writer.write_end_element();
    }

    #[test]
    fn test_sink_end_without_start_is_error() {
        let mut out = Vec::new();
        let mut writer = StreamWriter::new(&mut out, config());
        assert!(EventSink::end_element(&mut writer, &QName::local("a")).is_err());
    }

    #[test]
    fn test_indentation() {
        let xml = render(config().indent(2), |w| {
            w.write_start_element(&QName::local("a")).unwrap();
            w.write_start_element(&QName::local("b")).unwrap();
            w.write_start_element(&QName::local("c")).unwrap();
            w.write_end_element().unwrap();
            w.write_end_element().unwrap();
            w.write_start_element(&QName::local("d")).unwrap();
            w.write_characters("t").unwrap();
            w.write_start_element(&QName::local("e")).unwrap();
        });
        assert_eq!(xml, "<a>\n  <b>\n    <c/>\n  </b>\n  <d>t<e/></d>\n</a>");
    }

    #[test]
    fn test_write_element_and_node() {
        let element = Element::local("r")
            .with_attribute(QName::local("k"), "v")
            .with_child(Element::new(QName::new("urn:x", "c").with_prefix("x")).with_text("1"))
            .with_text("tail");
        let direct = render(config(), |w| w.write_element(&element).unwrap());
        assert_eq!(direct, r#"<r k="v"><x:c xmlns:x="urn:x">1</x:c>tail</r>"#);

        let doc = Document::from_element(&element);
        let via_doc = render(config(), |w| w.write_node(&doc, crate::dom::DOCUMENT_NODE).unwrap());
        assert_eq!(via_doc, direct);
    }

    #[test]
    fn test_object_without_registry_fails() {
        let mut out = Vec::new();
        let mut writer = StreamWriter::new(&mut out, config());
        assert!(matches!(
            writer.write_object(&5u8),
            Err(BindError::SerializeFailure { .. })
        ));
    }
}
