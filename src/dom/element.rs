//! Materialized Elements
//!
//! An owned element tree that serializers build eagerly and hand to the
//! writer in one piece.

use crate::core::{Attributes, QName};

/// One piece of element content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Element(Element),
}

/// Element with qualified name, ordered attributes and mixed content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Attributes,
    pub content: Vec<Content>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Element {
            name,
            attributes: Attributes::new(),
            content: Vec::new(),
        }
    }

    /// Element without a namespace
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(QName::local(local))
    }

    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.insert(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.content.push(Content::Element(child));
        self
    }

    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        self.attributes.insert(name, value);
    }

    pub fn attribute(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes.get(namespace, local)
    }

    /// Append text, merging with a trailing text run
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        match self.content.last_mut() {
            Some(Content::Text(last)) => last.push_str(&text),
            _ => self.content.push(Content::Text(text)),
        }
    }

    pub fn push_child(&mut self, child: Element) {
        self.content.push(Content::Element(child));
    }

    /// Child elements in document order
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.content.iter().filter_map(|c| match c {
            Content::Element(e) => Some(e),
            Content::Text(_) => None,
        })
    }

    /// First child element with the given name
    pub fn child(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.children().find(|e| e.name.matches(namespace, local))
    }

    /// Concatenation of the direct text content
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::Text(t) => Some(t.as_str()),
                Content::Element(_) => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_runs_merge() {
        let mut e = Element::local("p");
        e.push_text("a");
        e.push_text("");
        e.push_text("b");
        e.push_child(Element::local("br"));
        e.push_text("c");
        assert_eq!(e.content.len(), 3);
        assert_eq!(e.text(), "abc");
    }

    #[test]
    fn test_child_lookup() {
        let e = Element::new(QName::new("urn:x", "root"))
            .with_child(Element::new(QName::new("urn:x", "a")).with_text("1"))
            .with_child(Element::local("a").with_text("2"));
        assert_eq!(e.child("", "a").map(Element::text), Some("2".to_string()));
        assert_eq!(e.child("urn:x", "a").map(Element::text), Some("1".to_string()));
        assert_eq!(e.children().count(), 2);
    }
}
