//! XML Event Types
//!
//! Event types for pull-parser style XML processing. Names arrive resolved
//! against the in-scope namespace declarations.

use crate::core::{Attributes, NamespaceDecl, QName};
use std::fmt;

/// XML parsing event as seen through a token cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Before the first token
    StartDocument,
    /// Start of an element: `<name attrs...>` (empty elements are split
    /// into a start and an end event)
    StartElement(StartElement),
    /// End of an element: `</name>`
    EndElement(QName),
    /// Character data (text, CDATA, or a resolved entity reference)
    Characters(String),
    /// Input exhausted
    EndDocument,
}

/// Start element event data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartElement {
    pub name: QName,
    /// Attributes other than namespace declarations
    pub attributes: Attributes,
    /// `xmlns` declarations made on this tag
    pub namespaces: Vec<NamespaceDecl>,
}

impl StartElement {
    pub fn new(name: QName, attributes: Attributes) -> Self {
        StartElement {
            name,
            attributes,
            namespaces: Vec::new(),
        }
    }
}

impl XmlEvent {
    /// Check if this is a start element event
    pub fn is_start_element(&self) -> bool {
        matches!(self, XmlEvent::StartElement(_))
    }

    /// Check if this is an end element event
    pub fn is_end_element(&self) -> bool {
        matches!(self, XmlEvent::EndElement(_))
    }

    /// Get as start element if applicable
    pub fn as_start_element(&self) -> Option<&StartElement> {
        match self {
            XmlEvent::StartElement(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if applicable
    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlEvent::Characters(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for XmlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlEvent::StartDocument => write!(f, "start of document"),
            XmlEvent::StartElement(e) => write!(f, "<{}>", e.name),
            XmlEvent::EndElement(name) => write!(f, "</{}>", name),
            XmlEvent::Characters(_) => write!(f, "character data"),
            XmlEvent::EndDocument => write!(f, "end of document"),
        }
    }
}
