//! SAX Event Types
//!
//! Owned form of the events delivered to an [`EventSink`](super::EventSink).

use crate::core::{Attributes, QName};

/// A SAX event as received by a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaxEvent {
    StartDocument,
    EndDocument,
    PrefixMapping {
        prefix: String,
        uri: String,
    },
    StartElement {
        name: QName,
        attributes: Attributes,
    },
    EndElement {
        name: QName,
    },
    Characters(String),
}

impl SaxEvent {
    /// Check if this is a start element event
    #[inline]
    pub fn is_start_element(&self) -> bool {
        matches!(self, SaxEvent::StartElement { .. })
    }

    /// Check if this is an end element event
    #[inline]
    pub fn is_end_element(&self) -> bool {
        matches!(self, SaxEvent::EndElement { .. })
    }

    /// Get the element name if this is a start or end element
    pub fn element_name(&self) -> Option<&QName> {
        match self {
            SaxEvent::StartElement { name, .. } | SaxEvent::EndElement { name } => Some(name),
            _ => None,
        }
    }

    /// Compact one-line form, handy in assertions: `<a`, `>a`, `"text"`
    pub fn summary(&self) -> String {
        match self {
            SaxEvent::StartDocument => "start-document".to_string(),
            SaxEvent::EndDocument => "end-document".to_string(),
            SaxEvent::PrefixMapping { prefix, uri } => format!("xmlns:{}={}", prefix, uri),
            SaxEvent::StartElement { name, .. } => format!("<{}", name),
            SaxEvent::EndElement { name } => format!(">{}", name),
            SaxEvent::Characters(text) => format!("{:?}", text),
        }
    }
}
