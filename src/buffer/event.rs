//! Buffered event views

use crate::core::names::split_name;
use crate::core::QName;
use std::borrow::Cow;

/// One recorded event
///
/// Borrowed during shared replay, owned during release replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferedEvent<'a> {
    StartDocument,
    EndDocument,
    StartElement {
        uri: Cow<'a, str>,
        local: Cow<'a, str>,
        /// Lexical name as originally seen, if known
        qname: Option<Cow<'a, str>>,
    },
    /// Always follows its start element or a sibling attribute
    Attribute {
        uri: Cow<'a, str>,
        local: Cow<'a, str>,
        qname: Option<Cow<'a, str>>,
        /// Attribute type, `CDATA` unless recorded otherwise
        kind: Cow<'a, str>,
        value: Cow<'a, str>,
    },
    EndElement,
    Characters(Cow<'a, str>),
    PrefixMapping {
        prefix: Cow<'a, str>,
        uri: Cow<'a, str>,
    },
}

impl BufferedEvent<'_> {
    /// Element or attribute name, carrying the hint's prefix
    pub fn name(&self) -> Option<QName> {
        match self {
            BufferedEvent::StartElement { uri, local, qname }
            | BufferedEvent::Attribute { uri, local, qname, .. } => Some(hinted_name(uri, local, qname.as_deref())),
            _ => None,
        }
    }

    pub fn into_owned(self) -> BufferedEvent<'static> {
        let own = |c: Cow<'_, str>| Cow::Owned(c.into_owned());
        match self {
            BufferedEvent::StartDocument => BufferedEvent::StartDocument,
            BufferedEvent::EndDocument => BufferedEvent::EndDocument,
            BufferedEvent::StartElement { uri, local, qname } => BufferedEvent::StartElement {
                uri: own(uri),
                local: own(local),
                qname: qname.map(own),
            },
            BufferedEvent::Attribute {
                uri,
                local,
                qname,
                kind,
                value,
            } => BufferedEvent::Attribute {
                uri: own(uri),
                local: own(local),
                qname: qname.map(own),
                kind: own(kind),
                value: own(value),
            },
            BufferedEvent::EndElement => BufferedEvent::EndElement,
            BufferedEvent::Characters(text) => BufferedEvent::Characters(own(text)),
            BufferedEvent::PrefixMapping { prefix, uri } => BufferedEvent::PrefixMapping {
                prefix: own(prefix),
                uri: own(uri),
            },
        }
    }
}

/// Name whose prefix is taken from a lexical hint
pub(crate) fn hinted_name(uri: &str, local: &str, hint: Option<&str>) -> QName {
    let name = QName::new(uri, local);
    match hint.map(split_name) {
        Some((Some(prefix), _)) => name.with_prefix(prefix),
        _ => name,
    }
}
