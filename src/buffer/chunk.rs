//! Chunk storage
//!
//! A chunk holds a fixed number of event slots split by field: one kind
//! byte per slot, string operands in one table, character data in one
//! string. Slots refer to their operands by index.

use super::event::BufferedEvent;
use std::borrow::Cow;

/// Recorded event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Kind {
    StartDocument,
    EndDocument,
    /// uri, local, qname hint
    StartElement,
    /// uri, local, qname hint, type, value
    Attribute,
    EndElement,
    /// span into the character table
    Characters,
    /// prefix, uri
    PrefixMapping,
}

#[derive(Debug)]
pub(crate) struct Chunk {
    kinds: Vec<Kind>,
    /// First operand of each slot: a string index, or a span index for text
    first: Vec<u32>,
    strings: Vec<Option<Box<str>>>,
    text: String,
    spans: Vec<(u32, u32)>,
}

impl Chunk {
    pub fn with_capacity(slots: usize) -> Self {
        Chunk {
            kinds: Vec::with_capacity(slots),
            first: Vec::with_capacity(slots),
            strings: Vec::with_capacity(slots * 2),
            text: String::new(),
            spans: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn last_kind(&self) -> Option<Kind> {
        self.kinds.last().copied()
    }

    pub fn push(&mut self, kind: Kind, operands: &[Option<&str>]) {
        self.kinds.push(kind);
        self.first.push(self.strings.len() as u32);
        self.strings.extend(operands.iter().map(|op| op.map(Box::from)));
    }

    pub fn push_text(&mut self, text: &str) {
        let start = self.text.len() as u32;
        self.text.push_str(text);
        self.kinds.push(Kind::Characters);
        self.first.push(self.spans.len() as u32);
        self.spans.push((start, self.text.len() as u32));
    }

    /// Remove the last slot and its operands
    pub fn pop(&mut self) -> Option<Kind> {
        let kind = self.kinds.pop()?;
        let first = self.first.pop().unwrap_or(0) as usize;
        if kind == Kind::Characters {
            if let Some(&(start, _)) = self.spans.get(first) {
                self.text.truncate(start as usize);
            }
            self.spans.truncate(first);
        } else {
            self.strings.truncate(first);
        }
        Some(kind)
    }

    /// Character data of a `Characters` slot
    pub fn text(&self, slot: usize) -> &str {
        let (start, end) = self.spans[self.first[slot] as usize];
        &self.text[start as usize..end as usize]
    }

    /// Borrowing view of one slot
    pub fn event(&self, slot: usize) -> BufferedEvent<'_> {
        let f = self.first[slot] as usize;
        let s = |i: usize| Cow::Borrowed(self.strings[f + i].as_deref().unwrap_or(""));
        let opt = |i: usize| self.strings[f + i].as_deref().map(Cow::Borrowed);
        match self.kinds[slot] {
            Kind::StartDocument => BufferedEvent::StartDocument,
            Kind::EndDocument => BufferedEvent::EndDocument,
            Kind::StartElement => BufferedEvent::StartElement {
                uri: s(0),
                local: s(1),
                qname: opt(2),
            },
            Kind::Attribute => BufferedEvent::Attribute {
                uri: s(0),
                local: s(1),
                qname: opt(2),
                kind: s(3),
                value: s(4),
            },
            Kind::EndElement => BufferedEvent::EndElement,
            Kind::Characters => BufferedEvent::Characters(Cow::Borrowed(self.text(slot))),
            Kind::PrefixMapping => BufferedEvent::PrefixMapping {
                prefix: s(0),
                uri: s(1),
            },
        }
    }

    /// Owned view of one slot; string operands are moved out and nulled
    pub fn take_event(&mut self, slot: usize) -> BufferedEvent<'static> {
        let f = self.first[slot] as usize;
        let strings = &mut self.strings;
        let mut opt = |i: usize| strings[f + i].take().map(|b| Cow::Owned(b.into_string()));
        match self.kinds[slot] {
            Kind::StartDocument => BufferedEvent::StartDocument,
            Kind::EndDocument => BufferedEvent::EndDocument,
            Kind::StartElement => {
                let uri = opt(0).unwrap_or_default();
                let local = opt(1).unwrap_or_default();
                BufferedEvent::StartElement {
                    uri,
                    local,
                    qname: opt(2),
                }
            }
            Kind::Attribute => {
                let uri = opt(0).unwrap_or_default();
                let local = opt(1).unwrap_or_default();
                let qname = opt(2);
                let kind = opt(3).unwrap_or_default();
                BufferedEvent::Attribute {
                    uri,
                    local,
                    qname,
                    kind,
                    value: opt(4).unwrap_or_default(),
                }
            }
            Kind::EndElement => BufferedEvent::EndElement,
            Kind::Characters => BufferedEvent::Characters(Cow::Owned(self.text(slot).to_string())),
            Kind::PrefixMapping => {
                let prefix = opt(0).unwrap_or_default();
                BufferedEvent::PrefixMapping {
                    prefix,
                    uri: opt(1).unwrap_or_default(),
                }
            }
        }
    }
}
