//! Event Buffer
//!
//! Append-only recorder of document events over chained chunks, replayable
//! either repeatedly (shared) or once while reclaiming storage (release).

use super::chunk::{Chunk, Kind};
use super::event::{hinted_name, BufferedEvent};
use super::replay::BufferCursor;
use super::BufferConfig;
use crate::core::{Attributes, QName};
use crate::error::{BindError, Result};
use crate::reader::{TokenCursor, XmlEvent};
use crate::sax::EventSink;
use crate::tracing_macros::{debug, trace};
use std::collections::VecDeque;

/// Attribute type recorded when none is known
pub const CDATA: &str = "CDATA";

/// Compact record of a stream of document events
#[derive(Debug)]
pub struct EventBuffer {
    config: BufferConfig,
    chunks: VecDeque<Chunk>,
    len: usize,
    /// Bumped by every structural change
    modcount: u64,
}

/// Position of a detached shared iteration
///
/// A mark stays valid until the buffer is modified; after that
/// [`EventBuffer::next_from`] reports [`BindError::StaleIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    chunk: usize,
    slot: usize,
    modcount: u64,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    pub fn with_config(config: BufferConfig) -> Self {
        EventBuffer {
            config,
            chunks: VecDeque::new(),
            len: 0,
            modcount: 0,
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks currently allocated
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn clear(&mut self) {
        debug!(events = self.len, "clearing event buffer");
        self.chunks.clear();
        self.len = 0;
        self.modcount += 1;
    }

    pub fn push_start_document(&mut self) {
        self.push(Kind::StartDocument, &[]);
    }

    pub fn push_end_document(&mut self) {
        self.push(Kind::EndDocument, &[]);
    }

    /// Record a start tag
    ///
    /// Unless mixed content is assumed, whitespace-only character runs
    /// directly before it are dropped first.
    pub fn push_start_element(&mut self, uri: &str, local: &str, qname: Option<&str>) {
        if !self.config.assume_mixed_content {
            self.drop_trailing_whitespace();
        }
        self.push(Kind::StartElement, &[Some(uri), Some(local), qname]);
    }

    /// Record an attribute of the start tag just recorded
    pub fn push_attribute(
        &mut self,
        uri: &str,
        local: &str,
        qname: Option<&str>,
        kind: &str,
        value: &str,
    ) -> Result<()> {
        match self.last_kind() {
            Some(Kind::StartElement) | Some(Kind::Attribute) => {}
            _ => {
                return Err(BindError::protocol(format!(
                    "attribute {} recorded outside a start tag",
                    local
                )))
            }
        }
        self.push(
            Kind::Attribute,
            &[Some(uri), Some(local), qname, Some(kind), Some(value)],
        );
        Ok(())
    }

    pub fn push_end_element(&mut self) {
        self.push(Kind::EndElement, &[]);
    }

    pub fn push_characters(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.slot_for_push().push_text(text);
        self.len += 1;
        self.modcount += 1;
    }

    pub fn push_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        self.push(Kind::PrefixMapping, &[Some(prefix), Some(uri)]);
    }

    /// Remove the most recently recorded event
    pub fn pop(&mut self) -> Option<BufferedEvent<'static>> {
        let chunk = self.chunks.back_mut()?;
        let slot = chunk.len().checked_sub(1)?;
        let event = chunk.take_event(slot);
        chunk.pop();
        if chunk.is_empty() {
            self.chunks.pop_back();
        }
        self.len -= 1;
        self.modcount += 1;
        Some(event)
    }

    /// Record the element at the cursor's start tag, leaving the cursor on
    /// its end tag
    pub fn record_subtree<C: TokenCursor + ?Sized>(&mut self, cursor: &mut C) -> Result<()> {
        if !cursor.current().is_start_element() {
            return Err(BindError::protocol(format!(
                "recording expects a start tag, found {}",
                cursor.current()
            )));
        }
        let stop_at = cursor.depth() - 1;
        loop {
            match cursor.current() {
                XmlEvent::StartElement(start) => {
                    for decl in &start.namespaces {
                        self.push_prefix_mapping(&decl.prefix, &decl.uri);
                    }
                    let hint = start.name.prefix.as_ref().map(|_| start.name.lexical());
                    self.push_start_element(&start.name.namespace, &start.name.local, hint.as_deref());
                    for attr in &start.attributes {
                        let hint = attr.name.prefix.as_ref().map(|_| attr.name.lexical());
                        self.push_attribute(
                            &attr.name.namespace,
                            &attr.name.local,
                            hint.as_deref(),
                            CDATA,
                            &attr.value,
                        )?;
                    }
                }
                XmlEvent::EndElement(_) => {
                    self.push_end_element();
                    if cursor.depth() == stop_at {
                        return Ok(());
                    }
                }
                XmlEvent::Characters(text) => self.push_characters(text),
                XmlEvent::EndDocument => {
                    return Err(BindError::protocol("input ended while recording element"));
                }
                XmlEvent::StartDocument => {}
            }
            cursor.advance()?;
        }
    }

    /// Shared iteration; the buffer is left untouched
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            buffer: self,
            mark: self.mark(),
        }
    }

    /// Start a detached shared iteration
    pub fn mark(&self) -> Mark {
        Mark {
            chunk: 0,
            slot: 0,
            modcount: self.modcount,
        }
    }

    /// Advance a detached iteration
    pub fn next_from(&self, mark: &mut Mark) -> Result<Option<BufferedEvent<'_>>> {
        if mark.modcount != self.modcount {
            return Err(BindError::StaleIterator);
        }
        loop {
            let Some(chunk) = self.chunks.get(mark.chunk) else {
                return Ok(None);
            };
            if mark.slot < chunk.len() {
                let event = chunk.event(mark.slot);
                mark.slot += 1;
                return Ok(Some(event));
            }
            mark.chunk += 1;
            mark.slot = 0;
        }
    }

    /// Release iteration
    ///
    /// The buffer is empty as soon as this is called; the returned iterator
    /// owns the recorded chunks and frees each one once it is consumed.
    pub fn drain(&mut self) -> Drain {
        let chunks = std::mem::take(&mut self.chunks);
        trace!(events = self.len, chunks = chunks.len(), "releasing event buffer");
        self.len = 0;
        self.modcount += 1;
        Drain { chunks, slot: 0 }
    }

    /// Replay into `sink`, keeping the recording
    pub fn send<S: EventSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        replay(self.iter(), sink)
    }

    /// Replay into `sink`, consuming the recording
    pub fn release_to<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        replay(self.drain(), sink)
    }

    /// Replay as a token cursor positioned before the first event
    pub fn cursor(&self) -> BufferCursor<'_> {
        BufferCursor::new(self)
    }

    fn last_kind(&self) -> Option<Kind> {
        self.chunks.back().and_then(Chunk::last_kind)
    }

    fn push(&mut self, kind: Kind, operands: &[Option<&str>]) {
        self.slot_for_push().push(kind, operands);
        self.len += 1;
        self.modcount += 1;
    }

    fn slot_for_push(&mut self) -> &mut Chunk {
        let capacity = self.config.chunk_capacity.max(1);
        let full = self.chunks.back().is_none_or(|c| c.len() >= capacity);
        if full {
            self.chunks.push_back(Chunk::with_capacity(capacity));
        }
        let last = self.chunks.len() - 1;
        &mut self.chunks[last]
    }

    fn drop_trailing_whitespace(&mut self) {
        while let Some(chunk) = self.chunks.back() {
            let Some(slot) = chunk.len().checked_sub(1) else {
                break;
            };
            let whitespace = chunk.last_kind() == Some(Kind::Characters)
                && chunk.text(slot).chars().all(char::is_whitespace);
            if !whitespace {
                break;
            }
            self.pop();
        }
    }
}

/// Shared iterator over a buffer
pub struct Iter<'a> {
    buffer: &'a EventBuffer,
    mark: Mark,
}

impl<'a> Iterator for Iter<'a> {
    type Item = BufferedEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // The borrow on the buffer rules out modification, so the mark
        // cannot go stale here.
        self.buffer.next_from(&mut self.mark).ok().flatten()
    }
}

/// Release iterator, see [`EventBuffer::drain`]
pub struct Drain {
    chunks: VecDeque<Chunk>,
    slot: usize,
}

impl Iterator for Drain {
    type Item = BufferedEvent<'static>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let chunk = self.chunks.front_mut()?;
            if self.slot < chunk.len() {
                let event = chunk.take_event(self.slot);
                self.slot += 1;
                return Some(event);
            }
            self.chunks.pop_front();
            self.slot = 0;
        }
    }
}

impl Drain {
    /// Chunks not yet fully consumed
    pub fn remaining_chunks(&self) -> usize {
        self.chunks.len()
    }
}

/// Push a sequence of recorded events into a sink
///
/// Attributes are gathered onto their start tag; end tags get their name
/// back from a stack of open elements.
fn replay<'a, I, S>(events: I, sink: &mut S) -> Result<()>
where
    I: Iterator<Item = BufferedEvent<'a>>,
    S: EventSink + ?Sized,
{
    let mut events = events.peekable();
    let mut open: Vec<QName> = Vec::new();
    while let Some(event) = events.next() {
        match event {
            BufferedEvent::StartDocument => sink.start_document()?,
            BufferedEvent::EndDocument => sink.end_document()?,
            BufferedEvent::PrefixMapping { prefix, uri } => sink.start_prefix_mapping(&prefix, &uri)?,
            BufferedEvent::StartElement { uri, local, qname } => {
                let name = hinted_name(&uri, &local, qname.as_deref());
                let mut attributes = Attributes::new();
                while let Some(BufferedEvent::Attribute { .. }) = events.peek() {
                    if let Some(BufferedEvent::Attribute {
                        uri,
                        local,
                        qname,
                        value,
                        ..
                    }) = events.next()
                    {
                        attributes.insert(hinted_name(&uri, &local, qname.as_deref()), value.into_owned());
                    }
                }
                sink.start_element(&name, &attributes)?;
                open.push(name);
            }
            BufferedEvent::Attribute { local, .. } => {
                return Err(BindError::protocol(format!(
                    "attribute {} replayed outside a start tag",
                    local
                )));
            }
            BufferedEvent::EndElement => {
                let name = open
                    .pop()
                    .ok_or_else(|| BindError::protocol("recorded end tag has no start tag"))?;
                sink.end_element(&name)?;
            }
            BufferedEvent::Characters(text) => sink.characters(&text)?,
        }
    }
    Ok(())
}

impl EventSink for EventBuffer {
    fn start_document(&mut self) -> Result<()> {
        self.push_start_document();
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.push_end_document();
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.push_prefix_mapping(prefix, uri);
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<()> {
        let hint = name.prefix.as_ref().map(|_| name.lexical());
        self.push_start_element(&name.namespace, &name.local, hint.as_deref());
        for attr in attributes {
            let hint = attr.name.prefix.as_ref().map(|_| attr.name.lexical());
            self.push_attribute(&attr.name.namespace, &attr.name.local, hint.as_deref(), CDATA, &attr.value)?;
        }
        Ok(())
    }

    fn end_element(&mut self, _name: &QName) -> Result<()> {
        self.push_end_element();
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.push_characters(text);
        Ok(())
    }
}
