//! Streaming Object Reader
//!
//! Recursive-descent construction of typed objects from a token cursor.
//! The reader positions itself at a start tag, lets the builder initialize
//! the object from the tag, then hands every direct child start tag to the
//! builder. A builder must return with the cursor on the end tag of the
//! child it consumed; the reader verifies this with the depth counter.

use super::config::{ReaderConfig, SchemaLocation};
use super::cursor::TokenCursor;
use super::events::{StartElement, XmlEvent};
use crate::buffer::EventBuffer;
use crate::core::{ns, Attributes, QName};
use crate::dom::Document;
use crate::error::{BindError, Result};
use crate::registry::{BuilderEntry, BuilderSource, ErasedBuilder, Registry};
use crate::registry::{Builder, ParseResult};
use crate::tracing_macros::{debug, trace};
use lru::LruCache;
use std::any::{Any, TypeId};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Reader session over one token cursor
pub struct StreamReader<'r> {
    cursor: &'r mut dyn TokenCursor,
    registry: &'r Registry,
    config: &'r ReaderConfig,
    /// Factory-built builder instances, keyed by builder type
    builders: LruCache<TypeId, Arc<dyn ErasedBuilder>>,
}

impl<'r> StreamReader<'r> {
    /// Reader using the registry's reader configuration
    pub fn new(cursor: &'r mut dyn TokenCursor, registry: &'r Registry) -> Self {
        Self::with_config(cursor, registry, registry.reader_config())
    }

    pub fn with_config(
        cursor: &'r mut dyn TokenCursor,
        registry: &'r Registry,
        config: &'r ReaderConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.builder_cache).unwrap_or(NonZeroUsize::MIN);
        StreamReader {
            cursor,
            registry,
            config,
            builders: LruCache::new(capacity),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn config(&self) -> &ReaderConfig {
        self.config
    }

    /// Direct access to the underlying cursor
    pub fn cursor(&mut self) -> &mut (dyn TokenCursor + 'r) {
        &mut *self.cursor
    }

    pub fn current(&self) -> &XmlEvent {
        self.cursor.current()
    }

    pub fn depth(&self) -> usize {
        self.cursor.depth()
    }

    pub fn advance(&mut self) -> Result<()> {
        self.cursor.advance()
    }

    /// The start tag the cursor is positioned at
    pub fn start_element(&self) -> Result<&StartElement> {
        match self.cursor.current() {
            XmlEvent::StartElement(start) => Ok(start),
            other => Err(BindError::protocol(format!("expected a start tag, found {}", other))),
        }
    }

    /// Build one object from the element at the current start tag
    ///
    /// Returns with the cursor on that element's end tag.
    pub fn read_object<B: Builder + ?Sized>(&mut self, builder: &B) -> Result<B::Output> {
        let start = self.start_element()?.clone();
        let depth = self.cursor.depth();
        let stop_at = depth - 1;
        let child_level = depth + 1;
        trace!(element = %start.name, depth, "reading object");

        self.announce_schema_location(&start.attributes);

        let mut object = builder
            .create(&start.name)
            .ok_or_else(|| BindError::build::<B::Output>(&start.name, "builder created no object"))?;
        builder.initialize(&mut object, &start.name, &start.attributes, self)?;
        self.cursor.advance()?;

        loop {
            match self.cursor.current() {
                XmlEvent::StartElement(child) => {
                    if self.cursor.depth() != child_level {
                        return Err(BindError::protocol(format!(
                            "start tag <{}> at depth {} inside <{}>, expected depth {}",
                            child.name,
                            self.cursor.depth(),
                            start.name,
                            child_level
                        )));
                    }
                    let child = child.clone();
                    builder.build_child(&mut object, &child.name, &child.attributes, self)?;
                    self.expect_end_of(&child.name, child_level - 1)?;
                    self.cursor.advance()?;
                }
                XmlEvent::EndElement(name) => {
                    let depth = self.cursor.depth();
                    if depth == stop_at {
                        return Ok(object);
                    }
                    if depth < stop_at {
                        return Err(BindError::protocol(format!(
                            "end tag </{}> at depth {} while reading <{}> (stop depth {})",
                            name, depth, start.name, stop_at
                        )));
                    }
                    self.cursor.advance()?;
                }
                XmlEvent::EndDocument => {
                    return Err(BindError::protocol(format!(
                        "input ended before </{}>",
                        start.name
                    )));
                }
                _ => self.cursor.advance()?,
            }
        }
    }

    /// Concatenate contiguous character data up to the next tag
    ///
    /// At a start tag the tag is consumed first, so inside `build_child`
    /// this reads a simple-content child and leaves the cursor on its end tag.
    /// With `trim_text` set, surrounding whitespace of the joined text is removed.
    pub fn read_text(&mut self) -> Result<String> {
        if self.cursor.current().is_start_element() {
            self.cursor.advance()?;
        }
        let mut text = String::new();
        while let XmlEvent::Characters(chunk) = self.cursor.current() {
            text.push_str(chunk);
            self.cursor.advance()?;
        }
        if self.config.trim_text {
            return Ok(text.trim().to_string());
        }
        Ok(text)
    }

    /// Consume the element at the current start tag, stopping on its end tag
    pub fn skip_element(&mut self) -> Result<()> {
        let start = self.start_element()?.clone();
        self.announce_schema_location(&start.attributes);
        let name = start.name;
        let target = self.cursor.depth() - 1;
        loop {
            self.cursor.advance()?;
            match self.cursor.current() {
                XmlEvent::StartElement(nested) => self.announce_schema_location(&nested.attributes),
                XmlEvent::EndElement(_) if self.cursor.depth() == target => return Ok(()),
                XmlEvent::EndDocument => {
                    return Err(BindError::protocol(format!("input ended before </{}>", name)))
                }
                _ => {}
            }
        }
    }

    /// Read the current element as `T` through its registered builder
    ///
    /// An element bound to a different type is a build failure. Without a
    /// builder the element is materialized (fallback enabled) or skipped.
    pub fn read_child<T: 'static>(&mut self) -> Result<ParseResult<T>> {
        let name = self.start_element()?.name.clone();
        let registry = self.registry;
        match registry.lookup_builder(&name.namespace, &name.local) {
            Some(entry) if entry.output_type == TypeId::of::<T>() => {
                let builder = self.resolve(entry);
                let object = builder.build(self)?;
                let object = object
                    .downcast::<T>()
                    .map_err(|_| BindError::build::<T>(&name, "builder produced a different type"))?;
                Ok(ParseResult::Object(*object))
            }
            Some(entry) => Err(BindError::build::<T>(
                &name,
                format!("element is bound to {}", entry.output_name),
            )),
            None => self.fallback(&name),
        }
    }

    /// Read the current element with whatever builder is registered for it
    pub fn read_any_child(&mut self) -> Result<ParseResult<Box<dyn Any>>> {
        let name = self.start_element()?.name.clone();
        let registry = self.registry;
        match registry.lookup_builder(&name.namespace, &name.local) {
            Some(entry) => {
                let builder = self.resolve(entry);
                Ok(ParseResult::Object(builder.build(self)?))
            }
            None => self.fallback(&name),
        }
    }

    /// Materialize the current element as a generic tree
    pub fn materialize(&mut self) -> Result<Document> {
        let doc = Document::materialize(&mut *self.cursor)?;
        if self.config.schema_location_hook.is_some() {
            if let Some(root) = doc.root_element() {
                for id in std::iter::once(root).chain(doc.descendants(root)) {
                    if let Some(attributes) = doc.attributes(id) {
                        self.announce_schema_location(attributes);
                    }
                }
            }
        }
        Ok(doc)
    }

    /// Record the current element's events for look-ahead and later replay
    pub fn record_element(&mut self) -> Result<EventBuffer> {
        let mut buffer = EventBuffer::new();
        buffer.record_subtree(&mut *self.cursor)?;
        Ok(buffer)
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn fallback<T>(&mut self, name: &QName) -> Result<ParseResult<T>> {
        if self.config.fallback {
            debug!(element = %name, "no builder, materializing element");
            Ok(ParseResult::Node(self.materialize()?))
        } else {
            trace!(element = %name, "no builder, skipping element");
            self.skip_element()?;
            Ok(ParseResult::Empty)
        }
    }

    pub(crate) fn resolve(&mut self, entry: &BuilderEntry) -> Arc<dyn ErasedBuilder> {
        match &entry.source {
            BuilderSource::Shared(builder) => builder.clone(),
            BuilderSource::Factory { builder_type, make } => {
                if let Some(builder) = self.builders.get(builder_type) {
                    return builder.clone();
                }
                let builder = make();
                self.builders.put(*builder_type, builder.clone());
                builder
            }
        }
    }

    fn expect_end_of(&self, child: &QName, depth: usize) -> Result<()> {
        match self.cursor.current() {
            XmlEvent::EndElement(_) if self.cursor.depth() == depth => Ok(()),
            other => Err(BindError::protocol(format!(
                "builder for <{}> left the cursor at {} (depth {}), expected its end tag at depth {}",
                child,
                other,
                self.cursor.depth(),
                depth
            ))),
        }
    }

    /// Pass the element's `xsi` schema locations to the configured hook
    pub(crate) fn announce_schema_location(&self, attributes: &Attributes) {
        let Some(hook) = &self.config.schema_location_hook else {
            return;
        };
        let location = SchemaLocation::parse(
            attributes.get(ns::XSI, "schemaLocation"),
            attributes.get(ns::XSI, "noNamespaceSchemaLocation"),
        );
        if !location.is_empty() {
            hook(&location);
        }
    }
}
