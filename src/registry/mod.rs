//! Registry Module
//!
//! Maps (namespace, element name) to builders and (object type, namespace)
//! to serializers, and drives top-level reads and writes.
//!
//! Registration happens on a [`RegistryBuilder`]; [`RegistryBuilder::freeze`]
//! turns it into an immutable [`Registry`] that can be cloned cheaply and
//! shared across threads.

pub mod binding;
pub mod parallel;

pub use binding::{Builder, ParseResult, Serializer};
pub(crate) use binding::{ErasedBuilder, ErasedSerializer};

use binding::{BuilderAdapter, SerializerAdapter};
use crate::core::encoding::convert_to_utf8;
use crate::error::{BindError, Result};
use crate::reader::{ReaderConfig, StreamReader, TokenCursor, XmlCursor, XmlEvent};
use crate::tracing_macros::{debug, trace};
use crate::writer::{StreamWriter, WriterConfig};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::Arc;

/// How a registered builder is obtained
#[derive(Clone)]
pub(crate) enum BuilderSource {
    /// One instance shared by every read
    Shared(Arc<dyn ErasedBuilder>),
    /// Created on first use and cached per reader session
    Factory {
        builder_type: TypeId,
        make: fn() -> Arc<dyn ErasedBuilder>,
    },
}

/// A registered builder
#[derive(Clone)]
pub struct BuilderEntry {
    pub(crate) output_type: TypeId,
    pub(crate) output_name: &'static str,
    pub(crate) source: BuilderSource,
}

impl BuilderEntry {
    /// `TypeId` of the objects this builder produces
    pub fn output_type(&self) -> TypeId {
        self.output_type
    }

    pub fn output_name(&self) -> &'static str {
        self.output_name
    }

    pub fn produces<T: 'static>(&self) -> bool {
        self.output_type == TypeId::of::<T>()
    }
}

impl fmt::Debug for BuilderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderEntry")
            .field("output", &self.output_name)
            .field("factory", &matches!(self.source, BuilderSource::Factory { .. }))
            .finish()
    }
}

/// A registered serializer
#[derive(Clone)]
pub struct SerializerEntry {
    namespace: String,
    input_name: &'static str,
    serializer: Arc<dyn ErasedSerializer>,
}

impl SerializerEntry {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn input_name(&self) -> &'static str {
        self.input_name
    }

    pub(crate) fn write(&self, object: &dyn Any, writer: &mut StreamWriter<'_>) -> Result<()> {
        self.serializer.write(object, writer)
    }
}

impl fmt::Debug for SerializerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerEntry")
            .field("namespace", &self.namespace)
            .field("input", &self.input_name)
            .finish()
    }
}

type BuilderTable = HashMap<String, HashMap<String, BuilderEntry>>;
type SerializerTable = HashMap<TypeId, HashMap<String, SerializerEntry>>;

/// Mutable registration phase of a [`Registry`]
#[derive(Default)]
pub struct RegistryBuilder {
    strict: bool,
    builders: BuilderTable,
    serializers: SerializerTable,
    reader: ReaderConfig,
    writer: WriterConfig,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject duplicate registrations instead of replacing
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn reader_config(mut self, config: ReaderConfig) -> Self {
        self.reader = config;
        self
    }

    pub fn writer_config(mut self, config: WriterConfig) -> Self {
        self.writer = config;
        self
    }

    /// Register a shared builder instance for an element
    pub fn register_builder<B: Builder>(
        &mut self,
        namespace: &str,
        name: &str,
        builder: B,
    ) -> Result<&mut Self> {
        let entry = BuilderEntry {
            output_type: TypeId::of::<B::Output>(),
            output_name: std::any::type_name::<B::Output>(),
            source: BuilderSource::Shared(Arc::new(BuilderAdapter(builder))),
        };
        self.insert_builder(namespace, name, entry)
    }

    /// Register a builder by type; instances are created on first use in
    /// each reader session
    pub fn register_builder_factory<B: Builder + Default>(
        &mut self,
        namespace: &str,
        name: &str,
    ) -> Result<&mut Self> {
        fn make<B: Builder + Default>() -> Arc<dyn ErasedBuilder> {
            Arc::new(BuilderAdapter(B::default()))
        }
        let entry = BuilderEntry {
            output_type: TypeId::of::<B::Output>(),
            output_name: std::any::type_name::<B::Output>(),
            source: BuilderSource::Factory {
                builder_type: TypeId::of::<B>(),
                make: make::<B>,
            },
        };
        self.insert_builder(namespace, name, entry)
    }

    /// Register a serializer for `S::Input` under a namespace
    pub fn register_serializer<S: Serializer>(&mut self, namespace: &str, serializer: S) -> Result<&mut Self> {
        let by_namespace = self.serializers.entry(TypeId::of::<S::Input>()).or_default();
        let input_name = std::any::type_name::<S::Input>();
        if self.strict && by_namespace.contains_key(namespace) {
            return Err(BindError::DuplicateRegistration(format!(
                "serializer for {} in namespace {:?}",
                input_name, namespace
            )));
        }
        debug!(input = input_name, namespace, "registered serializer");
        by_namespace.insert(
            namespace.to_string(),
            SerializerEntry {
                namespace: namespace.to_string(),
                input_name,
                serializer: Arc::new(SerializerAdapter(serializer)),
            },
        );
        Ok(self)
    }

    fn insert_builder(&mut self, namespace: &str, name: &str, entry: BuilderEntry) -> Result<&mut Self> {
        let by_name = self.builders.entry(namespace.to_string()).or_default();
        if self.strict && by_name.contains_key(name) {
            return Err(BindError::DuplicateRegistration(format!(
                "builder for {{{}}}{}",
                namespace, name
            )));
        }
        debug!(namespace, name, output = entry.output_name, "registered builder");
        by_name.insert(name.to_string(), entry);
        Ok(self)
    }

    /// Freeze into an immutable, shareable registry
    pub fn freeze(self) -> Registry {
        Registry {
            inner: Arc::new(Inner {
                builders: self.builders,
                serializers: self.serializers,
                reader: self.reader,
                writer: self.writer,
            }),
        }
    }
}

struct Inner {
    builders: BuilderTable,
    serializers: SerializerTable,
    reader: ReaderConfig,
    writer: WriterConfig,
}

/// Immutable set of builders and serializers
///
/// Lookups are safe from any number of threads.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let builders: usize = self.inner.builders.values().map(HashMap::len).sum();
        let serializers: usize = self.inner.serializers.values().map(HashMap::len).sum();
        f.debug_struct("Registry")
            .field("builders", &builders)
            .field("serializers", &serializers)
            .finish()
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn reader_config(&self) -> &ReaderConfig {
        &self.inner.reader
    }

    pub fn writer_config(&self) -> &WriterConfig {
        &self.inner.writer
    }

    /// Builder registered for an element
    pub fn lookup_builder(&self, namespace: &str, name: &str) -> Option<&BuilderEntry> {
        self.inner.builders.get(namespace)?.get(name)
    }

    /// Serializer registered for a type under one namespace
    pub fn serializer(&self, type_id: TypeId, namespace: &str) -> Option<&SerializerEntry> {
        self.inner.serializers.get(&type_id)?.get(namespace)
    }

    /// First serializer for a type whose namespace is in `namespaces`
    ///
    /// An empty set accepts any namespace. When several serializers
    /// qualify, which one is returned is unspecified.
    pub fn serializer_in(&self, type_id: TypeId, namespaces: &[String]) -> Option<&SerializerEntry> {
        let by_namespace = self.inner.serializers.get(&type_id)?;
        if namespaces.is_empty() {
            return by_namespace.values().next();
        }
        by_namespace
            .values()
            .find(|entry| namespaces.iter().any(|ns| *ns == entry.namespace))
    }

    /// Read the first element bound to `T`
    ///
    /// Tokens before it are skipped. Returns `None` when the input holds no
    /// such element; on success the cursor sits at that element's end tag.
    pub fn read<T: 'static>(&self, cursor: &mut dyn TokenCursor) -> Result<Option<T>> {
        let wanted = TypeId::of::<T>();
        let Some(object) = self.read_matching(cursor, |entry| entry.output_type == wanted)? else {
            return Ok(None);
        };
        let object = object
            .downcast::<T>()
            .map_err(|_| BindError::protocol(format!("builder did not produce {}", std::any::type_name::<T>())))?;
        Ok(Some(*object))
    }

    /// Read the first element that has any builder
    pub fn read_any(&self, cursor: &mut dyn TokenCursor) -> Result<Option<Box<dyn Any>>> {
        self.read_matching(cursor, |_| true)
    }

    fn read_matching(
        &self,
        cursor: &mut dyn TokenCursor,
        accept: impl Fn(&BuilderEntry) -> bool,
    ) -> Result<Option<Box<dyn Any>>> {
        let mut reader = StreamReader::new(cursor, self);
        loop {
            let entry = match reader.current() {
                XmlEvent::StartElement(start) => {
                    let entry = self
                        .lookup_builder(&start.name.namespace, &start.name.local)
                        .filter(|entry| accept(entry));
                    if entry.is_none() {
                        reader.announce_schema_location(&start.attributes);
                    }
                    entry
                }
                XmlEvent::EndDocument => return Ok(None),
                _ => None,
            };
            if let Some(entry) = entry {
                trace!(output = entry.output_name, depth = reader.depth(), "top-level read");
                let builder = reader.resolve(entry);
                return builder.build(&mut reader).map(Some);
            }
            reader.advance()?;
        }
    }

    /// Read `T` from an in-memory document
    pub fn from_xml<T: 'static>(&self, xml: &str) -> Result<T> {
        let mut cursor = XmlCursor::from_str(xml);
        self.read::<T>(&mut cursor)?.ok_or_else(not_found::<T>)
    }

    /// Read `T` from raw bytes; UTF-16 input is detected and converted
    pub fn from_slice<T: 'static>(&self, bytes: &[u8]) -> Result<T> {
        let xml = convert_to_utf8(bytes)?;
        self.from_xml(&xml)
    }

    /// Read `T` from a buffered UTF-8 source
    pub fn from_reader<T: 'static, R: BufRead>(&self, source: R) -> Result<T> {
        let mut cursor = XmlCursor::from_reader(source);
        self.read::<T>(&mut cursor)?.ok_or_else(not_found::<T>)
    }

    /// Read the root element with whatever builder matches it
    ///
    /// Without a builder the root is materialized when fallback is enabled,
    /// otherwise the result is empty.
    pub fn parse(&self, xml: &str) -> Result<ParseResult<Box<dyn Any>>> {
        let mut cursor = XmlCursor::from_str(xml);
        cursor.next_tag()?;
        if cursor.is_exhausted() {
            return Ok(ParseResult::Empty);
        }
        StreamReader::new(&mut cursor, self).read_any_child()
    }

    /// Write `object` as a complete document
    ///
    /// Open elements are closed even when serialization fails; a failure
    /// while closing never hides the original error.
    pub fn write<T: 'static>(&self, object: &T, out: &mut dyn Write) -> Result<()> {
        self.write_any(object, out)
    }

    /// Write a type-erased object as a complete document
    pub fn write_any(&self, object: &dyn Any, out: &mut dyn Write) -> Result<()> {
        let mut writer = StreamWriter::new(out, self.inner.writer.clone()).with_registry(self);
        trace!("top-level write");
        let written = writer
            .write_start_document()
            .and_then(|()| writer.write_any(object));
        let closed = writer.end_document();
        written.and(closed)
    }

    /// Serialize `object` to a string
    pub fn to_xml<T: 'static>(&self, object: &T) -> Result<String> {
        let mut out = Vec::new();
        self.write(object, &mut out)?;
        String::from_utf8(out).map_err(|e| BindError::Encoding(e.to_string()))
    }
}

fn not_found<T>() -> BindError {
    BindError::protocol(format!(
        "no element bound to {} in input",
        std::any::type_name::<T>()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::EventBuffer;
    use crate::core::{Attributes, QName};
    use crate::dom::Element;
    use crate::reader::SchemaLocation;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, PartialEq)]
    struct Foo;

    struct FooBuilder;

    impl Builder for FooBuilder {
        type Output = Foo;

        fn create(&self, _name: &QName) -> Option<Foo> {
            Some(Foo)
        }
    }

    struct FooSerializer;

    impl Serializer for FooSerializer {
        type Input = Foo;

        fn create_element(&self, _object: &Foo, _namespaces: &[String]) -> Option<Element> {
            Some(Element::local("foo"))
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Item {
        sku: String,
        qty: u32,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Order {
        id: String,
        note: Option<String>,
        items: Vec<Item>,
    }

    #[derive(Default)]
    struct ItemBuilder;

    impl Builder for ItemBuilder {
        type Output = Item;

        fn create(&self, _name: &QName) -> Option<Item> {
            Some(Item::default())
        }

        fn initialize(
            &self,
            item: &mut Item,
            _name: &QName,
            attributes: &Attributes,
            _reader: &mut StreamReader<'_>,
        ) -> Result<()> {
            item.sku = attributes.get("", "sku").unwrap_or_default().to_string();
            Ok(())
        }

        fn build_child(
            &self,
            item: &mut Item,
            name: &QName,
            _attributes: &Attributes,
            reader: &mut StreamReader<'_>,
        ) -> Result<()> {
            if name.local != "qty" {
                return reader.skip_element();
            }
            let text = reader.read_text()?;
            item.qty = text
                .trim()
                .parse()
                .map_err(|_| BindError::build::<Item>(name, format!("bad quantity {:?}", text)))?;
            Ok(())
        }
    }

    struct OrderBuilder;

    impl Builder for OrderBuilder {
        type Output = Order;

        fn create(&self, _name: &QName) -> Option<Order> {
            Some(Order::default())
        }

        fn initialize(
            &self,
            order: &mut Order,
            _name: &QName,
            attributes: &Attributes,
            _reader: &mut StreamReader<'_>,
        ) -> Result<()> {
            order.id = attributes.get("", "id").unwrap_or_default().to_string();
            Ok(())
        }

        fn build_child(
            &self,
            order: &mut Order,
            name: &QName,
            _attributes: &Attributes,
            reader: &mut StreamReader<'_>,
        ) -> Result<()> {
            match name.local.as_str() {
                "item" => {
                    if let Some(item) = reader.read_child::<Item>()?.object() {
                        order.items.push(item);
                    }
                    Ok(())
                }
                "note" => {
                    order.note = Some(reader.read_text()?);
                    Ok(())
                }
                _ => reader.skip_element(),
            }
        }
    }

    struct ItemSerializer;

    impl Serializer for ItemSerializer {
        type Input = Item;

        fn create_element(&self, item: &Item, _namespaces: &[String]) -> Option<Element> {
            Some(
                Element::local("item")
                    .with_attribute(QName::local("sku"), item.sku.as_str())
                    .with_child(Element::local("qty").with_text(item.qty.to_string())),
            )
        }
    }

    struct OrderSerializer;

    impl Serializer for OrderSerializer {
        type Input = Order;

        fn create_element(&self, order: &Order, _namespaces: &[String]) -> Option<Element> {
            Some(Element::local("order").with_attribute(QName::local("id"), order.id.as_str()))
        }

        fn initialize_element(&self, element: &mut Element, order: &Order, _writer: &StreamWriter<'_>) -> Result<()> {
            if let Some(note) = &order.note {
                element.push_child(Element::local("note").with_text(note.as_str()));
            }
            Ok(())
        }

        fn write_child_elements(&self, order: &Order, writer: &mut StreamWriter<'_>) -> Result<()> {
            for item in &order.items {
                writer.write_object(item)?;
            }
            Ok(())
        }
    }

    fn orders() -> RegistryBuilder {
        let mut builder = Registry::builder().writer_config(WriterConfig::new().declaration(false));
        builder
            .register_builder("", "order", OrderBuilder)
            .and_then(|b| b.register_builder_factory::<ItemBuilder>("", "item"))
            .and_then(|b| b.register_serializer("", OrderSerializer))
            .and_then(|b| b.register_serializer("", ItemSerializer))
            .unwrap();
        builder
    }

    const ORDER: &str = r#"<order id="7"><item sku="a"><qty>2</qty></item><note>rush</note><item sku="b"><qty> 5 </qty></item></order>"#;

    #[test]
    fn test_empty_element_round_trip() {
        let mut builder = Registry::builder();
        builder
            .register_builder("", "foo", FooBuilder)
            .and_then(|b| b.register_serializer("", FooSerializer))
            .unwrap();
        let registry = builder.freeze();

        let foo: Foo = registry.from_xml("<foo/>").unwrap();
        assert_eq!(foo, Foo);
        assert_eq!(
            registry.to_xml(&foo).unwrap(),
            r#"<?xml version="1.0" encoding="UTF-8"?><foo/>"#
        );
    }

    #[test]
    fn test_nested_objects() {
        let registry = orders().freeze();
        let order: Order = registry.from_xml(ORDER).unwrap();
        assert_eq!(
            order,
            Order {
                id: "7".into(),
                note: Some("rush".into()),
                items: vec![
                    Item { sku: "a".into(), qty: 2 },
                    Item { sku: "b".into(), qty: 5 },
                ],
            }
        );
        assert_eq!(
            registry.to_xml(&order).unwrap(),
            r#"<order id="7"><note>rush</note><item sku="a"><qty>2</qty></item><item sku="b"><qty>5</qty></item></order>"#
        );
    }

    #[test]
    fn test_read_skips_leading_elements() {
        let registry = orders().freeze();
        let mut cursor = XmlCursor::from_str(r#"<wrap><other/><item sku="z"><qty>1</qty></item></wrap>"#);
        let item = registry.read::<Item>(&mut cursor).unwrap();
        assert_eq!(item, Some(Item { sku: "z".into(), qty: 1 }));
        assert!(matches!(cursor.current(), XmlEvent::EndElement(name) if name.local == "item"));

        let mut cursor = XmlCursor::from_str("<wrap/>");
        assert_eq!(registry.read::<Item>(&mut cursor).unwrap(), None);
        assert!(matches!(
            registry.from_xml::<Item>("<wrap/>"),
            Err(BindError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_strict_registration_rejects_duplicates() {
        let mut builder = Registry::builder().strict(true);
        builder.register_builder("", "foo", FooBuilder).unwrap();
        assert!(matches!(
            builder.register_builder("", "foo", FooBuilder),
            Err(BindError::DuplicateRegistration(_))
        ));
        builder.register_serializer("", FooSerializer).unwrap();
        assert!(builder.register_serializer("", FooSerializer).is_err());
        // another namespace is another key
        builder.register_serializer("urn:x", FooSerializer).unwrap();
    }

    #[test]
    fn test_lenient_registration_replaces() {
        let mut builder = Registry::builder();
        builder.register_builder("", "item", FooBuilder).unwrap();
        builder.register_builder("", "item", ItemBuilder).unwrap();
        let registry = builder.freeze();

        let entry = registry.lookup_builder("", "item").unwrap();
        assert!(entry.produces::<Item>());
        assert!(registry.lookup_builder("urn:x", "item").is_none());
    }

    struct LazyBuilder;

    impl Builder for LazyBuilder {
        type Output = ();

        fn create(&self, _name: &QName) -> Option<()> {
            Some(())
        }

        fn build_child(&self, _: &mut (), _: &QName, _: &Attributes, _: &mut StreamReader<'_>) -> Result<()> {
            Ok(())
        }
    }

    struct GreedyBuilder;

    impl Builder for GreedyBuilder {
        type Output = ();

        fn create(&self, _name: &QName) -> Option<()> {
            Some(())
        }

        fn build_child(&self, _: &mut (), _: &QName, _: &Attributes, reader: &mut StreamReader<'_>) -> Result<()> {
            reader.skip_element()?;
            reader.advance()
        }
    }

    #[test]
    fn test_builder_must_stop_on_child_end_tag() {
        let mut builder = Registry::builder();
        builder.register_builder("", "lazy", LazyBuilder).unwrap();
        builder.register_builder("", "greedy", GreedyBuilder).unwrap();
        let registry = builder.freeze();

        let lazy = registry.from_xml::<()>("<lazy><c><d/></c></lazy>");
        assert!(matches!(lazy, Err(BindError::ProtocolViolation(_))), "{:?}", lazy);

        let greedy = registry.from_xml::<()>("<greedy><c/><c/></greedy>");
        assert!(matches!(greedy, Err(BindError::ProtocolViolation(_))), "{:?}", greedy);
    }

    #[test]
    fn test_truncated_input_fails() {
        let registry = orders().freeze();
        assert!(registry.from_xml::<Order>(r#"<order id="1"><item sku="a">"#).is_err());
    }

    #[test]
    fn test_create_returning_none_is_build_failure() {
        struct Refuse;
        impl Builder for Refuse {
            type Output = u8;
            fn create(&self, _name: &QName) -> Option<u8> {
                None
            }
        }
        let mut builder = Registry::builder();
        builder.register_builder("", "r", Refuse).unwrap();
        let result = builder.freeze().from_xml::<u8>("<r/>");
        assert!(matches!(result, Err(BindError::BuildFailure { .. })));
    }

    #[test]
    fn test_child_bound_to_other_type_fails() {
        struct WantsOrder;
        impl Builder for WantsOrder {
            type Output = Vec<Order>;
            fn create(&self, _name: &QName) -> Option<Vec<Order>> {
                Some(Vec::new())
            }
            fn build_child(
                &self,
                out: &mut Vec<Order>,
                _: &QName,
                _: &Attributes,
                reader: &mut StreamReader<'_>,
            ) -> Result<()> {
                out.extend(reader.read_child::<Order>()?.object());
                Ok(())
            }
        }
        let mut builder = orders();
        builder.register_builder("", "orders", WantsOrder).unwrap();
        let registry = builder.freeze();

        let result = registry.from_xml::<Vec<Order>>(r#"<orders><item sku="a"/></orders>"#);
        assert!(matches!(result, Err(BindError::BuildFailure { .. })), "{:?}", result);

        let orders = registry
            .from_xml::<Vec<Order>>(r#"<orders><order id="1"/><unknown/><order id="2"/></orders>"#)
            .unwrap();
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn test_parse_fallback() {
        let registry = orders().freeze();
        assert!(registry.parse("<x><y>t</y></x>").unwrap().is_empty());

        let registry = orders().reader_config(ReaderConfig::new().fallback(true)).freeze();
        let doc = registry.parse("<x><y>t</y></x>").unwrap().node().unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.name(root).map(|n| n.local.as_str()), Some("x"));
        assert_eq!(doc.text_content(root), "t");

        let order = registry.parse(ORDER).unwrap().downcast::<Order>().unwrap().object();
        assert_eq!(order.map(|o| o.items.len()), Some(2));
    }

    static CREATED: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Default for Counted {
        fn default() -> Self {
            CREATED.fetch_add(1, Ordering::SeqCst);
            Counted
        }
    }

    impl Builder for Counted {
        type Output = Item;

        fn create(&self, _name: &QName) -> Option<Item> {
            Some(Item::default())
        }
    }

    #[test]
    fn test_factory_builder_created_once_per_session() {
        let mut builder = orders();
        builder.register_builder_factory::<Counted>("", "item").unwrap();
        let registry = builder.freeze();

        let before = CREATED.load(Ordering::SeqCst);
        let order: Order = registry.from_xml(ORDER).unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(CREATED.load(Ordering::SeqCst) - before, 1);
    }

    #[test]
    fn test_schema_location_hook() {
        let seen: Arc<Mutex<Vec<SchemaLocation>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let config = ReaderConfig::new().schema_location_hook(move |loc| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(loc.clone());
            }
        });
        let registry = orders().reader_config(config).freeze();
        let xml = r#"<order xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="urn:o order.xsd" id="1"/>"#;
        registry.from_xml::<Order>(xml).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].locations, [("urn:o".to_string(), "order.xsd".to_string())]);
    }

    #[test]
    fn test_schema_location_hook_sees_skipped_elements() {
        let seen: Arc<Mutex<Vec<SchemaLocation>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let config = ReaderConfig::new().fallback(true).schema_location_hook(move |loc| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(loc.clone());
            }
        });
        let registry = orders().reader_config(config).freeze();
        let xml = r#"<wrap xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:noNamespaceSchemaLocation="wrap.xsd">
            <order id="1"><extra xsi:noNamespaceSchemaLocation="extra.xsd"><deep xsi:noNamespaceSchemaLocation="deep.xsd"/></extra></order>
        </wrap>"#;
        registry.from_xml::<Order>(xml).unwrap();

        let unbound = r#"<x xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><y xsi:noNamespaceSchemaLocation="y.xsd"/></x>"#;
        assert!(registry.parse(unbound).unwrap().node().is_some());

        let seen = seen.lock().unwrap();
        let files: Vec<_> = seen.iter().filter_map(|loc| loc.no_namespace.as_deref()).collect();
        assert_eq!(files, ["wrap.xsd", "extra.xsd", "deep.xsd", "y.xsd"]);
    }

    #[test]
    fn test_read_from_recorded_events() {
        let registry = orders().freeze();
        let mut cursor = XmlCursor::from_str(ORDER);
        cursor.next_tag().unwrap();
        let mut buffer = EventBuffer::new();
        buffer.record_subtree(&mut cursor).unwrap();

        let first: Option<Order> = registry.read(&mut buffer.cursor()).unwrap();
        let second: Option<Order> = registry.read(&mut buffer.cursor()).unwrap();
        assert_eq!(first.as_ref().map(|o| o.items.len()), Some(2));
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_without_serializer_closes_document() {
        let registry = orders().freeze();
        let mut out = Vec::new();
        let result = registry.write(&42u32, &mut out);
        assert!(matches!(result, Err(BindError::SerializeFailure { .. })));
    }

    #[test]
    fn test_trim_keeps_inner_whitespace_around_entities() {
        let xml = r#"<order id="1"><note>  fish &amp; chips  </note></order>"#;

        let registry = orders().reader_config(ReaderConfig::new().trim_text(true)).freeze();
        let order: Order = registry.from_xml(xml).unwrap();
        assert_eq!(order.note.as_deref(), Some("fish & chips"));

        let registry = orders().freeze();
        let order: Order = registry.from_xml(xml).unwrap();
        assert_eq!(order.note.as_deref(), Some("  fish & chips  "));
    }

    /// Accepts every byte, then fails to flush
    struct FailingFlush(Vec<u8>);

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "flush refused"))
        }
    }

    struct BrokenOrderSerializer;

    impl Serializer for BrokenOrderSerializer {
        type Input = Order;

        fn create_element(&self, order: &Order, _namespaces: &[String]) -> Option<Element> {
            Some(Element::local("order").with_attribute(QName::local("id"), order.id.as_str()))
        }

        fn write_child_elements(&self, _order: &Order, _writer: &mut StreamWriter<'_>) -> Result<()> {
            Err(BindError::serialize::<Order>("items unavailable"))
        }
    }

    #[test]
    fn test_flush_error_does_not_mask_serialize_error() {
        let mut builder = Registry::builder();
        builder.register_serializer("", BrokenOrderSerializer).unwrap();
        let registry = builder.freeze();

        let mut out = FailingFlush(Vec::new());
        let result = registry.write(&Order::default(), &mut out);
        assert!(matches!(result, Err(BindError::SerializeFailure { .. })), "{:?}", result);

        let mut out = FailingFlush(Vec::new());
        let result = orders().freeze().write(&42u32, &mut out);
        assert!(matches!(result, Err(BindError::SerializeFailure { .. })), "{:?}", result);

        // with nothing else wrong the flush error surfaces
        let mut out = FailingFlush(Vec::new());
        let result = orders().freeze().write(&Item::default(), &mut out);
        assert!(matches!(result, Err(BindError::Io(_))), "{:?}", result);
    }

    #[test]
    fn test_parallel_reads_share_registry() {
        let registry = orders().freeze();
        let docs = [
            r#"<item sku="a"><qty>1</qty></item>"#,
            r#"<item sku="b"><qty>x</qty></item>"#,
            r#"<item sku="c"><qty>3</qty></item>"#,
        ];
        let results = registry.read_all_parallel::<Item>(&docs);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().ok().map(|i| i.qty), Some(1));
        assert!(matches!(results[1], Err(BindError::BuildFailure { .. })));
        assert_eq!(results[2].as_ref().ok().map(|i| i.sku.as_str()), Some("c"));

        let items = vec![Item { sku: "a".into(), qty: 1 }, Item { sku: "b".into(), qty: 2 }];
        let written = registry.write_all_parallel(&items);
        assert_eq!(
            written[1].as_ref().ok().map(String::as_str),
            Some(r#"<item sku="b"><qty>2</qty></item>"#)
        );
    }
}
