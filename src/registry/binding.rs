//! Builder and Serializer capabilities
//!
//! A builder turns one element into one typed object; a serializer turns one
//! typed object into one element. Both are registered once and shared, so
//! they take `&self` and keep per-read state in the object being built.

use crate::core::{Attributes, QName};
use crate::dom::{Document, Element};
use crate::error::{BindError, Result};
use crate::reader::StreamReader;
use crate::writer::StreamWriter;
use std::any::Any;

/// Constructs and populates one object of type `Output` from a start tag
/// and the tokens that follow it.
pub trait Builder: Send + Sync + 'static {
    type Output: 'static;

    /// Create the object for an element; `None` fails the read
    fn create(&self, name: &QName) -> Option<Self::Output>;

    /// Populate the object from the start tag
    ///
    /// The reader is positioned at the start tag and must stay there.
    fn initialize(
        &self,
        _object: &mut Self::Output,
        _name: &QName,
        _attributes: &Attributes,
        _reader: &mut StreamReader<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Consume one direct child element
    ///
    /// Called with the reader at the child's start tag. On return the reader
    /// must sit at that child's end tag. Unknown children are skipped.
    fn build_child(
        &self,
        _object: &mut Self::Output,
        _name: &QName,
        _attributes: &Attributes,
        reader: &mut StreamReader<'_>,
    ) -> Result<()> {
        reader.skip_element()
    }
}

/// Produces the element representation of one object of type `Input`.
pub trait Serializer: Send + Sync + 'static {
    type Input: 'static;

    /// Element for `object`, given the namespaces the writer accepts
    /// (empty means any). `None` means the object is not representable.
    fn create_element(&self, object: &Self::Input, namespaces: &[String]) -> Option<Element>;

    /// Adjust the element before its start tag is written
    fn initialize_element(
        &self,
        _element: &mut Element,
        _object: &Self::Input,
        _writer: &StreamWriter<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Write children after the element's own content, before its end tag
    fn write_child_elements(&self, _object: &Self::Input, _writer: &mut StreamWriter<'_>) -> Result<()> {
        Ok(())
    }
}

/// Outcome of reading one element
#[derive(Debug)]
pub enum ParseResult<T> {
    /// A builder produced a typed object
    Object(T),
    /// No builder matched and the element was materialized
    Node(Document),
    /// No builder matched and the element was skipped
    Empty,
}

impl<T> ParseResult<T> {
    pub fn object(self) -> Option<T> {
        match self {
            ParseResult::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn node(self) -> Option<Document> {
        match self {
            ParseResult::Node(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ParseResult::Object(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ParseResult::Empty)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseResult<U> {
        match self {
            ParseResult::Object(object) => ParseResult::Object(f(object)),
            ParseResult::Node(doc) => ParseResult::Node(doc),
            ParseResult::Empty => ParseResult::Empty,
        }
    }
}

impl ParseResult<Box<dyn Any>> {
    /// Narrow a type-erased object; fails if it holds another type
    pub fn downcast<T: 'static>(self) -> Result<ParseResult<T>> {
        match self {
            ParseResult::Object(object) => object
                .downcast::<T>()
                .map(|object| ParseResult::Object(*object))
                .map_err(|_| BindError::protocol(format!("object is not a {}", std::any::type_name::<T>()))),
            ParseResult::Node(doc) => Ok(ParseResult::Node(doc)),
            ParseResult::Empty => Ok(ParseResult::Empty),
        }
    }
}

/// Type-erased builder stored in the registry
pub(crate) trait ErasedBuilder: Send + Sync {
    fn build(&self, reader: &mut StreamReader<'_>) -> Result<Box<dyn Any>>;
}

pub(crate) struct BuilderAdapter<B>(pub B);

impl<B: Builder> ErasedBuilder for BuilderAdapter<B> {
    fn build(&self, reader: &mut StreamReader<'_>) -> Result<Box<dyn Any>> {
        Ok(Box::new(reader.read_object(&self.0)?))
    }
}

/// Type-erased serializer stored in the registry
pub(crate) trait ErasedSerializer: Send + Sync {
    fn write(&self, object: &dyn Any, writer: &mut StreamWriter<'_>) -> Result<()>;
}

pub(crate) struct SerializerAdapter<S>(pub S);

impl<S: Serializer> ErasedSerializer for SerializerAdapter<S> {
    fn write(&self, object: &dyn Any, writer: &mut StreamWriter<'_>) -> Result<()> {
        let object = object
            .downcast_ref::<S::Input>()
            .ok_or_else(|| BindError::serialize::<S::Input>("object has a different type"))?;
        writer.write_with(&self.0, object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result_accessors() {
        let r: ParseResult<u8> = ParseResult::Object(3);
        assert!(r.is_object());
        assert_eq!(r.map(|v| v * 2).object(), Some(6));

        let r: ParseResult<u8> = ParseResult::Node(Document::new());
        assert!(r.node().is_some());
        assert!(ParseResult::<u8>::Empty.is_empty());
    }

    #[test]
    fn test_downcast() {
        let r: ParseResult<Box<dyn Any>> = ParseResult::Object(Box::new(7u32));
        assert_eq!(r.downcast::<u32>().unwrap().object(), Some(7));

        let r: ParseResult<Box<dyn Any>> = ParseResult::Object(Box::new(7u32));
        assert!(r.downcast::<String>().is_err());
    }
}
