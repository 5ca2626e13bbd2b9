//! xmlbind - Bidirectional binding between XML streams and typed objects
//!
//! Components:
//! Registry: (namespace, element) to builder, (type, namespace) to serializer
//! Reader: recursive-descent construction over a token cursor (StreamReader)
//! Writer: namespace-aware streaming output (StreamWriter)
//! Event Buffer: chunked event recording with shared and release replay
//! Copy Engine: deep and shallow graph copies with per-type strategies
//!
//! ```text
//!  &str / BufRead ──> XmlCursor ──┐
//!                                 ├──> StreamReader ──> Builder ──> T
//!  EventBuffer ──> BufferCursor ──┘
//!
//!  T ──> Serializer ──> Element ──> StreamWriter ──> io::Write
//! ```

mod tracing_macros;

pub mod buffer;
pub mod copy;
pub mod core;
pub mod dom;
pub mod error;
pub mod reader;
pub mod registry;
pub mod sax;
pub mod writer;

pub use buffer::{BufferConfig, BufferCursor, BufferedEvent, EventBuffer};
pub use copy::{CopyConfig, CopyEngine, Copier, Duplicate, Structural};
pub use core::{Attributes, NamespaceDecl, OutputEncoding, QName};
pub use dom::{Document, Element};
pub use error::{BindError, Result};
pub use reader::{ReaderConfig, StreamReader, TokenCursor, XmlCursor, XmlEvent};
pub use registry::{Builder, ParseResult, Registry, RegistryBuilder, Serializer};
pub use sax::EventSink;
pub use writer::{StreamWriter, WriterConfig};
