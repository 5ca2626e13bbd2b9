//! XML Reader Module
//!
//! Pull side of the binding engine:
//! - TokenCursor / XmlCursor: depth-tracked token stream over quick-xml
//! - StreamReader: builds typed objects one element at a time
//! - ReaderConfig: fallback, builder cache, schema-location callback

pub mod config;
pub mod cursor;
pub mod events;
pub mod stream;

pub use config::{ReaderConfig, SchemaLocation, SchemaLocationHook};
pub use cursor::{TokenCursor, XmlCursor};
pub use events::{StartElement, XmlEvent};
pub use stream::StreamReader;
