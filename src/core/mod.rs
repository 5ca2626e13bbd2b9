//! Core XML primitives
//!
//! This module contains the building blocks shared by the reader, writer
//! and event buffer:
//! - Names: qualified names, attribute maps, namespace declarations
//! - Entities: entity resolution and output escaping
//! - Encoding: UTF-16 detection on input, target encodings on output

pub mod encoding;
pub mod entities;
pub mod names;

pub use encoding::OutputEncoding;
pub use entities::Escape;
pub use names::{ns, Attribute, Attributes, NamespaceDecl, QName};
