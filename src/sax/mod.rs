//! SAX (Simple API for XML) Module
//!
//! The push side of the token interface: anything that accepts a stream of
//! document events implements [`EventSink`].
//!
//! ## Architecture
//!
//! ```text
//! EventBuffer::send ----> EventSink <---- (any push source)
//!                            |
//!          +-----------------+------------------+
//!          v                 v                  v
//!    StreamWriter      EventBuffer        EventCollector
//!    (serializes)      (records)          (inspection)
//! ```
//!
//! Prefix mappings are announced before the start tag they belong to,
//! and attributes travel with their start tag.

pub mod collector;
pub mod events;

pub use collector::EventCollector;
pub use events::SaxEvent;

use crate::core::{Attributes, QName};
use crate::error::Result;

/// Receiver of push-style document events
pub trait EventSink {
    fn start_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }

    /// Announce a namespace binding for the next start tag
    fn start_prefix_mapping(&mut self, _prefix: &str, _uri: &str) -> Result<()> {
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<()>;

    fn end_element(&mut self, name: &QName) -> Result<()>;

    fn characters(&mut self, text: &str) -> Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn start_document(&mut self) -> Result<()> {
        (**self).start_document()
    }

    fn end_document(&mut self) -> Result<()> {
        (**self).end_document()
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        (**self).start_prefix_mapping(prefix, uri)
    }

    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<()> {
        (**self).start_element(name, attributes)
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        (**self).end_element(name)
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        (**self).characters(text)
    }
}
