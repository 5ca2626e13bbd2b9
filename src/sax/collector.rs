//! SAX Collector
//!
//! Implements EventSink by collecting every event in order.

use super::events::SaxEvent;
use super::EventSink;
use crate::core::{Attributes, QName};
use crate::error::Result;

/// Sink that gathers events for later inspection
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<SaxEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the collected events
    pub fn take_events(&mut self) -> Vec<SaxEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[SaxEvent] {
        &self.events
    }

    /// Summaries of all events, see [`SaxEvent::summary`]
    pub fn summaries(&self) -> Vec<String> {
        self.events.iter().map(SaxEvent::summary).collect()
    }
}

impl EventSink for EventCollector {
    fn start_document(&mut self) -> Result<()> {
        self.events.push(SaxEvent::StartDocument);
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.events.push(SaxEvent::EndDocument);
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.events.push(SaxEvent::PrefixMapping {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<()> {
        self.events.push(SaxEvent::StartElement {
            name: name.clone(),
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        self.events.push(SaxEvent::EndElement { name: name.clone() });
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.events.push(SaxEvent::Characters(text.to_string()));
        Ok(())
    }
}
