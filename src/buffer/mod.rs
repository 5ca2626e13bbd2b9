//! Event Buffer Module
//!
//! Records document events for look-ahead and replay without allocating
//! one node per event:
//! - EventBuffer: chunked recorder, also an [`crate::sax::EventSink`]
//! - BufferedEvent: borrowed or owned view of one recorded event
//! - BufferCursor: replay as a [`crate::reader::TokenCursor`]
//!
//! ## Replay modes
//!
//! ```text
//! shared:   iter() / send() / cursor()   repeatable, buffer untouched
//! release:  drain() / release_to()       single pass, buffer emptied at once
//! ```

mod chunk;
pub mod event;
pub mod event_buffer;
pub mod replay;

pub use event::BufferedEvent;
pub use event_buffer::{Drain, EventBuffer, Iter, Mark, CDATA};
pub use replay::BufferCursor;

/// Default number of event slots per chunk
pub const DEFAULT_CHUNK_CAPACITY: usize = 512;

/// Options for an [`EventBuffer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Event slots per chunk
    pub chunk_capacity: usize,
    /// Keep whitespace-only text before start tags
    pub assume_mixed_content: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            assume_mixed_content: false,
        }
    }
}

impl BufferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_capacity(mut self, slots: usize) -> Self {
        self.chunk_capacity = slots;
        self
    }

    pub fn assume_mixed_content(mut self, assume: bool) -> Self {
        self.assume_mixed_content = assume;
        self
    }
}
