//! DOM Module - Fallback and intermediate trees
//!
//! Two representations:
//! - Element: owned tree that serializers materialize and hand to the writer
//! - Document: arena of nodes with NodeId (u32) parent links, produced when
//!   the reader meets an element nobody registered a builder for

pub mod document;
pub mod element;
pub mod node;

pub use document::{DescendantIter, Document, DOCUMENT_NODE};
pub use element::{Content, Element};
pub use node::{Node, NodeId, NodeKind};
