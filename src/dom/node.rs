//! Document node representation
//!
//! Uses NodeId (u32) for compact node references. A node's parent link is a
//! plain index and never keeps anything alive; the parent's child list is
//! the owner.

use crate::core::{Attributes, QName};

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of a document node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root (always node 0)
    Document,
    Element { name: QName, attributes: Attributes },
    Text(String),
}

/// A node in the document arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    /// Whether this node may own children
    pub fn is_container(&self) -> bool {
        !self.is_text()
    }

    pub fn name(&self) -> Option<&QName> {
        match &self.kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match &self.kind {
            NodeKind::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }
}
