//! Document - Arena-based fallback tree
//!
//! Storage for elements that have no builder:
//! - Arena allocation for nodes, node 0 is the document node
//! - NodeId indices for parent links and child lists
//! - Child lists own their nodes; every mutation keeps parent links in step

use super::element::{Content, Element};
use super::node::{Node, NodeId, NodeKind};
use crate::core::{Attributes, QName};
use crate::error::{BindError, Result};
use crate::reader::{TokenCursor, XmlEvent};

/// Id of the document node
pub const DOCUMENT_NODE: NodeId = 0;

/// A generic XML tree stored in arena format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only the document node
    pub fn new() -> Self {
        Document {
            nodes: vec![Node::new(NodeKind::Document)],
        }
    }

    /// Materialize the element at the cursor's current start tag
    ///
    /// Consumes exactly that subtree and leaves the cursor on its end tag.
    /// Adjacent character tokens are merged into one text node.
    pub fn materialize<C: TokenCursor + ?Sized>(cursor: &mut C) -> Result<Document> {
        if !cursor.current().is_start_element() {
            return Err(BindError::protocol(format!(
                "materialize expects a start tag, found {}",
                cursor.current()
            )));
        }
        let mut doc = Document::new();
        let mut stack = vec![DOCUMENT_NODE];

        loop {
            match cursor.current() {
                XmlEvent::StartElement(start) => {
                    let id = doc.create_element(start.name.clone(), start.attributes.clone());
                    let parent = stack.last().copied().unwrap_or(DOCUMENT_NODE);
                    doc.link(parent, id);
                    stack.push(id);
                }
                XmlEvent::Characters(text) => {
                    let parent = stack.last().copied().unwrap_or(DOCUMENT_NODE);
                    doc.append_text(parent, text);
                }
                XmlEvent::EndElement(_) => {
                    stack.pop();
                    if stack.len() == 1 {
                        return Ok(doc);
                    }
                }
                XmlEvent::EndDocument => {
                    return Err(BindError::protocol("input ended while materializing element"));
                }
                XmlEvent::StartDocument => {}
            }
            cursor.advance()?;
        }
    }

    /// Build a document whose root element mirrors `element`
    pub fn from_element(element: &Element) -> Document {
        let mut doc = Document::new();
        let root = doc.import(element);
        doc.link(DOCUMENT_NODE, root);
        doc
    }

    fn import(&mut self, element: &Element) -> NodeId {
        let id = self.create_element(element.name.clone(), element.attributes.clone());
        for content in &element.content {
            match content {
                Content::Text(text) => self.append_text(id, text),
                Content::Element(child) => {
                    let child = self.import(child);
                    self.link(id, child);
                }
            }
        }
        id
    }

    /// Convert the subtree at `id` to an owned element
    pub fn to_element(&self, id: NodeId) -> Option<Element> {
        let node = self.node(id)?;
        let NodeKind::Element { name, attributes } = &node.kind else {
            return None;
        };
        let mut element = Element::new(name.clone());
        element.attributes = attributes.clone();
        for &child in &node.children {
            match &self.nodes[child as usize].kind {
                NodeKind::Text(text) => element.push_text(text.as_str()),
                NodeKind::Element { .. } => {
                    if let Some(child) = self.to_element(child) {
                        element.push_child(child);
                    }
                }
                NodeKind::Document => {}
            }
        }
        Some(element)
    }

    /// Get the root element (first element child of the document node)
    pub fn root_element(&self) -> Option<NodeId> {
        self.nodes[DOCUMENT_NODE as usize]
            .children
            .iter()
            .copied()
            .find(|&id| self.nodes[id as usize].is_element())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(Node::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(Node::parent)
    }

    pub fn name(&self, id: NodeId) -> Option<&QName> {
        self.node(id).and_then(Node::name)
    }

    pub fn attributes(&self, id: NodeId) -> Option<&Attributes> {
        self.node(id).and_then(Node::attributes)
    }

    pub fn attributes_mut(&mut self, id: NodeId) -> Option<&mut Attributes> {
        match &mut self.nodes.get_mut(id as usize)?.kind {
            NodeKind::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    /// Iterate over all descendants of a node (depth-first, document order)
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let stack = self.children(id).iter().rev().copied().collect();
        DescendantIter { doc: self, stack }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.node(id).and_then(Node::text) {
            return text.to_string();
        }
        self.descendants(id)
            .filter_map(|d| self.nodes[d as usize].text())
            .collect()
    }

    /// Create a detached element node
    pub fn create_element(&mut self, name: QName, attributes: Attributes) -> NodeId {
        self.push(Node::new(NodeKind::Element { name, attributes }))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(Node::new(NodeKind::Text(text.into())))
    }

    /// Append `child` to `parent`, detaching it from any previous parent
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.children(parent).len();
        self.insert_children(parent, index, &[child])
    }

    /// Insert `child` at `index` in the child list of `parent`
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.insert_children(parent, index, &[child])
    }

    /// Move a node under a new parent, appending it last
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) -> Result<()> {
        self.append_child(new_parent, child)
    }

    /// Insert several nodes at `index`, in order
    ///
    /// All nodes are validated before anything moves. A node that already
    /// sits in `parent` before `index` shifts the insertion point down.
    pub fn insert_children(&mut self, parent: NodeId, index: usize, children: &[NodeId]) -> Result<()> {
        let len = match self.node(parent) {
            Some(node) if node.is_container() => node.children.len(),
            Some(_) => return Err(BindError::protocol(format!("node {} cannot have children", parent))),
            None => return Err(BindError::protocol(format!("no node {}", parent))),
        };
        if index > len {
            return Err(BindError::protocol(format!(
                "insert index {} out of range for {} children",
                index, len
            )));
        }
        for (i, &child) in children.iter().enumerate() {
            self.check_insertable(parent, child)?;
            if children[..i].contains(&child) {
                return Err(BindError::protocol(format!("node {} inserted twice", child)));
            }
        }

        let mut index = index;
        for &child in children {
            if let Some(pos) = self.position(parent, child) {
                if pos < index {
                    index -= 1;
                }
            }
            self.detach(child);
        }
        let slot = &mut self.nodes[parent as usize].children;
        slot.splice(index..index, children.iter().copied());
        for &child in children {
            self.nodes[child as usize].parent = Some(parent);
        }
        Ok(())
    }

    /// Remove a node from its parent's child list; it stays in the arena
    pub fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        self.nodes[parent as usize].children.retain(|&c| c != child);
        self.nodes[child as usize].parent = None;
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if child == DOCUMENT_NODE || self.node(child).is_none() {
            return Err(BindError::protocol(format!("node {} cannot be inserted", child)));
        }
        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == child {
                return Err(BindError::protocol(format!(
                    "inserting node {} under {} would create a cycle",
                    child, parent
                )));
            }
            ancestor = self.parent(id);
        }
        Ok(())
    }

    fn position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        if self.parent(child) != Some(parent) {
            return None;
        }
        self.children(parent).iter().position(|&c| c == child)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    /// Link a freshly created node as the last child of `parent`
    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent as usize].children.push(child);
        self.nodes[child as usize].parent = Some(parent);
    }

    fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.nodes[parent as usize].children.last() {
            if let NodeKind::Text(existing) = &mut self.nodes[last as usize].kind {
                existing.push_str(text);
                return;
            }
        }
        let id = self.create_text(text);
        self.link(parent, id);
    }
}

/// Iterator over descendant nodes (depth-first)
pub struct DescendantIter<'d> {
    doc: &'d Document,
    stack: Vec<NodeId>,
}

impl<'d> Iterator for DescendantIter<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        // Reverse order so the first child is processed first
        self.stack
            .extend(self.doc.children(current).iter().rev().copied());
        Some(current)
    }
}
