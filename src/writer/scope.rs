//! Namespace Scopes
//!
//! Stack-based prefix bookkeeping shared by the writer and by buffer replay.
//! Each element entry pushes a layer; bindings declared in it disappear when
//! the layer is popped. Lookups run innermost first, so an inner binding of
//! a prefix hides every outer binding of that prefix.

use crate::core::ns;
use std::collections::HashSet;

/// Namespace binding (prefix -> URI) and the layer it lives in
#[derive(Debug, Clone)]
struct Binding {
    prefix: String,
    uri: String,
    depth: usize,
}

/// Stack of namespace-scope layers
#[derive(Debug, Clone)]
pub struct NamespaceScopes {
    bindings: Vec<Binding>,
    depth: usize,
}

impl Default for NamespaceScopes {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceScopes {
    /// Scopes with the `xml` prefix pre-bound
    pub fn new() -> Self {
        NamespaceScopes {
            bindings: vec![Binding {
                prefix: "xml".to_string(),
                uri: ns::XML.to_string(),
                depth: 0,
            }],
            depth: 0,
        }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a binding in the current layer; `xml` and `xmlns` are fixed
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        self.bindings.push(Binding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: self.depth,
        });
    }

    /// Namespace bound to `prefix` (empty prefix is the default namespace)
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
    }

    /// Effective default namespace, empty when none is declared
    pub fn default_namespace(&self) -> &str {
        self.resolve("").unwrap_or("")
    }

    /// Visible prefix for `uri`
    ///
    /// A binding is skipped when a more recent layer rebinds its prefix.
    /// With `allow_default` false the default namespace is never returned
    /// (attributes cannot use it).
    pub fn prefix_for(&self, uri: &str, allow_default: bool) -> Option<&str> {
        let mut seen = HashSet::new();
        for binding in self.bindings.iter().rev() {
            if !seen.insert(binding.prefix.as_str()) {
                continue;
            }
            if binding.uri == uri && (allow_default || !binding.prefix.is_empty()) {
                return Some(&binding.prefix);
            }
        }
        None
    }

    /// Whether `prefix` was declared in the current layer
    pub fn declared_here(&self, prefix: &str) -> bool {
        self.bindings
            .iter()
            .rev()
            .take_while(|b| b.depth == self.depth)
            .any(|b| b.prefix == prefix)
    }

    /// Get current depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Visible bindings, innermost first
    pub fn active_bindings(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let mut seen = HashSet::new();
        self.bindings.iter().rev().filter_map(move |b| {
            if seen.insert(b.prefix.as_str()) {
                Some((b.prefix.as_str(), b.uri.as_str()))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_prefix_predeclared() {
        let mut scopes = NamespaceScopes::new();
        assert_eq!(scopes.resolve("xml"), Some(ns::XML));
        scopes.push_scope();
        scopes.declare("xml", "urn:other");
        assert_eq!(scopes.prefix_for(ns::XML, false), Some("xml"));
    }

    #[test]
    fn test_prefix_visible_until_layer_popped() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("p", "urn:p");
        for _ in 0..5 {
            scopes.push_scope();
            assert_eq!(scopes.prefix_for("urn:p", true), Some("p"));
        }
        for _ in 0..5 {
            scopes.pop_scope();
        }
        assert_eq!(scopes.resolve("p"), Some("urn:p"));
        scopes.pop_scope();
        assert_eq!(scopes.resolve("p"), None);
        assert_eq!(scopes.prefix_for("urn:p", true), None);
    }

    #[test]
    fn test_rebound_prefix_hides_outer_uri() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("p", "urn:one");
        scopes.push_scope();
        scopes.declare("p", "urn:two");

        assert_eq!(scopes.prefix_for("urn:one", true), None);
        assert_eq!(scopes.prefix_for("urn:two", true), Some("p"));

        scopes.pop_scope();
        assert_eq!(scopes.prefix_for("urn:one", true), Some("p"));
    }

    #[test]
    fn test_inner_binding_of_same_uri_wins() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("a", "urn:x");
        scopes.push_scope();
        scopes.declare("b", "urn:x");
        assert_eq!(scopes.prefix_for("urn:x", true), Some("b"));
    }

    #[test]
    fn test_default_namespace_skipped_for_attributes() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("", "urn:d");
        assert_eq!(scopes.prefix_for("urn:d", true), Some(""));
        assert_eq!(scopes.prefix_for("urn:d", false), None);
        assert_eq!(scopes.default_namespace(), "urn:d");
    }

    #[test]
    fn test_declared_here() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("a", "urn:a");
        scopes.push_scope();
        assert!(!scopes.declared_here("a"));
        scopes.declare("b", "urn:b");
        assert!(scopes.declared_here("b"));
        assert_eq!(scopes.active_bindings().count(), 3);
    }
}
