//! Qualified Names and Attribute Maps
//!
//! Names are stored resolved: a namespace URI (empty for "no namespace"),
//! a local name, and an optional prefix hint carried over from the input.

use memchr::memchr;
use std::fmt;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
}

/// Namespace-qualified element or attribute name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI, empty when the name is in no namespace
    pub namespace: String,
    /// Local part
    pub local: String,
    /// Prefix observed in the input or requested for output
    pub prefix: Option<String>,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        QName {
            namespace: namespace.into(),
            local: local.into(),
            prefix: None,
        }
    }

    /// Name in no namespace
    pub fn local(local: impl Into<String>) -> Self {
        QName::new("", local)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Build from a `prefix:local` lexical form and a resolved URI
    pub fn from_lexical(namespace: impl Into<String>, lexical: &str) -> Self {
        let (prefix, local) = split_name(lexical);
        let name = QName::new(namespace, local);
        match prefix {
            Some(p) => name.with_prefix(p),
            None => name,
        }
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn local_name(&self) -> &str {
        &self.local
    }

    #[inline]
    pub fn has_namespace(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Whether both names denote the same (namespace, local) pair
    pub fn matches(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }

    /// `prefix:local`, or just `local` without a prefix hint
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }
}

impl fmt::Display for QName {
    /// Clark notation: `{uri}local`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// Split a name into prefix and local name at the colon
pub fn split_name(name: &str) -> (Option<&str>, &str) {
    match memchr(b':', name.as_bytes()) {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

/// A single attribute with its lexical value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// Insertion-ordered attribute map keyed by (namespace, local name)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Attributes::default()
    }

    /// Set an attribute, replacing any existing value for the same name
    pub fn insert(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|a| a.name.matches(&name.namespace, &name.local))
        {
            Some(existing) => {
                existing.value = value;
                if name.prefix.is_some() {
                    existing.name.prefix = name.prefix;
                }
            }
            None => self.entries.push(Attribute { name, value }),
        }
    }

    /// Set an attribute in no namespace
    pub fn insert_local(&mut self, local: impl Into<String>, value: impl Into<String>) {
        self.insert(QName::local(local), value);
    }

    pub fn get(&self, namespace: &str, local: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|a| a.name.matches(namespace, local))
            .map(|a| a.value.as_str())
    }

    /// Value of an attribute in no namespace
    pub fn get_local(&self, local: &str) -> Option<&str> {
        self.get("", local)
    }

    pub fn remove(&mut self, namespace: &str, local: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|a| a.name.matches(namespace, local))?;
        Some(self.entries.remove(pos).value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(QName, String)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (QName, String)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (name, value) in iter {
            attrs.insert(name, value);
        }
        attrs
    }
}

/// A namespace declaration seen on a start tag (`xmlns` / `xmlns:p`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// Empty for the default namespace
    pub prefix: String,
    pub uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("svg:rect"), (Some("svg"), "rect"));
        assert_eq!(split_name("div"), (None, "div"));
    }

    #[test]
    fn test_from_lexical() {
        let name = QName::from_lexical("urn:x", "x:item");
        assert_eq!(name.local_name(), "item");
        assert_eq!(name.prefix.as_deref(), Some("x"));
        assert_eq!(name.lexical(), "x:item");
        assert_eq!(name.to_string(), "{urn:x}item");
    }

    #[test]
    fn test_empty_prefix_is_none() {
        assert_eq!(QName::local("a").with_prefix("").prefix, None);
    }

    #[test]
    fn test_attributes_replace_keeps_order() {
        let mut attrs = Attributes::new();
        attrs.insert_local("a", "1");
        attrs.insert(QName::new("urn:x", "b"), "2");
        attrs.insert_local("a", "3");

        let names: Vec<_> = attrs.iter().map(|a| a.name.local_name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(attrs.get_local("a"), Some("3"));
        assert_eq!(attrs.get("urn:x", "b"), Some("2"));
        assert_eq!(attrs.get_local("b"), None);
    }

    #[test]
    fn test_attributes_remove() {
        let mut attrs: Attributes = [(QName::local("id"), "7".to_string())].into_iter().collect();
        assert_eq!(attrs.remove("", "id").as_deref(), Some("7"));
        assert!(attrs.is_empty());
    }
}
