//! Writer configuration

use crate::core::OutputEncoding;

/// Options controlling a write session
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub encoding: OutputEncoding,
    /// Escape `<` and `&` in character data
    pub escape_text: bool,
    /// Emit an XML declaration from `write_start_document`
    pub declaration: bool,
    /// Spaces per nesting level; `None` writes everything on one line
    pub indent: Option<usize>,
    /// Global (namespace URI, prefix) bindings, preferred over anything else
    pub prefixes: Vec<(String, String)>,
    /// Namespaces a serializer may be chosen from; empty accepts any
    pub namespaces: Vec<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            encoding: OutputEncoding::Utf8,
            escape_text: true,
            declaration: true,
            indent: None,
            prefixes: Vec::new(),
            namespaces: Vec::new(),
        }
    }
}

impl WriterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoding(mut self, encoding: OutputEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn escape_text(mut self, escape: bool) -> Self {
        self.escape_text = escape;
        self
    }

    pub fn declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    pub fn indent(mut self, spaces: usize) -> Self {
        self.indent = Some(spaces);
        self
    }

    /// Always write `uri` with `prefix`
    pub fn bind_prefix(mut self, uri: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.prefixes.push((uri.into(), prefix.into()));
        self
    }

    /// Accept serializers registered under `namespace`
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.push(namespace.into());
        self
    }

    /// Global prefix for a namespace, the last binding winning
    pub fn global_prefix(&self, uri: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .rev()
            .find(|(bound, _)| bound == uri)
            .map(|(_, prefix)| prefix.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_prefix_last_wins() {
        let config = WriterConfig::new()
            .bind_prefix("urn:a", "a")
            .bind_prefix("urn:b", "b")
            .bind_prefix("urn:a", "alpha");
        assert_eq!(config.global_prefix("urn:a"), Some("alpha"));
        assert_eq!(config.global_prefix("urn:b"), Some("b"));
        assert_eq!(config.global_prefix("urn:c"), None);
    }
}
