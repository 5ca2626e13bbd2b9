//! Reader configuration

use std::fmt;
use std::sync::Arc;

/// Schema locations announced on a start tag via `xsi:` attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaLocation {
    /// (namespace, location) pairs from `xsi:schemaLocation`
    pub locations: Vec<(String, String)>,
    /// Value of `xsi:noNamespaceSchemaLocation`
    pub no_namespace: Option<String>,
}

impl SchemaLocation {
    /// Parse the whitespace-separated pair list of `xsi:schemaLocation`
    ///
    /// A trailing namespace without a location is ignored.
    pub fn parse(schema_location: Option<&str>, no_namespace: Option<&str>) -> Self {
        let mut locations = Vec::new();
        if let Some(value) = schema_location {
            let mut parts = value.split_whitespace();
            while let (Some(ns), Some(loc)) = (parts.next(), parts.next()) {
                locations.push((ns.to_string(), loc.to_string()));
            }
        }
        SchemaLocation {
            locations,
            no_namespace: no_namespace.map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.no_namespace.is_none()
    }
}

/// Callback handed schema locations as they are encountered
pub type SchemaLocationHook = Arc<dyn Fn(&SchemaLocation) + Send + Sync>;

/// Options controlling a read session
#[derive(Clone)]
pub struct ReaderConfig {
    /// Materialize elements without a builder as a [`crate::dom::Document`]
    pub fallback: bool,
    /// Capacity of the per-session cache of factory-built builders
    pub builder_cache: usize,
    /// Trim whitespace around the text returned by `read_text`
    pub trim_text: bool,
    pub schema_location_hook: Option<SchemaLocationHook>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            fallback: false,
            builder_cache: 64,
            trim_text: false,
            schema_location_hook: None,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(mut self, enabled: bool) -> Self {
        self.fallback = enabled;
        self
    }

    pub fn builder_cache(mut self, capacity: usize) -> Self {
        self.builder_cache = capacity;
        self
    }

    pub fn trim_text(mut self, trim: bool) -> Self {
        self.trim_text = trim;
        self
    }

    pub fn schema_location_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SchemaLocation) + Send + Sync + 'static,
    {
        self.schema_location_hook = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for ReaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderConfig")
            .field("fallback", &self.fallback)
            .field("builder_cache", &self.builder_cache)
            .field("trim_text", &self.trim_text)
            .field("schema_location_hook", &self.schema_location_hook.is_some())
            .finish()
    }
}
