//! XML Writer Module
//!
//! Push side of the binding engine:
//! - StreamWriter: depth- and namespace-scoped markup emitter
//! - NamespaceScopes: per-depth prefix layers, also used by buffer replay
//! - WriterConfig: encoding, escaping, declaration, indentation, prefixes

pub mod config;
pub mod scope;
pub mod stream;

pub use config::WriterConfig;
pub use scope::NamespaceScopes;
pub use stream::StreamWriter;
