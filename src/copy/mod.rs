//! Copy Engine Module
//!
//! Deep and shallow copies of arbitrary object graphs, driven by a per-type
//! strategy table:
//! - CopyEngine: strategy table and entry points
//! - Copier: state of one copy call (identity map, mode)
//! - Duplicate / Structural: how a type copies itself
//!
//! ## Strategy order
//!
//! ```text
//! custom strategy  >  always self  >  always absent  >  Duplicate impl
//! ```
//!
//! User types implement [`Duplicate`], usually by implementing
//! [`Structural`] and delegating to [`structural`]. Shared nodes should be
//! held as `Rc<RefCell<T>>` so aliasing and cycles are preserved.

pub mod engine;
mod impls;

pub use engine::{structural, Copier, CopyEngine, Duplicate, Structural};

/// Options for a [`CopyEngine`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyConfig {
    /// Propagate copy failures instead of leaving the failed branch absent
    pub strict: bool,
}

impl CopyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
