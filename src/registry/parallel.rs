//! Parallel batch reads and writes
//!
//! A frozen [`Registry`] is immutable, so one registry can serve many
//! documents at once. Each document gets its own reader or writer session.

use super::Registry;
use crate::error::Result;
use rayon::prelude::*;

impl Registry {
    /// Read one `T` from each document in parallel
    ///
    /// Results keep the order of `documents`.
    pub fn read_all_parallel<T: Send + 'static>(&self, documents: &[&str]) -> Vec<Result<T>> {
        documents.par_iter().map(|xml| self.from_xml::<T>(xml)).collect()
    }

    /// Serialize each object in parallel
    pub fn write_all_parallel<T: Sync + 'static>(&self, objects: &[T]) -> Vec<Result<String>> {
        objects.par_iter().map(|object| self.to_xml(object)).collect()
    }
}
