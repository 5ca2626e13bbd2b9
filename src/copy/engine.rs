//! Copy Engine
//!
//! Resolves one strategy per exact type, in this order: a registered custom
//! strategy, always-self, always-absent, then the type's own
//! [`Duplicate`] implementation (containers and structural types).

use super::CopyConfig;
use crate::error::{BindError, Result};
use crate::tracing_macros::debug;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A value the engine knows how to copy
pub trait Duplicate: Any + Sized {
    /// Immutable value type: copies may always share
    const IDENTITY: bool = false;

    /// A second handle to the same value, if the type can share
    ///
    /// Shallow copies use this for fields and container elements.
    fn share(&self) -> Option<Self> {
        None
    }

    /// A new value equivalent to `self`
    ///
    /// Nested values go through `copier`, which applies the engine's
    /// strategies and remembers shared nodes.
    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self>;
}

/// Types copied by building a blank instance and then filling its fields
pub trait Structural: Any + Sized {
    /// New instance of the same type with every field empty or default
    fn blank(&self) -> Self;

    /// Copy every field of `self` into `target`
    ///
    /// Use [`Copier::field`] for fields so deep and shallow copies both
    /// work.
    fn copy_fields(&self, target: &mut Self, copier: &mut Copier<'_>) -> Result<()>;
}

/// Copy a structural value: blank instance, then its fields
pub fn structural<T: Structural>(value: &T, copier: &mut Copier<'_>) -> Result<T> {
    let mut target = value.blank();
    value.copy_fields(&mut target, copier)?;
    Ok(target)
}

type CustomFn = Arc<dyn Fn(&dyn Any, &mut Copier<'_>) -> Result<Option<Box<dyn Any>>> + Send + Sync>;
type CloneFn = fn(&dyn Any) -> Option<Box<dyn Any>>;

fn custom<F>(f: F) -> CustomFn
where
    F: for<'a, 'b, 'e> Fn(&'a dyn Any, &'b mut Copier<'e>) -> Result<Option<Box<dyn Any>>> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn clone_any<T: Clone + 'static>(value: &dyn Any) -> Option<Box<dyn Any>> {
    value.downcast_ref::<T>().map(|v| Box::new(v.clone()) as Box<dyn Any>)
}

/// Per-type strategy table
#[derive(Clone, Default)]
pub struct CopyEngine {
    custom: HashMap<TypeId, CustomFn>,
    identity: HashMap<TypeId, CloneFn>,
    absent: HashMap<TypeId, &'static str>,
    config: CopyConfig,
}

impl fmt::Debug for CopyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyEngine")
            .field("custom", &self.custom.len())
            .field("identity", &self.identity.len())
            .field("absent", &self.absent.values().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl CopyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CopyConfig) -> Self {
        CopyEngine {
            config,
            ..Self::default()
        }
    }

    /// Propagate failures instead of turning failed branches absent
    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Copy `T` with `f`; returning `None` makes the copy absent
    pub fn register<T, F>(&mut self, f: F) -> &mut Self
    where
        T: Duplicate,
        F: Fn(&T, &mut Copier<'_>) -> Result<Option<T>> + Send + Sync + 'static,
    {
        let erased = custom(move |value, copier| {
            let value = value
                .downcast_ref::<T>()
                .ok_or_else(|| BindError::copy::<T>("strategy called with another type"))?;
            Ok(f(value, copier)?.map(|copy| Box::new(copy) as Box<dyn Any>))
        });
        self.custom.insert(TypeId::of::<T>(), erased);
        self
    }

    /// Copies of `T` are the value itself (a clone of the handle)
    pub fn always_self<T: Duplicate + Clone>(&mut self) -> &mut Self {
        self.identity.insert(TypeId::of::<T>(), clone_any::<T>);
        self
    }

    /// Copies of `T` are always absent
    pub fn always_absent<T: Duplicate>(&mut self) -> &mut Self {
        self.absent.insert(TypeId::of::<T>(), std::any::type_name::<T>());
        self
    }

    /// Copy the whole graph reachable from `value`
    ///
    /// A `Weak` that reaches a node before that node is copied is first
    /// left pointing at the original. If such a node turns out to be copied
    /// later in the same call, the copy is redone with those nodes reserved
    /// up front, so every back-reference into the copied graph points at a
    /// clone.
    pub fn deep_copy<T: Duplicate>(&self, value: &T) -> Result<Option<T>> {
        let mut copier = Copier::new(self, true);
        let copy = copier.copy(value)?;
        let forward = copier.forward_targets();
        if forward.is_empty() {
            return Ok(copy);
        }
        drop(copy);
        debug!(nodes = forward.len(), "back-references copied before their target, copying again");
        let mut copier = Copier::new(self, true);
        copier.forward = forward;
        copier.copy(value)
    }

    /// Copy `value` itself, sharing everything it refers to
    pub fn shallow_copy<T: Duplicate>(&self, value: &T) -> Result<Option<T>> {
        Copier::new(self, false).copy(value)
    }

    fn overrides(&self, id: &TypeId) -> bool {
        self.custom.contains_key(id) || self.absent.contains_key(id)
    }
}

/// State of one top-level copy call
///
/// Holds the identity map from source nodes to their clones; it is dropped
/// with the copier when the call returns.
pub struct Copier<'e> {
    engine: &'e CopyEngine,
    deep: bool,
    context: HashMap<usize, Box<dyn Any>>,
    /// Nodes known to be copied somewhere in this call
    forward: HashSet<usize>,
    /// Clones reserved by a back-reference, contents not copied yet
    reserved: HashSet<usize>,
    /// Back-reference targets that were not copied yet when reached
    missed: Vec<usize>,
}

impl<'e> Copier<'e> {
    fn new(engine: &'e CopyEngine, deep: bool) -> Self {
        Copier {
            engine,
            deep,
            context: HashMap::new(),
            forward: HashSet::new(),
            reserved: HashSet::new(),
            missed: Vec::new(),
        }
    }

    pub fn is_deep(&self) -> bool {
        self.deep
    }

    pub fn is_strict(&self) -> bool {
        self.engine.config.strict
    }

    /// Copy a value through the engine's strategies
    ///
    /// `None` means absent: an always-absent type, a custom strategy that
    /// declined, or a failure swallowed in lenient mode.
    pub fn copy<T: Duplicate>(&mut self, value: &T) -> Result<Option<T>> {
        let id = TypeId::of::<T>();
        let engine = self.engine;
        let result = if let Some(f) = engine.custom.get(&id) {
            f(value as &dyn Any, self).and_then(|copy| match copy {
                Some(copy) => copy
                    .downcast::<T>()
                    .map(|copy| Some(*copy))
                    .map_err(|_| BindError::copy::<T>("custom strategy returned another type")),
                None => Ok(None),
            })
        } else if let Some(clone) = engine.identity.get(&id) {
            Ok(clone(value as &dyn Any).and_then(|copy| copy.downcast::<T>().ok()).map(|copy| *copy))
        } else if engine.absent.contains_key(&id) {
            Ok(None)
        } else {
            value.duplicate(self).map(Some)
        };

        match result {
            Err(err) if !engine.config.strict => {
                debug!(target_type = std::any::type_name::<T>(), error = %err, "copy failed, branch left absent");
                drop(err);
                Ok(None)
            }
            other => other,
        }
    }

    /// Copy a value that must be present
    pub fn required<T: Duplicate>(&mut self, value: &T) -> Result<T> {
        self.copy(value)?
            .ok_or_else(|| BindError::copy::<T>("required value copied as absent"))
    }

    /// Copy a field or container element
    ///
    /// Deep copies recurse; shallow copies share when the type can.
    pub fn field<T: Duplicate>(&mut self, value: &T) -> Result<Option<T>> {
        if !self.deep {
            if let Some(shared) = value.share() {
                return Ok(Some(shared));
            }
        }
        self.copy(value)
    }

    /// Whether a container of `T` may share its elements wholesale
    pub fn can_share_elements<T: Duplicate>(&self) -> bool {
        if self.engine.overrides(&TypeId::of::<T>()) {
            return !self.deep;
        }
        !self.deep || T::IDENTITY
    }

    /// Clone already made for the source node at `address`
    pub fn lookup<T: Clone + 'static>(&self, address: usize) -> Option<T> {
        self.context.get(&address)?.downcast_ref::<T>().cloned()
    }

    /// Remember the clone of the source node at `address`
    ///
    /// Must happen before the node's contents are copied so that cycles
    /// resolve to this clone.
    pub fn remember<T: 'static>(&mut self, address: usize, clone: T) {
        self.context.insert(address, Box::new(clone));
    }

    /// Reserve the clone of a node reached through a back-reference
    ///
    /// The clone's contents are filled in when the node itself is copied.
    pub(crate) fn reserve<T: 'static>(&mut self, address: usize, clone: T) {
        self.reserved.insert(address);
        self.remember(address, clone);
    }

    /// Whether the clone at `address` still waits for its contents;
    /// clears the reservation
    pub(crate) fn take_reserved(&mut self, address: usize) -> bool {
        self.reserved.remove(&address)
    }

    /// Whether the node at `address` is copied somewhere in this call
    pub(crate) fn is_forward(&self, address: usize) -> bool {
        self.forward.contains(&address)
    }

    /// Note a back-reference whose target had no clone yet
    pub(crate) fn miss(&mut self, address: usize) {
        self.missed.push(address);
    }

    /// Missed back-reference targets that were copied after all
    fn forward_targets(&self) -> HashSet<usize> {
        self.missed
            .iter()
            .copied()
            .filter(|address| self.context.contains_key(address))
            .collect()
    }
}
