//! Built-in copy rules
//!
//! Immutable value types copy as themselves. Containers copy into a new
//! container of the same kind, element by element; absent elements are left
//! out. Shared mutable nodes (`Rc<RefCell<T>>`) copy once per call, so
//! aliasing and cycles survive a deep copy.

use super::engine::{Copier, Duplicate, Structural};
use crate::dom::{Document, Element};
use crate::error::{BindError, Result};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::rc::{Rc, Weak};
use std::sync::Arc;

macro_rules! identity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Duplicate for $ty {
                const IDENTITY: bool = true;

                fn share(&self) -> Option<Self> {
                    Some(self.clone())
                }

                fn duplicate(&self, _copier: &mut Copier<'_>) -> Result<Self> {
                    Ok(self.clone())
                }
            }
        )*
    };
}

identity!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
    &'static str,
    Rc<str>,
    Arc<str>,
);

impl<T: Duplicate> Duplicate for Option<T> {
    const IDENTITY: bool = T::IDENTITY;

    fn share(&self) -> Option<Self> {
        match self {
            None => Some(None),
            Some(value) => value.share().map(Some),
        }
    }

    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        match self {
            None => Ok(None),
            Some(value) => copier.field(value),
        }
    }
}

impl<T: Duplicate> Duplicate for Box<T> {
    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        copier
            .field(&**self)?
            .map(Box::new)
            .ok_or_else(|| BindError::copy::<Self>("boxed value copied as absent"))
    }
}

/// Copy a sequence, sharing wholesale when the element type allows it
fn sequence<'s, T, I>(items: I, len: usize, copier: &mut Copier<'_>) -> Result<Vec<T>>
where
    T: Duplicate + 's,
    I: Iterator<Item = &'s T> + Clone,
{
    if copier.can_share_elements::<T>() {
        if let Some(shared) = items.clone().map(T::share).collect::<Option<Vec<T>>>() {
            return Ok(shared);
        }
    }
    let mut out = Vec::with_capacity(len);
    for item in items {
        if let Some(copy) = copier.field(item)? {
            out.push(copy);
        }
    }
    Ok(out)
}

impl<T: Duplicate> Duplicate for Vec<T> {
    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        sequence(self.iter(), self.len(), copier)
    }
}

impl<T: Duplicate> Duplicate for VecDeque<T> {
    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        sequence(self.iter(), self.len(), copier).map(VecDeque::from)
    }
}

impl<T: Duplicate, const N: usize> Duplicate for [T; N] {
    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        let mut out = Vec::with_capacity(N);
        for item in self {
            let copy = copier
                .field(item)?
                .ok_or_else(|| BindError::copy::<Self>("array element copied as absent"))?;
            out.push(copy);
        }
        out.try_into()
            .map_err(|_| BindError::copy::<Self>("array length changed while copying"))
    }
}

impl<T: Duplicate + Eq + Hash> Duplicate for HashSet<T> {
    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        let mut out = HashSet::with_capacity(self.len());
        for item in self {
            if let Some(copy) = copier.field(item)? {
                out.insert(copy);
            }
        }
        Ok(out)
    }
}

impl<T: Duplicate + Ord> Duplicate for BTreeSet<T> {
    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        let mut out = BTreeSet::new();
        for item in self {
            if let Some(copy) = copier.field(item)? {
                out.insert(copy);
            }
        }
        Ok(out)
    }
}

impl<K: Duplicate + Eq + Hash, V: Duplicate> Duplicate for HashMap<K, V> {
    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        let mut out = HashMap::with_capacity(self.len());
        for (key, value) in self {
            if let (Some(key), Some(value)) = (copier.field(key)?, copier.field(value)?) {
                out.insert(key, value);
            }
        }
        Ok(out)
    }
}

impl<K: Duplicate + Ord, V: Duplicate> Duplicate for BTreeMap<K, V> {
    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        let mut out = BTreeMap::new();
        for (key, value) in self {
            if let (Some(key), Some(value)) = (copier.field(key)?, copier.field(value)?) {
                out.insert(key, value);
            }
        }
        Ok(out)
    }
}

fn address<T>(node: &Rc<RefCell<T>>) -> usize {
    Rc::as_ptr(node) as *const () as usize
}

/// Shared mutable node: copied once per call, aliases preserved
impl<T: Structural> Duplicate for Rc<RefCell<T>> {
    fn share(&self) -> Option<Self> {
        Some(Rc::clone(self))
    }

    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        let key = address(self);
        if let Some(existing) = copier.lookup::<Self>(key) {
            if copier.take_reserved(key) {
                fill(self, &existing, copier)?;
            }
            return Ok(existing);
        }

        let source = self
            .try_borrow()
            .map_err(|_| BindError::copy::<T>("node is mutably borrowed"))?;
        let clone = Rc::new(RefCell::new(source.blank()));
        drop(source);
        copier.remember(key, Rc::clone(&clone));
        fill(self, &clone, copier)?;
        Ok(clone)
    }
}

fn fill<T: Structural>(source: &Rc<RefCell<T>>, clone: &Rc<RefCell<T>>, copier: &mut Copier<'_>) -> Result<()> {
    let source = source
        .try_borrow()
        .map_err(|_| BindError::copy::<T>("node is mutably borrowed"))?;
    let mut target = clone
        .try_borrow_mut()
        .map_err(|_| BindError::copy::<T>("clone is already borrowed"))?;
    source.copy_fields(&mut target, copier)
}

/// Back-reference: follows the clone made in this call, else keeps pointing
/// at the original
impl<T: Structural> Duplicate for Weak<RefCell<T>> {
    fn share(&self) -> Option<Self> {
        Some(Weak::clone(self))
    }

    fn duplicate(&self, copier: &mut Copier<'_>) -> Result<Self> {
        let Some(node) = self.upgrade() else {
            return Ok(Weak::new());
        };
        if !copier.is_deep() {
            return Ok(Weak::clone(self));
        }
        let key = address(&node);
        if let Some(clone) = copier.lookup::<Rc<RefCell<T>>>(key) {
            return Ok(Rc::downgrade(&clone));
        }
        if copier.is_forward(key) {
            let source = node
                .try_borrow()
                .map_err(|_| BindError::copy::<T>("node is mutably borrowed"))?;
            let clone = Rc::new(RefCell::new(source.blank()));
            copier.reserve(key, Rc::clone(&clone));
            return Ok(Rc::downgrade(&clone));
        }
        copier.miss(key);
        Ok(Weak::clone(self))
    }
}

impl Duplicate for Element {
    fn duplicate(&self, _copier: &mut Copier<'_>) -> Result<Self> {
        Ok(self.clone())
    }
}

impl Duplicate for Document {
    fn duplicate(&self, _copier: &mut Copier<'_>) -> Result<Self> {
        Ok(self.clone())
    }
}
