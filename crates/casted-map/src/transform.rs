use crate::error::CastResult;
use crate::map::CastedMap;
use std::fmt;
use std::rc::Rc;

type CastFn<V> = dyn Fn(&CastedMap<V>, &str, &V) -> CastResult<V>;

/// The cast applied to each value the first time it is read.
///
/// Every transform has the shape `(map, key, raw) -> result`. The `from_*` constructors adapt the
/// narrower shapes (no arguments, value only, key and value) so callers don't have to ignore
/// parameters by hand.
///
/// Cloning a transform is cheap and keeps its identity: two transforms compare equal only when
/// they share the same function object.
pub struct Transform<V> {
    f: Rc<CastFn<V>>,
}

impl<V> Transform<V> {
    /// Full form. The map handle lets the transform read other keys; reading the key currently
    /// being cast fails with [`crate::CastError::CyclicCast`].
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CastedMap<V>, &str, &V) -> CastResult<V> + 'static,
    {
        Self { f: Rc::new(f) }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> V + 'static,
    {
        Self::new(move |_, _, _| Ok(f()))
    }

    pub fn from_value_fn<F>(f: F) -> Self
    where
        F: Fn(&V) -> V + 'static,
    {
        Self::new(move |_, _, raw| Ok(f(raw)))
    }

    pub fn from_keyed_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &V) -> V + 'static,
    {
        Self::new(move |_, key, raw| Ok(f(key, raw)))
    }

    pub(crate) fn apply(&self, map: &CastedMap<V>, key: &str, raw: &V) -> CastResult<V> {
        (self.f)(map, key, raw)
    }

    pub fn same_as(&self, other: &Transform<V>) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl<V: Clone> Transform<V> {
    pub fn identity() -> Self {
        Self::new(|_, _, raw| Ok(raw.clone()))
    }
}

impl<V> Clone for Transform<V> {
    fn clone(&self) -> Self {
        Self { f: Rc::clone(&self.f) }
    }
}

impl<V> PartialEq for Transform<V> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl<V> fmt::Debug for Transform<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform({:p})", Rc::as_ptr(&self.f).cast::<()>())
    }
}
