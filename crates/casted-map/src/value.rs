//! The per-key cell that holds a raw value and its memoized cast.
//!
//! A cell moves through `Uncast -> Casting -> Cast`. `Casting` only exists while the owning map's
//! transform is running for this cell, so seeing it when evaluation starts means the
//! transform has come back around to its own key.
use crate::error::{CastError, CastResult};
use crate::map::CastedMap;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a logical cell.
///
/// A fresh id is minted on every write. Cloning a map or carrying a cell across a merge keeps the
/// id, which is how a merge recognizes an entry it already holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellId(u64);

impl CellId {
    fn next() -> Self {
        CellId(NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a [`CastedMap`] instance. Clones get their own id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MapId(u64);

impl MapId {
    pub(crate) fn next() -> Self {
        MapId(NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastStatus {
    Uncast,
    Casting,
    Cast,
}

#[derive(Clone, Debug, PartialEq)]
enum CastState<V> {
    Uncast,
    Casting,
    Cast(V),
}

#[derive(Debug)]
pub struct CastValue<V> {
    id: CellId,
    raw: V,
    state: RefCell<CastState<V>>,
    owner: Cell<MapId>,
}

impl<V> CastValue<V> {
    pub(crate) fn new(raw: V, owner: MapId) -> Self {
        Self {
            id: CellId::next(),
            raw,
            state: RefCell::new(CastState::Uncast),
            owner: Cell::new(owner),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn raw(&self) -> &V {
        &self.raw
    }

    pub fn owner(&self) -> MapId {
        self.owner.get()
    }

    pub(crate) fn set_owner(&self, owner: MapId) {
        self.owner.set(owner);
    }

    pub fn status(&self) -> CastStatus {
        match &*self.state.borrow() {
            CastState::Uncast => CastStatus::Uncast,
            CastState::Casting => CastStatus::Casting,
            CastState::Cast(_) => CastStatus::Cast,
        }
    }

    pub fn is_cast(&self) -> bool {
        self.status() == CastStatus::Cast
    }

    pub fn is_casting(&self) -> bool {
        self.status() == CastStatus::Casting
    }

    pub fn mark_casting(&self) {
        *self.state.borrow_mut() = CastState::Casting;
    }

    pub(crate) fn into_raw(self) -> V {
        self.raw
    }

    /// Same raw value and same cast state, regardless of identity or owner.
    pub(crate) fn same_contents(&self, other: &Self) -> bool
    where
        V: PartialEq,
    {
        self.raw == other.raw && *self.state.borrow() == *other.state.borrow()
    }
}

impl<V: Clone> CastValue<V> {
    /// Cached result, if the cell has been cast.
    pub fn result(&self) -> Option<V> {
        match &*self.state.borrow() {
            CastState::Cast(result) => Some(result.clone()),
            CastState::Uncast | CastState::Casting => None,
        }
    }

    /// Trusts the raw value as already cast. The transform will not run for this cell.
    pub fn mark_cast(&self) {
        *self.state.borrow_mut() = CastState::Cast(self.raw.clone());
    }

    /// Copy of this cell owned by `owner`, keeping its id and cast result.
    ///
    /// An in-flight `Casting` belongs to the source map's evaluation and is not carried over.
    pub(crate) fn carried_to(&self, owner: MapId) -> Self {
        let state = match &*self.state.borrow() {
            CastState::Casting => CastState::Uncast,
            other => other.clone(),
        };
        Self {
            id: self.id,
            raw: self.raw.clone(),
            state: RefCell::new(state),
            owner: Cell::new(owner),
        }
    }

    /// Returns the cast value, running `owner`'s transform on first use.
    ///
    /// On success the cell ends up `Cast`. On any failure (a cycle, or an error or panic from the
    /// transform) the cell is put back to `Uncast` so a later read can retry.
    pub(crate) fn evaluate(&self, owner: &CastedMap<V>, key: &str) -> CastResult<V> {
        debug_assert_eq!(
            self.owner.get(),
            owner.id(),
            "`{key}` evaluated through a map that does not own it"
        );

        match &*self.state.borrow() {
            CastState::Cast(result) => return Ok(result.clone()),
            CastState::Casting => {
                log::warn!("cyclic cast detected: `{key}` was read while being cast");
                return Err(CastError::CyclicCast {
                    key: key.to_string(),
                });
            }
            CastState::Uncast => {}
        }

        let guard = CastingGuard::enter(self);
        log::trace!("casting `{key}`");
        let result = owner.transform().apply(owner, key, &self.raw)?;
        guard.finish(result.clone());
        log::trace!("cast `{key}` complete");
        Ok(result)
    }
}

/// Holds a cell in `Casting` and restores `Uncast` unless the cast completes.
struct CastingGuard<'a, V> {
    cell: &'a CastValue<V>,
    finished: bool,
}

impl<'a, V> CastingGuard<'a, V> {
    fn enter(cell: &'a CastValue<V>) -> Self {
        cell.mark_casting();
        Self {
            cell,
            finished: false,
        }
    }

    fn finish(mut self, result: V) {
        *self.cell.state.borrow_mut() = CastState::Cast(result);
        self.finished = true;
    }
}

impl<V> Drop for CastingGuard<'_, V> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(mut state) = self.cell.state.try_borrow_mut() {
            // The transform may have marked its own key cast; only undo our own `Casting`.
            if matches!(*state, CastState::Casting) {
                *state = CastState::Uncast;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_cells_are_uncast_with_fresh_ids() {
        let owner = MapId::next();
        let a = CastValue::new(1, owner);
        let b = CastValue::new(1, owner);

        assert_eq!(a.status(), CastStatus::Uncast);
        assert_eq!(a.result(), None);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.owner(), owner);
    }

    #[test]
    fn mark_cast_uses_raw_as_result() {
        let cell = CastValue::new("raw".to_string(), MapId::next());
        cell.mark_cast();

        assert!(cell.is_cast());
        assert_eq!(cell.result(), Some("raw".to_string()));
    }

    #[test]
    fn carried_cell_keeps_identity_and_result_under_new_owner() {
        let source = MapId::next();
        let dest = MapId::next();
        let cell = CastValue::new(7, source);
        cell.mark_cast();

        let carried = cell.carried_to(dest);
        assert_eq!(carried.id(), cell.id());
        assert_eq!(carried.owner(), dest);
        assert_eq!(carried.result(), Some(7));
        assert_eq!(cell.owner(), source);
    }

    #[test]
    fn carried_cell_drops_in_flight_casting() {
        let cell = CastValue::new(7, MapId::next());
        cell.mark_casting();

        let carried = cell.carried_to(MapId::next());
        assert_eq!(carried.status(), CastStatus::Uncast);
        assert!(cell.is_casting());
    }

    #[test]
    fn guard_restores_uncast_when_not_finished() {
        let cell = CastValue::new(1, MapId::next());
        {
            let _guard = CastingGuard::enter(&cell);
            assert!(cell.is_casting());
        }
        assert_eq!(cell.status(), CastStatus::Uncast);
    }
}
