//! [`CastedMap`]: a string-keyed map whose values are cast lazily.
//!
//! Writes store raw values. The map's [`Transform`] runs the first time a key is read and the
//! result is memoized in that key's [`CastValue`] until the key is written, deleted or replaced by
//! a merge.
//!
//! # Merging
//!
//! [`CastedMap::merge_into`] copies every entry of the other map into the receiver, carrying the
//! incoming cast status along with the value. Keys that only the receiver has are untouched. The
//! receiver keeps its own transform, and every carried cell is re-owned by the receiver so that a
//! later first read runs the receiver's transform. An incoming cell that is the same logical cell
//! the receiver already holds for that key (a map merged with a clone of itself, or an entry merged
//! back a second time) is skipped, so a cast entry never regresses to uncast.
use crate::error::{CastError, CastResult};
use crate::key::KeyStore;
use crate::options::MapOptions;
use crate::transform::Transform;
use crate::value::{CastStatus, CastValue, MapId};
use std::collections::HashMap;
use std::fmt;

pub struct CastedMap<V> {
    id: MapId,
    entries: KeyStore<CastValue<V>>,
    transform: Transform<V>,
}

#[derive(Debug, Default)]
struct MergeStats {
    inserted: usize,
    replaced: usize,
    skipped: usize,
}

impl<V> CastedMap<V> {
    pub fn new(transform: Transform<V>) -> Self {
        Self::with_options(transform, MapOptions::default())
    }

    pub fn with_options(transform: Transform<V>, options: MapOptions) -> Self {
        Self {
            id: MapId::next(),
            entries: KeyStore::new(options.key_normalization),
            transform,
        }
    }

    pub fn from_pairs<K, I>(pairs: I, transform: Transform<V>) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::from_pairs_with_options(pairs, transform, MapOptions::default())
    }

    pub fn from_pairs_with_options<K, I>(
        pairs: I,
        transform: Transform<V>,
        options: MapOptions,
    ) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::with_options(transform, options);
        map.update_from_pairs(pairs);
        map
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    pub fn transform(&self) -> &Transform<V> {
        &self.transform
    }

    pub fn options(&self) -> MapOptions {
        MapOptions {
            key_normalization: self.entries.normalization(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: impl AsRef<str>) -> bool {
        self.entries.contains_key(key.as_ref())
    }

    /// Keys in insertion order, using the spelling each key was first written with.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys()
    }

    /// Stored value for `key`, without casting it.
    pub fn raw(&self, key: impl AsRef<str>) -> Option<&V> {
        self.cell(key).map(CastValue::raw)
    }

    pub fn cell(&self, key: impl AsRef<str>) -> Option<&CastValue<V>> {
        self.entries.get(key.as_ref())
    }

    /// Stores `value` under `key` as a new uncast cell, discarding whatever was memoized for the
    /// previous value.
    pub fn write(&mut self, key: impl AsRef<str>, value: V) {
        let cell = CastValue::new(value, self.id);
        self.entries.insert(key.as_ref(), cell);
    }

    pub fn store(&mut self, key: impl AsRef<str>, value: V) {
        self.write(key, value);
    }

    /// Removes `key`, returning its raw value.
    pub fn delete(&mut self, key: impl AsRef<str>) -> Option<V> {
        self.entries
            .remove(key.as_ref())
            .map(|(_, cell)| cell.into_raw())
    }

    /// Writes every pair. An empty collection leaves the map as it was.
    pub fn update_from_pairs<K, I>(&mut self, pairs: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in pairs {
            self.write(key, value);
        }
    }

    pub fn status(&self, key: impl AsRef<str>) -> Option<CastStatus> {
        self.cell(key).map(CastValue::status)
    }

    pub fn is_cast(&self, key: impl AsRef<str>) -> bool {
        self.cell(key).is_some_and(CastValue::is_cast)
    }

    pub fn is_casting(&self, key: impl AsRef<str>) -> bool {
        self.cell(key).is_some_and(CastValue::is_casting)
    }

    /// Forces each present key into `Casting`; a later read of it fails as a cycle. Absent keys
    /// are ignored.
    pub fn mark_casting<K, I>(&self, keys: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = K>,
    {
        for key in keys {
            if let Some(cell) = self.cell(key) {
                cell.mark_casting();
            }
        }
    }

    /// Moves every cell under this map's ownership.
    fn reown_all(&self) {
        for cell in self.entries.values() {
            cell.set_owner(self.id);
        }
    }

    fn holds_cell(&self, key: &str, incoming: &CastValue<V>) -> bool {
        self.entries
            .get(key)
            .is_some_and(|existing| existing.id() == incoming.id())
    }

    fn insert_carried(&mut self, key: &str, cell: CastValue<V>, stats: &mut MergeStats) {
        debug_assert_eq!(cell.owner(), self.id);
        if self.entries.insert(key, cell).is_some() {
            stats.replaced += 1;
        } else {
            stats.inserted += 1;
        }
    }

    /// Merges `other` into this map, moving its cells instead of copying them.
    pub fn absorb(&mut self, other: CastedMap<V>) {
        if other.is_empty() {
            return;
        }

        let mut stats = MergeStats::default();
        for (key, cell) in other.entries.into_entries() {
            if self.holds_cell(&key, &cell) {
                stats.skipped += 1;
                continue;
            }
            cell.set_owner(self.id);
            self.insert_carried(&key, cell, &mut stats);
        }
        self.reown_all();

        log::debug!(
            "absorbed map: {} inserted, {} replaced, {} already held",
            stats.inserted,
            stats.replaced,
            stats.skipped
        );
    }
}

impl<V: Clone> CastedMap<V> {
    /// Cast value for `key`, or `None` if the key is absent.
    pub fn read(&self, key: impl AsRef<str>) -> CastResult<Option<V>> {
        let Some((key, cell)) = self.entries.get_key_value(key.as_ref()) else {
            return Ok(None);
        };
        cell.evaluate(self, key).map(Some)
    }

    /// Like [`CastedMap::read`], but an absent key is an error.
    pub fn fetch(&self, key: impl AsRef<str>) -> CastResult<V> {
        let key = key.as_ref();
        self.read(key)?.ok_or_else(|| CastError::KeyNotFound {
            key: key.to_string(),
        })
    }

    /// Cast value for `key`, or `default` when the key is absent. The key is not added.
    pub fn fetch_or(&self, key: impl AsRef<str>, default: V) -> CastResult<V> {
        Ok(self.read(key)?.unwrap_or(default))
    }

    pub fn fetch_or_else<F>(&self, key: impl AsRef<str>, default: F) -> CastResult<V>
    where
        F: FnOnce(&str) -> V,
    {
        let key = key.as_ref();
        Ok(match self.read(key)? {
            Some(value) => value,
            None => default(key),
        })
    }

    pub fn values_at<K, I>(&self, keys: I) -> CastResult<Vec<Option<V>>>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = K>,
    {
        keys.into_iter().map(|key| self.read(key)).collect()
    }

    /// All cast values in insertion order. Casts every key that hasn't been cast yet.
    pub fn values(&self) -> CastResult<Vec<V>> {
        self.iter().map(|(_, value)| value).collect()
    }

    /// Entries in insertion order, casting each one as it is reached.
    pub fn iter(&self) -> impl Iterator<Item = (&str, CastResult<V>)> + '_ {
        self.entries
            .iter()
            .map(move |(key, cell)| (key, cell.evaluate(self, key)))
    }

    /// Trusts the stored value of each present key as already cast. Absent keys are ignored.
    pub fn mark_cast<K, I>(&self, keys: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = K>,
    {
        for key in keys {
            if let Some(cell) = self.cell(key) {
                cell.mark_cast();
            }
        }
    }

    /// Casts every entry and returns the results as a plain map.
    pub fn casted_snapshot(&self) -> CastResult<HashMap<String, V>> {
        self.iter()
            .map(|(key, value)| value.map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Results of the entries that are already cast. Nothing is cast by this call.
    pub fn casted_only(&self) -> HashMap<String, V> {
        self.entries
            .iter()
            .filter_map(|(key, cell)| cell.result().map(|result| (key.to_string(), result)))
            .collect()
    }

    /// Copies `other`'s entries into this map. See the module docs for the carry-over rules.
    pub fn merge_into(&mut self, other: &CastedMap<V>) {
        if other.is_empty() {
            return;
        }

        let mut stats = MergeStats::default();
        for (key, incoming) in other.entries.iter() {
            if self.holds_cell(key, incoming) {
                stats.skipped += 1;
                continue;
            }
            let cell = incoming.carried_to(self.id);
            self.insert_carried(key, cell, &mut stats);
        }
        self.reown_all();

        log::debug!(
            "merged map: {} inserted, {} replaced, {} already held",
            stats.inserted,
            stats.replaced,
            stats.skipped
        );
    }

    /// Non-mutating [`CastedMap::merge_into`]: merges `other` into a clone of this map.
    #[must_use]
    pub fn merge(&self, other: &CastedMap<V>) -> CastedMap<V> {
        let mut merged = self.clone();
        merged.merge_into(other);
        merged
    }
}

/// A copy is a new map with the same transform. Cells keep their identity and cast results and
/// are owned by the copy.
impl<V: Clone> Clone for CastedMap<V> {
    fn clone(&self) -> Self {
        let id = MapId::next();
        Self {
            id,
            entries: self.entries.map_values(|cell| cell.carried_to(id)),
            transform: self.transform.clone(),
        }
    }
}

impl<V: PartialEq> PartialEq for CastedMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.transform == other.transform
            && self.options() == other.options()
            && self.len() == other.len()
            && self.entries.iter().all(|(key, cell)| {
                other
                    .entries
                    .get(key)
                    .is_some_and(|theirs| cell.same_contents(theirs))
            })
    }
}

impl<K, V> Extend<(K, V)> for CastedMap<V>
where
    K: AsRef<str>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.update_from_pairs(iter);
    }
}

/// Uncast value shown as `<raw>`.
struct Pending<'a, V>(&'a V);

impl<V: fmt::Debug> fmt::Debug for Pending<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?}>", self.0)
    }
}

impl<V: fmt::Debug + Clone> fmt::Debug for CastedMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, cell) in self.entries.iter() {
            match cell.result() {
                Some(result) => map.entry(&key, &result),
                None => map.entry(&key, &Pending(cell.raw())),
            };
        }
        map.finish()
    }
}
