//! Key normalization and the ordered key store backing [`crate::CastedMap`].
//!
//! Every key is a string, so the symbol/string distinction collapses on its own. What remains is
//! whether two spellings that differ only by case address the same entry. The store keeps the
//! first spelling it saw for display and iteration, and looks entries up by the normalized form.
use std::borrow::Cow;
use std::collections::HashMap;

/// How keys are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum KeyNormalization {
    /// Keys match byte-for-byte.
    #[default]
    Exact,
    /// Keys match after Unicode-aware case folding (`straße` == `STRASSE`).
    CaseInsensitive,
}

impl KeyNormalization {
    pub fn normalize<'a>(self, key: &'a str) -> Cow<'a, str> {
        match self {
            KeyNormalization::Exact => Cow::Borrowed(key),
            KeyNormalization::CaseInsensitive => Cow::Owned(casefold(key)),
        }
    }

    pub fn keys_match(self, a: &str, b: &str) -> bool {
        match self {
            KeyNormalization::Exact => a == b,
            KeyNormalization::CaseInsensitive => {
                if a.is_ascii() && b.is_ascii() {
                    a.eq_ignore_ascii_case(b)
                } else {
                    casefold(a) == casefold(b)
                }
            }
        }
    }
}

fn casefold(key: &str) -> String {
    if key.is_ascii() {
        key.to_ascii_uppercase()
    } else {
        key.chars().flat_map(|ch| ch.to_uppercase()).collect()
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    key: String,
    value: T,
}

/// Insertion-ordered map from normalized string keys to `T`.
#[derive(Clone, Debug)]
pub(crate) struct KeyStore<T> {
    normalization: KeyNormalization,
    slots: Vec<Slot<T>>,
    index: HashMap<String, usize>,
}

impl<T> KeyStore<T> {
    pub(crate) fn new(normalization: KeyNormalization) -> Self {
        Self {
            normalization,
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn normalization(&self) -> KeyNormalization {
        self.normalization
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.index
            .get(self.normalization.normalize(key).as_ref())
            .copied()
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub(crate) fn get(&self, key: &str) -> Option<&T> {
        let idx = self.position(key)?;
        self.slots.get(idx).map(|slot| &slot.value)
    }

    /// Entry for `key` together with its stored spelling.
    pub(crate) fn get_key_value(&self, key: &str) -> Option<(&str, &T)> {
        let idx = self.position(key)?;
        self.slots
            .get(idx)
            .map(|slot| (slot.key.as_str(), &slot.value))
    }

    /// Inserts or replaces the entry for `key`, returning the replaced value.
    ///
    /// A replaced entry keeps its position and its original spelling.
    pub(crate) fn insert(&mut self, key: &str, value: T) -> Option<T> {
        if let Some(idx) = self.position(key) {
            return Some(std::mem::replace(&mut self.slots[idx].value, value));
        }

        let idx = self.slots.len();
        self.index
            .insert(self.normalization.normalize(key).into_owned(), idx);
        self.slots.push(Slot {
            key: key.to_string(),
            value,
        });
        None
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<(String, T)> {
        let idx = self
            .index
            .remove(self.normalization.normalize(key).as_ref())?;
        let slot = self.slots.remove(idx);
        for pos in self.index.values_mut() {
            if *pos > idx {
                *pos -= 1;
            }
        }
        Some((slot.key, slot.value))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &T)> + '_ {
        self.slots.iter().map(|slot| (slot.key.as_str(), &slot.value))
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().map(|slot| &slot.value)
    }

    /// Same keys and order, with every value converted by `f`.
    pub(crate) fn map_values<U>(&self, mut f: impl FnMut(&T) -> U) -> KeyStore<U> {
        KeyStore {
            normalization: self.normalization,
            slots: self
                .slots
                .iter()
                .map(|slot| Slot {
                    key: slot.key.clone(),
                    value: f(&slot.value),
                })
                .collect(),
            index: self.index.clone(),
        }
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.iter().map(|slot| slot.key.as_str())
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = (String, T)> {
        self.slots.into_iter().map(|slot| (slot.key, slot.value))
    }
}
