use crate::key::KeyNormalization;

/// Per-map settings, fixed when the map is constructed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapOptions {
    /// How keys are compared. Incoming keys of a merge are normalized with the destination's rule.
    pub key_normalization: KeyNormalization,
}

impl MapOptions {
    #[must_use]
    pub fn case_insensitive() -> Self {
        Self {
            key_normalization: KeyNormalization::CaseInsensitive,
        }
    }

    #[must_use]
    pub fn with_key_normalization(mut self, key_normalization: KeyNormalization) -> Self {
        self.key_normalization = key_normalization;
        self
    }
}
