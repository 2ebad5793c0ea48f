//! Categorical filter map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Dimension;

/// Current value per dimension. An absent value means "no constraint".
///
/// Serializes as an object with every dimension present, unset ones as
/// `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<Dimension, Option<String>>",
    into = "BTreeMap<Dimension, Option<String>>"
)]
pub struct FilterMap {
    values: BTreeMap<Dimension, String>,
}

impl FilterMap {
    /// Creates a map with every dimension unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `dimension`, if constrained.
    #[must_use]
    pub fn get(&self, dimension: Dimension) -> Option<&str> {
        self.values.get(&dimension).map(String::as_str)
    }

    /// Whether `dimension` is constrained.
    #[must_use]
    pub fn is_set(&self, dimension: Dimension) -> bool {
        self.values.contains_key(&dimension)
    }

    /// Sets a single dimension. `None` or an empty string clears it.
    ///
    /// Returns `true` if the map changed.
    pub fn set(&mut self, dimension: Dimension, value: Option<&str>) -> bool {
        match value {
            Some(v) if !v.is_empty() => {
                if self.get(dimension) == Some(v) {
                    return false;
                }
                self.values.insert(dimension, v.to_string());
                true
            }
            _ => self.clear(dimension),
        }
    }

    /// Clears a single dimension. Returns `true` if it was set.
    pub fn clear(&mut self, dimension: Dimension) -> bool {
        self.values.remove(&dimension).is_some()
    }

    /// Clears every dimension.
    pub fn clear_all(&mut self) {
        self.values.clear();
    }

    /// Number of constrained dimensions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.values.len()
    }

    /// Whether no dimension is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every dimension in canonical order with its value.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, Option<&str>)> {
        Dimension::ALL.into_iter().map(|d| (d, self.get(d)))
    }

    /// Constrained dimensions in canonical order.
    pub fn iter_active(&self) -> impl Iterator<Item = (Dimension, &str)> {
        self.values.iter().map(|(d, v)| (*d, v.as_str()))
    }

    /// Constrained dimensions other than `excluded`, in canonical order.
    #[must_use]
    pub fn active_excluding(&self, excluded: Dimension) -> Vec<(Dimension, String)> {
        self.iter_active()
            .filter(|(d, _)| *d != excluded)
            .map(|(d, v)| (d, v.to_string()))
            .collect()
    }

    /// Value to show as selected in a dropdown.
    ///
    /// Only a value that is a member of a loaded, non-empty candidate list is
    /// shown. A value awaiting reconciliation is displayed as unset.
    #[must_use]
    pub fn display_value<'a>(
        &'a self,
        dimension: Dimension,
        candidates: Option<&[String]>,
    ) -> Option<&'a str> {
        let value = self.get(dimension)?;
        let candidates = candidates.filter(|c| !c.is_empty())?;
        candidates.iter().any(|c| c == value).then_some(value)
    }
}

impl From<BTreeMap<Dimension, Option<String>>> for FilterMap {
    fn from(raw: BTreeMap<Dimension, Option<String>>) -> Self {
        let mut map = Self::new();
        for (dimension, value) in raw {
            map.set(dimension, value.as_deref());
        }
        map
    }
}

impl From<FilterMap> for BTreeMap<Dimension, Option<String>> {
    fn from(map: FilterMap) -> Self {
        Dimension::ALL
            .into_iter()
            .map(|d| (d, map.get(d).map(str::to_string)))
            .collect()
    }
}
