//! Invertible element correspondences between two graphs.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::graph::ElementId;

/// A unique, invertible correspondence from elements of one graph to
/// elements of another.
///
/// Created fresh per match attempt or structural copy and discarded after
/// use. Inserting a pair removes any earlier pair sharing either side, so
/// the mapping stays a bijection between its domain and image.
#[derive(Debug, Default, Clone)]
pub struct Mapping {
    forward: IndexMap<ElementId, ElementId>,
    inverse: FxHashMap<ElementId, ElementId>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a correspondence, displacing any previous pair that used
    /// either `from` or `to`.
    pub fn insert(&mut self, from: ElementId, to: ElementId) {
        if let Some(old_to) = self.forward.shift_remove(&from) {
            self.inverse.remove(&old_to);
        }
        if let Some(old_from) = self.inverse.remove(&to) {
            self.forward.shift_remove(&old_from);
        }
        self.forward.insert(from, to);
        self.inverse.insert(to, from);
    }

    pub fn get(&self, from: ElementId) -> Option<ElementId> {
        self.forward.get(&from).copied()
    }

    pub fn get_inverse(&self, to: ElementId) -> Option<ElementId> {
        self.inverse.get(&to).copied()
    }

    pub fn contains(&self, from: ElementId) -> bool {
        self.forward.contains_key(&from)
    }

    pub fn contains_image(&self, to: ElementId) -> bool {
        self.inverse.contains_key(&to)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, ElementId)> + '_ {
        self.forward.iter().map(|(k, v)| (*k, *v))
    }

    /// Images in insertion order.
    pub fn images(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.forward.values().copied()
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        // Order-insensitive: two mappings are equal when they relate the
        // same pairs. Used to deduplicate matcher results.
        self.forward.len() == other.forward.len()
            && self
                .forward
                .iter()
                .all(|(k, v)| other.forward.get(k) == Some(v))
    }
}

impl Eq for Mapping {}

impl FromIterator<(ElementId, ElementId)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (ElementId, ElementId)>>(iter: T) -> Self {
        let mut mapping = Mapping::new();
        for (from, to) in iter {
            mapping.insert(from, to);
        }
        mapping
    }
}
