//! Change set for recording result deltas.
//!
//! A ChangeSet accumulates the insert, remove and replace notifications a
//! result handle observed, in the order they happened.

use alloc::vec::Vec;

/// A set of observed changes to a result.
///
/// This struct tracks:
/// - `inserted`: Items inserted, with the index they landed at
/// - `removed`: Items removed, with the index they were removed from
/// - `replaced`: Items replaced in place (index, old value, new value)
/// - `done`: Whether the initial population completed
#[derive(Clone, Debug)]
pub struct ChangeSet<T> {
    /// Items that were inserted
    pub inserted: Vec<(usize, T)>,
    /// Items that were removed
    pub removed: Vec<(usize, T)>,
    /// Items that were replaced (index, old, new)
    pub replaced: Vec<(usize, T, T)>,
    /// Whether the done notification was observed
    pub done: bool,
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChangeSet<T> {
    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self {
            inserted: Vec::new(),
            removed: Vec::new(),
            replaced: Vec::new(),
            done: false,
        }
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty() && self.replaced.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.inserted.len() + self.removed.len() + self.replaced.len()
    }

    /// Merges another change set into this one.
    pub fn merge(&mut self, other: ChangeSet<T>) {
        self.inserted.extend(other.inserted);
        self.removed.extend(other.removed);
        self.replaced.extend(other.replaced);
        self.done |= other.done;
    }

    /// Clears all changes. The done flag is kept.
    pub fn clear(&mut self) {
        self.inserted.clear();
        self.removed.clear();
        self.replaced.clear();
    }

    /// Records an insertion.
    #[inline]
    pub fn insert(&mut self, index: usize, item: T) {
        self.inserted.push((index, item));
    }

    /// Records a removal.
    #[inline]
    pub fn remove(&mut self, index: usize, item: T) {
        self.removed.push((index, item));
    }

    /// Records an in-place replacement.
    #[inline]
    pub fn replace(&mut self, index: usize, old: T, new: T) {
        self.replaced.push((index, old, new));
    }
}
