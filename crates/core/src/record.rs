//! Raw records and change events.
//!
//! A record is the unit of data owned by the external store. This crate never
//! owns the store; it only needs a stable identity per record and a way to
//! describe the notifications the store's monitor delivers.

use core::fmt::Debug;
use core::hash::Hash;

/// A record coming from the external store.
///
/// The identity returned by `id` must stay stable across every version of the
/// same record, so that a `Changed` event can be matched with the record that
/// was seen before.
pub trait Record: Clone + 'static {
    /// Stable identity type.
    type Id: Eq + Hash + Clone + Debug;

    /// Returns the record identity.
    fn id(&self) -> Self::Id;
}

/// Kind of a change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One notification from the external monitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent<R> {
    /// The record was created in the store.
    Added(R),
    /// The record was deleted from the store.
    Removed(R),
    /// The record was modified in the store.
    Changed(R),
}

impl<R> ChangeEvent<R> {
    /// Returns the kind of this event.
    #[inline]
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Added(_) => ChangeKind::Added,
            ChangeEvent::Removed(_) => ChangeKind::Removed,
            ChangeEvent::Changed(_) => ChangeKind::Changed,
        }
    }

    /// Returns a reference to the record.
    #[inline]
    pub fn record(&self) -> &R {
        match self {
            ChangeEvent::Added(r) | ChangeEvent::Removed(r) | ChangeEvent::Changed(r) => r,
        }
    }

    /// Consumes the event and returns the record.
    #[inline]
    pub fn into_record(self) -> R {
        match self {
            ChangeEvent::Added(r) | ChangeEvent::Removed(r) | ChangeEvent::Changed(r) => r,
        }
    }

    /// Maps the record to a new type, preserving the kind.
    #[inline]
    pub fn map<U, F>(self, f: F) -> ChangeEvent<U>
    where
        F: FnOnce(R) -> U,
    {
        match self {
            ChangeEvent::Added(r) => ChangeEvent::Added(f(r)),
            ChangeEvent::Removed(r) => ChangeEvent::Removed(f(r)),
            ChangeEvent::Changed(r) => ChangeEvent::Changed(f(r)),
        }
    }
}
