//! Provider: the owner of one query's ordered result collection.
//!
//! A provider holds the sequence of domain objects and a registry of weak
//! references to the result handles observing it. Every mutation notifies
//! each live result with a matching pre/post handler pair, synchronously and
//! in registration order, before the mutating call returns.

use crate::handler::Phase;
use crate::result::{QueryResult, ResultState};
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use trellis_core::{Error, Result};

/// Owner of an ordered collection of items and of its observer registry.
///
/// Providers are always handled through `Rc`. Result handles keep their
/// provider alive; the provider only keeps weak references back to them, so a
/// result going out of scope is all it takes to stop observing.
///
/// The set of results notified is fixed when a mutation starts. A result
/// dropped by a pre handler still receives the post handlers of that same
/// mutation, and nothing after it.
///
/// # Example
///
/// ```ignore
/// let provider = Provider::new();
/// let result = provider.result();
/// result.on_post_insert(|item, index| println!("{} at {}", item, index));
///
/// provider.append(42);
/// assert_eq!(result.data(), vec![42]);
/// ```
pub struct Provider<T> {
    /// The ordered items
    items: RefCell<Vec<T>>,
    /// Registered result handles, in registration order
    observers: RefCell<Vec<Weak<ResultState<T>>>>,
    /// Upstream results this provider is derived from
    upstream: RefCell<Vec<QueryResult<T>>>,
    /// Whether the initial population completed
    done: Cell<bool>,
    /// Set while handlers are being dispatched
    dispatching: Cell<bool>,
}

/// Resets the dispatching flag when a mutation finishes, even on unwind.
struct DispatchGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        debug_assert!(
            !flag.get(),
            "provider mutated from one of its own handlers"
        );
        flag.set(true);
        Self { flag }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl<T: Clone + 'static> Provider<T> {
    /// Creates a new empty provider.
    pub fn new() -> Rc<Self> {
        Self::with_items(Vec::new())
    }

    /// Creates a provider with an initial sequence. No handler fires for it.
    pub fn with_items(items: Vec<T>) -> Rc<Self> {
        Rc::new(Self {
            items: RefCell::new(items),
            observers: RefCell::new(Vec::new()),
            upstream: RefCell::new(Vec::new()),
            done: Cell::new(false),
            dispatching: Cell::new(false),
        })
    }

    /// Creates a new result handle observing this provider.
    pub fn result(self: &Rc<Self>) -> QueryResult<T> {
        QueryResult::create(self)
    }

    /// Registers a result state. Called by `QueryResult::create`.
    pub(crate) fn register(&self, observer: Weak<ResultState<T>>) {
        self.observers.borrow_mut().push(observer);
    }

    /// Keeps an upstream result alive for as long as this provider lives.
    pub(crate) fn retain_upstream(&self, upstream: QueryResult<T>) {
        self.upstream.borrow_mut().push(upstream);
    }

    /// Returns a snapshot of the items.
    pub fn data(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    /// Runs `f` with a borrowed view of the items.
    ///
    /// `f` must not mutate this provider.
    pub fn with_data<U, F>(&self, f: F) -> U
    where
        F: FnOnce(&[T]) -> U,
    {
        f(&self.items.borrow())
    }

    /// Returns a clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    /// Returns the index of the first item matching `pred`.
    pub fn position<F>(&self, pred: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.items.borrow().iter().position(pred)
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Returns true if there are no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Returns whether `done` has been signalled.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.get()
    }

    /// Returns the number of live result registrations, pruning expired ones.
    pub fn observer_count(&self) -> usize {
        self.live_observers().len()
    }

    /// Appends an item at the end.
    pub fn append(&self, item: T) {
        let index = self.len();
        self.insert_unchecked(index, item);
    }

    /// Inserts an item at the front.
    pub fn prepend(&self, item: T) {
        self.insert_unchecked(0, item);
    }

    /// Inserts an item at `index`, shifting later items back.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        let len = self.len();
        if index > len {
            return Err(Error::index_out_of_bounds(index, len));
        }
        self.insert_unchecked(index, item);
        Ok(())
    }

    /// Removes and returns the item at `index`.
    pub fn take_at(&self, index: usize) -> Result<T> {
        let item = self.checked_get(index)?;
        let _guard = DispatchGuard::enter(&self.dispatching);
        let observers = self.live_observers();

        dispatch(&observers, Phase::PreRemove, &item, index);
        self.items.borrow_mut().remove(index);
        dispatch(&observers, Phase::PostRemove, &item, index);
        Ok(item)
    }

    /// Removes the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<()> {
        self.take_at(index).map(|_| ())
    }

    /// Removes and returns the first item.
    pub fn take_first(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.take_at(0).ok()
    }

    /// Removes and returns the last item.
    pub fn take_last(&self) -> Option<T> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.take_at(len - 1).ok()
    }

    /// Replaces the item at `index` and returns the previous one.
    ///
    /// Observers see a pre-replace with the old item and a post-replace with
    /// the new item, both at `index`.
    pub fn replace(&self, index: usize, item: T) -> Result<T> {
        let old = self.checked_get(index)?;
        let _guard = DispatchGuard::enter(&self.dispatching);
        let observers = self.live_observers();

        dispatch(&observers, Phase::PreReplace, &old, index);
        self.items.borrow_mut()[index] = item.clone();
        dispatch(&observers, Phase::PostReplace, &item, index);
        Ok(old)
    }

    /// Signals that the initial population is complete.
    ///
    /// Done handlers fire on the first call only; later mutations are still
    /// allowed and notified as usual.
    pub fn done(&self) {
        if self.done.replace(true) {
            return;
        }
        let _guard = DispatchGuard::enter(&self.dispatching);
        for observer in self.live_observers() {
            let handlers = observer.handlers.borrow().done_handlers();
            for handler in handlers {
                handler();
            }
        }
    }

    fn insert_unchecked(&self, index: usize, item: T) {
        let _guard = DispatchGuard::enter(&self.dispatching);
        let observers = self.live_observers();

        dispatch(&observers, Phase::PreInsert, &item, index);
        self.items.borrow_mut().insert(index, item.clone());
        dispatch(&observers, Phase::PostInsert, &item, index);
    }

    fn checked_get(&self, index: usize) -> Result<T> {
        let items = self.items.borrow();
        items
            .get(index)
            .cloned()
            .ok_or_else(|| Error::index_out_of_bounds(index, items.len()))
    }

    /// Prunes expired registrations and returns the live ones.
    ///
    /// This is the only place expired observers are dropped, so results never
    /// have to unregister themselves.
    fn live_observers(&self) -> Vec<Rc<ResultState<T>>> {
        let mut observers = self.observers.borrow_mut();
        observers.retain(|w| w.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl<T: Clone + PartialEq + 'static> Provider<T> {
    /// Removes the first item equal to `item`. Returns true if one was found.
    pub fn remove(&self, item: &T) -> bool {
        match self.position(|x| x == item) {
            Some(index) => self.take_at(index).is_ok(),
            None => false,
        }
    }

    /// Returns true if an item equal to `item` is present.
    pub fn contains(&self, item: &T) -> bool {
        self.items.borrow().contains(item)
    }
}

fn dispatch<T>(observers: &[Rc<ResultState<T>>], phase: Phase, item: &T, index: usize) {
    for observer in observers {
        let handlers = observer.handlers.borrow().handlers(phase);
        for handler in handlers {
            handler(item, index);
        }
    }
}
