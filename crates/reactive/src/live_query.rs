//! Live query implementation.
//!
//! This module provides `LiveQuery`, which populates a provider from an
//! asynchronous fetch and then keeps it consistent with the external store by
//! reconciling added/removed/changed notifications.
//!
//! Reconciliation never compares two queries: each live query decides on its
//! own, per event, whether the record belongs to its result set. A single
//! `changed` event can therefore move a record out of one query and into
//! another.

use crate::monitor::ChangeListener;
use crate::provider::Provider;
use crate::query::Query;
use crate::result::QueryResult;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use hashbrown::HashSet;
use tracing::{debug, trace, warn};
use trellis_core::{ChangeEvent, Error, Record, Result};

/// Receiver of fetch results, addressed through a weak reference.
trait FetchTarget<R> {
    fn fetched(&self, generation: u64, record: R);
    fn finished(&self, generation: u64, error: Option<Error>);
}

/// Handed to a query's fetch function to deliver the initial records.
///
/// The sink only holds a weak reference to its live query. Once the query is
/// gone, or has started a newer fetch, every call on the sink is a no-op.
/// Dropping a sink without finishing it finishes the fetch, so `done` always
/// reaches the consumers.
pub struct FetchSink<R> {
    target: Weak<dyn FetchTarget<R>>,
    generation: u64,
    finished: bool,
}

impl<R> FetchSink<R> {
    /// Delivers one record.
    pub fn add(&self, record: R) {
        if let Some(target) = self.target.upgrade() {
            target.fetched(self.generation, record);
        }
    }

    /// Delivers a batch of records, in order.
    pub fn extend<I>(&self, records: I)
    where
        I: IntoIterator<Item = R>,
    {
        if let Some(target) = self.target.upgrade() {
            for record in records {
                target.fetched(self.generation, record);
            }
        }
    }

    /// Marks the fetch as complete.
    pub fn finish(mut self) {
        self.finish_with(None);
    }

    /// Reports a fetch failure.
    pub fn fail(mut self, error: Error) {
        self.finish_with(Some(error));
    }

    /// Delivers the outcome of a one-shot batched fetch.
    pub fn complete(self, outcome: Result<Vec<R>>) {
        match outcome {
            Ok(records) => {
                self.extend(records);
                self.finish();
            }
            Err(error) => self.fail(error),
        }
    }

    /// Returns the fetch generation this sink belongs to.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true if the receiving query still exists.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn finish_with(&mut self, error: Option<Error>) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(target) = self.target.upgrade() {
            target.finished(self.generation, error);
        }
    }
}

impl<R> Drop for FetchSink<R> {
    fn drop(&mut self) {
        self.finish_with(None);
    }
}

/// A live query bound to at most one provider at a time.
///
/// `run` creates the provider and starts the fetch on first use, and hands
/// out new result handles on the same provider afterwards. The query only
/// keeps a weak reference to its provider: once every result is gone the
/// provider is torn down, events become no-ops, and the next `run` fetches
/// again.
///
/// # Example
///
/// ```ignore
/// let live = LiveQuery::new(query);
/// let result = live.run();
///
/// // Notifications from the store's monitor
/// live.on_changed(&record);
/// ```
pub struct LiveQuery<R: Record, T> {
    /// Policy functions
    query: Query<R, T>,
    /// The provider of the current run
    provider: RefCell<Weak<Provider<T>>>,
    /// Incremented by every run that creates a provider
    generation: Cell<u64>,
    /// Whether the fetch of the current generation is outstanding
    fetching: Cell<bool>,
    /// Identities touched by events while the fetch is outstanding
    superseded: RefCell<HashSet<R::Id>>,
    /// Records the outstanding fetch has delivered so far
    fetched: RefCell<Vec<R>>,
    /// Weak self reference handed to fetch sinks
    this: Weak<Self>,
}

impl<R: Record, T: Clone + 'static> LiveQuery<R, T> {
    /// Creates a new live query. Nothing is fetched until `run`.
    pub fn new(query: Query<R, T>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            query,
            provider: RefCell::new(Weak::new()),
            generation: Cell::new(0),
            fetching: Cell::new(false),
            superseded: RefCell::new(HashSet::new()),
            fetched: RefCell::new(Vec::new()),
            this: this.clone(),
        })
    }

    /// Returns the policy bundle.
    #[inline]
    pub fn query(&self) -> &Query<R, T> {
        &self.query
    }

    /// Returns a result handle, starting the fetch if no provider is alive.
    ///
    /// Repeated calls while a provider is alive share it and never refetch.
    pub fn run(&self) -> QueryResult<T> {
        let existing = self.provider.borrow().upgrade();
        if let Some(provider) = existing {
            trace!(query = self.query.name(), "reusing live provider");
            return QueryResult::create(&provider);
        }

        let provider = Provider::new();
        *self.provider.borrow_mut() = Rc::downgrade(&provider);
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.fetching.set(true);
        self.superseded.borrow_mut().clear();
        self.fetched.borrow_mut().clear();

        // The result must exist before fetching: a synchronous fetch would
        // otherwise populate a provider nobody keeps alive.
        let result = QueryResult::create(&provider);
        debug!(query = self.query.name(), generation, "starting fetch");

        let target: Weak<dyn FetchTarget<R>> = self.this.clone();
        self.query.fetch(FetchSink {
            target,
            generation,
            finished: false,
        });
        result
    }

    /// Returns true if a provider from a previous run is still referenced.
    pub fn has_provider(&self) -> bool {
        self.provider.borrow().strong_count() > 0
    }

    /// Returns true while the current run's fetch is outstanding.
    #[inline]
    pub fn is_fetching(&self) -> bool {
        self.fetching.get() && self.has_provider()
    }

    /// Returns the generation of the current run (0 before the first run).
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Handles an `added` notification.
    pub fn on_added(&self, record: &R) {
        let Some(provider) = self.live_provider() else {
            return;
        };
        self.note_event(record);
        if !self.query.matches(record) {
            trace!(query = self.query.name(), id = ?record.id(), "added record filtered out");
            return;
        }
        self.insert_if_absent(&provider, record);
    }

    /// Handles a `removed` notification.
    pub fn on_removed(&self, record: &R) {
        let Some(provider) = self.live_provider() else {
            return;
        };
        self.note_event(record);
        if let Some(index) = self.find(&provider, record) {
            trace!(query = self.query.name(), id = ?record.id(), index, "removing record");
            self.remove_index(&provider, index);
        }
    }

    /// Handles a `changed` notification.
    ///
    /// The record may keep, lose or gain membership:
    /// - represented and still matching: updated and replaced at the same index
    /// - represented and no longer matching: removed
    /// - not represented and now matching: converted and appended
    /// - not represented and not matching: ignored
    pub fn on_changed(&self, record: &R) {
        let Some(provider) = self.live_provider() else {
            return;
        };
        self.note_event(record);

        match (self.find(&provider, record), self.query.matches(record)) {
            (Some(index), true) => {
                let Some(mut item) = provider.get(index) else {
                    return;
                };
                self.query.update(record, &mut item);
                trace!(query = self.query.name(), id = ?record.id(), index, "replacing record");
                if let Err(error) = provider.replace(index, item) {
                    warn!(query = self.query.name(), %error, "replace failed");
                }
            }
            (Some(index), false) => {
                trace!(query = self.query.name(), id = ?record.id(), index, "record left the result set");
                self.remove_index(&provider, index);
            }
            (None, true) => {
                trace!(query = self.query.name(), id = ?record.id(), "record joined the result set");
                provider.append(self.query.convert(record));
            }
            (None, false) => {}
        }
    }

    /// Dispatches one change event.
    pub fn on_event(&self, event: &ChangeEvent<R>) {
        match event {
            ChangeEvent::Added(record) => self.on_added(record),
            ChangeEvent::Removed(record) => self.on_removed(record),
            ChangeEvent::Changed(record) => self.on_changed(record),
        }
    }

    fn live_provider(&self) -> Option<Rc<Provider<T>>> {
        self.provider.borrow().upgrade()
    }

    /// Events received during the fetch are newer than the fetch snapshot.
    fn note_event(&self, record: &R) {
        if self.fetching.get() {
            self.superseded.borrow_mut().insert(record.id());
        }
    }

    fn find(&self, provider: &Provider<T>, record: &R) -> Option<usize> {
        provider.with_data(|items| {
            let index = items.iter().position(|item| self.query.represents(record, item));
            debug_assert!(
                index.map_or(true, |i| !items[i + 1..]
                    .iter()
                    .any(|item| self.query.represents(record, item))),
                "two items represent the same record"
            );
            index
        })
    }

    fn insert_if_absent(&self, provider: &Provider<T>, record: &R) {
        if self.find(provider, record).is_some() {
            trace!(query = self.query.name(), id = ?record.id(), "record already present");
            return;
        }
        provider.append(self.query.convert(record));
    }

    fn remove_index(&self, provider: &Provider<T>, index: usize) {
        if let Err(error) = provider.remove_at(index) {
            warn!(query = self.query.name(), %error, "remove failed");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation.get() && self.fetching.get()
    }
}

impl<R: Record, T: Clone + 'static> FetchTarget<R> for LiveQuery<R, T> {
    fn fetched(&self, generation: u64, record: R) {
        if !self.is_current(generation) {
            trace!(query = self.query.name(), generation, "dropping record from stale fetch");
            return;
        }
        let Some(provider) = self.live_provider() else {
            return;
        };
        if self.superseded.borrow().contains(&record.id()) {
            trace!(query = self.query.name(), id = ?record.id(), "fetched record superseded by event");
            return;
        }
        if !self.query.matches(&record) {
            return;
        }
        self.insert_if_absent(&provider, &record);
        self.fetched.borrow_mut().push(record);
    }

    fn finished(&self, generation: u64, error: Option<Error>) {
        if !self.is_current(generation) {
            return;
        }
        self.fetching.set(false);
        let superseded = core::mem::take(&mut *self.superseded.borrow_mut());
        let fetched = core::mem::take(&mut *self.fetched.borrow_mut());

        let Some(provider) = self.live_provider() else {
            debug!(query = self.query.name(), generation, "fetch finished after teardown");
            return;
        };

        if let Some(error) = error {
            warn!(query = self.query.name(), generation, %error, "fetch failed");
            // Only what the failed fetch contributed is withdrawn; records
            // touched by events since then reflect the store.
            for record in fetched.iter().filter(|r| !superseded.contains(&r.id())) {
                if let Some(index) = self.find(&provider, record) {
                    self.remove_index(&provider, index);
                }
            }
        } else {
            debug!(query = self.query.name(), generation, count = provider.len(), "fetch finished");
        }
        provider.done();
    }
}

impl<R: Record, T: Clone + 'static> ChangeListener<R> for LiveQuery<R, T> {
    fn on_added(&self, record: &R) {
        LiveQuery::on_added(self, record);
    }

    fn on_removed(&self, record: &R) {
        LiveQuery::on_removed(self, record);
    }

    fn on_changed(&self, record: &R) {
        LiveQuery::on_changed(self, record);
    }

    /// A query that never ran, or whose provider is alive, has work to do.
    fn is_alive(&self) -> bool {
        self.generation.get() == 0 || self.has_provider()
    }
}
