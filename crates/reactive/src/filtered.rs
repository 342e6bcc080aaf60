//! Filtered view of a result.

use crate::provider::Provider;
use crate::result::QueryResult;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::Cell;
use tracing::warn;

type Predicate<T> = Rc<dyn Fn(&T) -> bool>;

/// A derived provider holding the items of one input that match a predicate.
///
/// Relative order is preserved: an item's derived index is the number of
/// matching input items before it. A replace that keeps membership stays a
/// replace; one that changes membership becomes an insert or a remove.
///
/// # Example
///
/// ```ignore
/// let all_tasks = tasks.run();
/// let children = FilteredProvider::new(&all_tasks, move |t: &Task| t.parent == Some(p));
/// ```
pub struct FilteredProvider<T> {
    provider: Rc<Provider<T>>,
}

impl<T: Clone + 'static> FilteredProvider<T> {
    /// Creates a filtered view of `input`.
    pub fn new<F>(input: &QueryResult<T>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + 'static,
    {
        let predicate: Predicate<T> = Rc::new(predicate);
        let initial: Vec<T> = input.with_data(|items| {
            items.iter().filter(|&item| predicate(item)).cloned().collect()
        });
        let provider = Provider::with_items(initial);

        let upstream = QueryResult::create(input.provider());
        Self::forward(&upstream, Rc::downgrade(&provider), predicate);
        if upstream.is_done() {
            provider.done();
        }
        provider.retain_upstream(upstream);
        Self { provider }
    }

    /// Returns the filtered provider.
    pub fn provider(&self) -> &Rc<Provider<T>> {
        &self.provider
    }

    /// Returns a new result handle on the filtered provider.
    pub fn result(&self) -> QueryResult<T> {
        self.provider.result()
    }

    fn forward(upstream: &QueryResult<T>, derived: Weak<Provider<T>>, predicate: Predicate<T>) {
        let source = Rc::downgrade(upstream.provider());
        // Number of matching input items before `index`
        let rank = {
            let predicate = predicate.clone();
            Rc::new(move |index: usize| -> usize {
                source.upgrade().map_or(0, |input| {
                    input.with_data(|items| {
                        items[..index.min(items.len())]
                            .iter()
                            .filter(|&item| predicate(item))
                            .count()
                    })
                })
            })
        };

        let (target, p, r) = (derived.clone(), predicate.clone(), rank.clone());
        upstream.on_post_insert(move |item, index| {
            let Some(derived) = target.upgrade() else {
                return;
            };
            if p(item) {
                if let Err(error) = derived.insert(r(index), item.clone()) {
                    warn!(%error, "filtered insert failed");
                }
            }
        });

        let (target, p, r) = (derived.clone(), predicate.clone(), rank.clone());
        upstream.on_pre_remove(move |item, index| {
            let Some(derived) = target.upgrade() else {
                return;
            };
            if p(item) {
                if let Err(error) = derived.remove_at(r(index)) {
                    warn!(%error, "filtered remove failed");
                }
            }
        });

        // Derived index of the old item, if it was a member
        let pending: Rc<Cell<Option<usize>>> = Rc::new(Cell::new(None));

        let (p, r, slot) = (predicate.clone(), rank.clone(), pending.clone());
        upstream.on_pre_replace(move |old, index| {
            slot.set(p(old).then(|| r(index)));
        });

        let target = derived.clone();
        upstream.on_post_replace(move |new, index| {
            let Some(derived) = target.upgrade() else {
                return;
            };
            let outcome = match (pending.take(), predicate(new)) {
                (Some(at), true) => derived.replace(at, new.clone()).map(|_| ()),
                (Some(at), false) => derived.remove_at(at),
                (None, true) => derived.insert(rank(index), new.clone()),
                (None, false) => Ok(()),
            };
            if let Err(error) = outcome {
                warn!(%error, "filtered replace failed");
            }
        });

        upstream.on_done(move || {
            if let Some(derived) = derived.upgrade() {
                derived.done();
            }
        });
    }
}
