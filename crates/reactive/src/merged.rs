//! Union of several results.
//!
//! A `MergedProvider` presents several input results as one flat result.
//! Inserts upstream become appends, removes remove the first equal item, and
//! replaces are passed through in place.

use crate::provider::Provider;
use crate::result::QueryResult;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::Cell;
use tracing::{debug, warn};

/// A derived provider holding the union of its inputs.
///
/// The merged provider keeps its inputs alive for as long as it lives. Order
/// follows discovery: the inputs' initial contents in input order, then
/// every later insert appended at the end.
///
/// # Example
///
/// ```ignore
/// let merged = MergedProvider::new(vec![left.run(), right.run()]);
/// let all = merged.result();
/// ```
pub struct MergedProvider<T> {
    provider: Rc<Provider<T>>,
}

impl<T: Clone + PartialEq + 'static> MergedProvider<T> {
    /// Merges `inputs` into a new provider.
    pub fn new(inputs: Vec<QueryResult<T>>) -> Self {
        let initial: Vec<T> = inputs.iter().flat_map(|input| input.data()).collect();
        let provider = Provider::with_items(initial);

        let total = inputs.len();
        let done_count = Rc::new(Cell::new(
            inputs.iter().filter(|input| input.is_done()).count(),
        ));
        debug!(inputs = total, items = provider.len(), "merging results");

        for input in &inputs {
            // An independent registration, so the caller's handlers stay apart.
            let upstream = QueryResult::create(input.provider());
            Self::forward(&upstream, Rc::downgrade(&provider), total, done_count.clone());
            provider.retain_upstream(upstream);
        }

        if done_count.get() == total {
            provider.done();
        }
        Self { provider }
    }

    /// Returns the merged provider.
    pub fn provider(&self) -> &Rc<Provider<T>> {
        &self.provider
    }

    /// Returns a new result handle on the merged provider.
    pub fn result(&self) -> QueryResult<T> {
        self.provider.result()
    }

    fn forward(
        upstream: &QueryResult<T>,
        merged: Weak<Provider<T>>,
        total: usize,
        done_count: Rc<Cell<usize>>,
    ) {
        let target = merged.clone();
        upstream.on_post_insert(move |item, _| {
            if let Some(merged) = target.upgrade() {
                merged.append(item.clone());
            }
        });

        let target = merged.clone();
        upstream.on_pre_remove(move |item, _| {
            if let Some(merged) = target.upgrade() {
                merged.remove(item);
            }
        });

        // Position of the old item, between pre- and post-replace
        let pending: Rc<Cell<Option<usize>>> = Rc::new(Cell::new(None));

        let target = merged.clone();
        let p = pending.clone();
        upstream.on_pre_replace(move |old, _| {
            if let Some(merged) = target.upgrade() {
                p.set(merged.position(|x| x == old));
            }
        });

        let target = merged.clone();
        upstream.on_post_replace(move |new, _| {
            let Some(merged) = target.upgrade() else {
                return;
            };
            match pending.take() {
                Some(index) => {
                    if let Err(error) = merged.replace(index, new.clone()) {
                        warn!(%error, "merged replace failed");
                    }
                }
                None => merged.append(new.clone()),
            }
        });

        upstream.on_done(move || {
            let count = done_count.get() + 1;
            done_count.set(count);
            if count == total {
                if let Some(merged) = merged.upgrade() {
                    merged.done();
                }
            }
        });
    }
}
