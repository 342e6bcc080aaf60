//! Keyed reuse of live queries.
//!
//! Consumers ask for "the children of project P" many times; only the first
//! request (or the first one after every result went away) builds a query
//! and fetches. Later requests get a new result handle on the live provider.

use crate::live_query::LiveQuery;
use crate::monitor::Monitor;
use crate::query::Query;
use crate::result::QueryResult;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt::Debug;
use core::hash::Hash;
use hashbrown::HashMap;
use tracing::debug;
use trellis_core::{Record, Result};

/// A cache of live queries keyed by request.
///
/// New live queries are attached to the shared monitor, so they receive
/// store notifications for as long as their provider lives.
///
/// # Example
///
/// ```ignore
/// let cache = QueryCache::new(monitor.clone());
/// let children = cache.query(ProjectKey(p), || children_of(p))?;
/// let again = cache.query(ProjectKey(p), || children_of(p))?; // no refetch
/// ```
pub struct QueryCache<K, R: Record, T> {
    monitor: Rc<Monitor<R>>,
    queries: RefCell<HashMap<K, Rc<LiveQuery<R, T>>>>,
}

impl<K, R, T> QueryCache<K, R, T>
where
    K: Eq + Hash + Clone + Debug,
    R: Record,
    T: Clone + 'static,
{
    /// Creates an empty cache feeding new queries from `monitor`.
    pub fn new(monitor: Rc<Monitor<R>>) -> Self {
        Self {
            monitor,
            queries: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the monitor new queries are attached to.
    pub fn monitor(&self) -> &Rc<Monitor<R>> {
        &self.monitor
    }

    /// Returns a result for `key`, building the query with `make` only when no
    /// live provider exists for it.
    pub fn query<F>(&self, key: K, make: F) -> Result<QueryResult<T>>
    where
        F: FnOnce() -> Result<Query<R, T>>,
    {
        let existing = self.queries.borrow().get(&key).cloned();
        if let Some(live) = existing {
            if live.has_provider() {
                return Ok(live.run());
            }
        }

        let live = LiveQuery::new(make()?);
        debug!(key = ?key, query = live.query().name(), "creating live query");
        self.monitor.attach(live.clone());
        self.queries.borrow_mut().insert(key, live.clone());
        // The borrow is released: a synchronous fetch may re-enter the cache.
        Ok(live.run())
    }

    /// Returns the live query for `key`, if one exists with a live provider.
    pub fn get(&self, key: &K) -> Option<Rc<LiveQuery<R, T>>> {
        self.queries
            .borrow()
            .get(key)
            .filter(|live| live.has_provider())
            .cloned()
    }

    /// Returns true if `key` has a live provider.
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of cached entries, including dead ones not yet
    /// cleaned up.
    pub fn len(&self) -> usize {
        self.queries.borrow().len()
    }

    /// Returns true if the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.queries.borrow().is_empty()
    }

    /// Drops entries whose provider was torn down, and detaches them from the
    /// monitor.
    pub fn cleanup(&self) {
        self.queries.borrow_mut().retain(|key, live| {
            let alive = live.has_provider();
            if !alive {
                debug!(key = ?key, query = live.query().name(), "dropping torn down query");
            }
            alive
        });
        self.monitor.cleanup();
    }
}
