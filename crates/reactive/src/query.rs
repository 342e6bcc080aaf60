//! Query policy bundle.
//!
//! A `Query` is a plain bundle of the functions that drive one live query:
//! how to fetch, which records belong, how to turn a record into a domain
//! object, how to refresh an object from a newer record, and how to map a
//! record back to the object it produced.

use crate::live_query::FetchSink;
use alloc::rc::Rc;
use alloc::string::String;
use trellis_core::{Error, Record, Result};

/// Starts the asynchronous initial fetch, delivering records to the sink.
pub type FetchFn<R> = Rc<dyn Fn(FetchSink<R>)>;
/// Decides whether a record belongs to the result set.
pub type PredicateFn<R> = Rc<dyn Fn(&R) -> bool>;
/// Builds a domain object from a record.
pub type ConvertFn<R, T> = Rc<dyn Fn(&R) -> T>;
/// Refreshes a domain object in place from a newer record.
pub type UpdateFn<R, T> = Rc<dyn Fn(&R, &mut T)>;
/// Tells whether a domain object was produced from a record.
pub type RepresentsFn<R, T> = Rc<dyn Fn(&R, &T) -> bool>;

/// The policy functions of one live query.
pub struct Query<R, T> {
    name: String,
    fetch: FetchFn<R>,
    predicate: PredicateFn<R>,
    convert: ConvertFn<R, T>,
    update: UpdateFn<R, T>,
    represents: RepresentsFn<R, T>,
}

impl<R, T> Clone for Query<R, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            fetch: self.fetch.clone(),
            predicate: self.predicate.clone(),
            convert: self.convert.clone(),
            update: self.update.clone(),
            represents: self.represents.clone(),
        }
    }
}

impl<R: Record, T: 'static> Query<R, T> {
    /// Starts building a query with the given debug name.
    pub fn builder(name: impl Into<String>) -> QueryBuilder<R, T> {
        QueryBuilder::new(name)
    }

    /// Returns the debug name used in log fields.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts the fetch.
    pub fn fetch(&self, sink: FetchSink<R>) {
        (self.fetch)(sink)
    }

    /// Returns true if the record belongs to the result set.
    #[inline]
    pub fn matches(&self, record: &R) -> bool {
        (self.predicate)(record)
    }

    /// Converts a record into a domain object.
    #[inline]
    pub fn convert(&self, record: &R) -> T {
        (self.convert)(record)
    }

    /// Refreshes a domain object from a record.
    #[inline]
    pub fn update(&self, record: &R, item: &mut T) {
        (self.update)(record, item)
    }

    /// Returns true if `item` was produced from `record`.
    #[inline]
    pub fn represents(&self, record: &R, item: &T) -> bool {
        (self.represents)(record, item)
    }
}

/// Builder for `Query`.
///
/// `convert` and `represents` are required. The other functions default to:
/// - fetch: yields nothing and finishes immediately
/// - predicate: every record matches
/// - update: replaces the object with a fresh `convert` of the record
///
/// # Example
///
/// ```ignore
/// let query = Query::builder("tasks tagged A")
///     .fetch(move |sink| store.fetch_all(sink))
///     .predicate(|r: &TaskRecord| r.tag == "A")
///     .convert(|r| Task::from(r))
///     .represents(|r, t: &Task| t.id == r.id)
///     .build()?;
/// ```
pub struct QueryBuilder<R, T> {
    name: String,
    fetch: Option<FetchFn<R>>,
    predicate: Option<PredicateFn<R>>,
    convert: Option<ConvertFn<R, T>>,
    update: Option<UpdateFn<R, T>>,
    represents: Option<RepresentsFn<R, T>>,
}

impl<R: Record, T: 'static> QueryBuilder<R, T> {
    /// Creates a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fetch: None,
            predicate: None,
            convert: None,
            update: None,
            represents: None,
        }
    }

    /// Sets the fetch function.
    pub fn fetch<F>(mut self, fetch: F) -> Self
    where
        F: Fn(FetchSink<R>) + 'static,
    {
        self.fetch = Some(Rc::new(fetch));
        self
    }

    /// Sets the membership predicate.
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&R) -> bool + 'static,
    {
        self.predicate = Some(Rc::new(predicate));
        self
    }

    /// Sets the record to domain object conversion.
    pub fn convert<F>(mut self, convert: F) -> Self
    where
        F: Fn(&R) -> T + 'static,
    {
        self.convert = Some(Rc::new(convert));
        self
    }

    /// Sets the in-place update function.
    pub fn update<F>(mut self, update: F) -> Self
    where
        F: Fn(&R, &mut T) + 'static,
    {
        self.update = Some(Rc::new(update));
        self
    }

    /// Sets the record to domain object matcher.
    pub fn represents<F>(mut self, represents: F) -> Self
    where
        F: Fn(&R, &T) -> bool + 'static,
    {
        self.represents = Some(Rc::new(represents));
        self
    }

    /// Builds the query.
    pub fn build(self) -> Result<Query<R, T>> {
        let convert = self.convert.ok_or_else(|| {
            Error::invalid_operation(alloc::format!("query '{}' has no convert function", self.name))
        })?;
        let represents = self.represents.ok_or_else(|| {
            Error::invalid_operation(alloc::format!(
                "query '{}' has no represents function",
                self.name
            ))
        })?;

        let update = self.update.unwrap_or_else(|| {
            let convert = convert.clone();
            Rc::new(move |record: &R, item: &mut T| *item = convert(record))
        });
        let fetch = self
            .fetch
            .unwrap_or_else(|| Rc::new(|sink: FetchSink<R>| sink.finish()));
        let predicate = self.predicate.unwrap_or_else(|| Rc::new(|_: &R| true));

        Ok(Query {
            name: self.name,
            fetch,
            predicate,
            convert,
            update,
            represents,
        })
    }
}
