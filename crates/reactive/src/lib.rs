//! Trellis Reactive - Live queries over an externally monitored record store.
//!
//! This crate turns an asynchronously fetched set of raw records into an
//! ordered, observable collection of domain objects, and keeps it consistent
//! with the store's added/removed/changed notifications. Observers receive
//! minimal insert/remove/replace notifications, synchronously, as each
//! mutation happens.
//!
//! # Core Concepts
//!
//! - `Provider`: Owns one query's ordered items and notifies its observers
//! - `QueryResult`: A consumer handle onto a provider; keeps it alive
//! - `Query`: The policy functions (fetch, predicate, convert, update, represents)
//! - `LiveQuery`: Populates a provider from a fetch and reconciles change events
//! - `Monitor`: Routes store notifications to every live query
//! - `QueryCache`: Reuses the live query of a key instead of refetching
//!
//! # Compositions
//!
//! - `MergedProvider`: Union of several results
//! - `FilteredProvider`: The members of one result matching a predicate
//! - `AncestorClosure`: Wanted items plus all their ancestors
//!
//! # Example
//!
//! ```ignore
//! use trellis_reactive::{LiveQuery, Monitor, Query};
//!
//! let query = Query::builder("tasks tagged A")
//!     .fetch(move |sink| store.fetch_all(sink))
//!     .predicate(|r: &TaskRecord| r.tag == "A")
//!     .convert(|r| Task::from(r))
//!     .represents(|r, t| t.id == r.id)
//!     .build()?;
//!
//! let live = LiveQuery::new(query);
//! monitor.attach(live.clone());
//!
//! let result = live.run();
//! result.on_post_insert(|task, row| println!("{:?} at row {}", task, row));
//! result.on_done(|| println!("initial population complete"));
//!
//! // The store reports a retag; the task joins or leaves the result
//! monitor.on_changed(&record);
//! ```

#![no_std]

extern crate alloc;

pub mod cache;
pub mod change_set;
pub mod closure;
pub mod filtered;
pub mod handler;
pub mod live_query;
pub mod merged;
pub mod monitor;
pub mod provider;
pub mod query;
pub mod result;

pub use cache::QueryCache;
pub use change_set::ChangeSet;
pub use closure::AncestorClosure;
pub use filtered::FilteredProvider;
pub use handler::{DoneHandler, HandlerSet, ItemHandler, Phase};
pub use live_query::{FetchSink, LiveQuery};
pub use merged::MergedProvider;
pub use monitor::{ChangeListener, ListenerId, Monitor};
pub use provider::Provider;
pub use query::{Query, QueryBuilder};
pub use result::QueryResult;

// Re-export commonly used types from dependencies
pub use trellis_core::{ChangeEvent, ChangeKind, Error, Record, Result};
