//! Trellis Tree - Lazily materialized trees of live query results.
//!
//! A `QueryTree` asks a generator for the children result of each node the
//! first time that node's rows are requested, and keeps the node's children
//! in step with the result: a post-insert becomes a child node, a pre-remove
//! removes the child and its whole materialized subtree, and a post-replace
//! updates the child's item in place.
//!
//! Nodes live in a generational arena, so ids of removed nodes go stale
//! instead of dangling.
//!
//! # Example
//!
//! ```ignore
//! use trellis_tree::{QueryTree, TreeEvent};
//!
//! let tree = QueryTree::new(move |parent: Option<&Task>| {
//!     let key = parent.map(|t| t.id);
//!     cache.query(key, || children_of(key)).unwrap_or_else(|_| empty.result())
//! });
//!
//! tree.subscribe(|event: &TreeEvent| match event {
//!     TreeEvent::RowInserted { parent, row } => println!("inserted {:?}/{}", parent, row),
//!     _ => {}
//! });
//!
//! for row in 0..tree.row_count(tree.root()) {
//!     let node = tree.child_at(tree.root(), row);
//! }
//! ```

#![no_std]

extern crate alloc;

pub mod arena;
pub mod event;
pub mod tree;

pub use arena::{NodeArena, NodeId};
pub use event::{NodePath, TreeEvent};
pub use tree::{ChildGenerator, QueryTree, SubscriptionId};
