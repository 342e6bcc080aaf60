//! Trellis Core - Record identity, change events and errors for Trellis.
//!
//! This crate provides the foundational types shared by the live query engine
//! and the tree materializer:
//!
//! - `Record`: an external store record with a stable identity
//! - `ChangeEvent`: an added/removed/changed notification from the store monitor
//! - `Error`: error types for live query operations
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{ChangeEvent, ChangeKind, Record};
//!
//! #[derive(Clone)]
//! struct Task {
//!     id: u64,
//!     tag: &'static str,
//! }
//!
//! impl Record for Task {
//!     type Id = u64;
//!     fn id(&self) -> u64 {
//!         self.id
//!     }
//! }
//!
//! let event = ChangeEvent::Changed(Task { id: 2, tag: "A" });
//! assert_eq!(event.kind(), ChangeKind::Changed);
//! assert_eq!(event.record().id(), 2);
//! assert_eq!(event.record().tag, "A");
//! ```

#![no_std]

extern crate alloc;

mod error;
mod record;

pub use error::{Error, Result};
pub use record::{ChangeEvent, ChangeKind, Record};
