//! Error types for Trellis live queries.

use alloc::string::String;
use core::fmt;

/// Result type alias for Trellis operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for live query operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A positional operation addressed a slot outside the sequence.
    IndexOutOfBounds {
        index: usize,
        len: usize,
    },
    /// The fetch collaborator reported a failure.
    Fetch {
        message: String,
    },
    /// A tree node id no longer refers to a live node.
    NodeNotFound {
        node: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IndexOutOfBounds { index, len } => {
                write!(f, "Index {} out of bounds for sequence of length {}", index, len)
            }
            Error::Fetch { message } => {
                write!(f, "Fetch failed: {}", message)
            }
            Error::NodeNotFound { node } => {
                write!(f, "Tree node not found: {}", node)
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates an index out of bounds error.
    pub fn index_out_of_bounds(index: usize, len: usize) -> Self {
        Error::IndexOutOfBounds { index, len }
    }

    /// Creates a fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        Error::Fetch {
            message: message.into(),
        }
    }

    /// Creates a node not found error.
    pub fn node_not_found(node: impl Into<String>) -> Self {
        Error::NodeNotFound { node: node.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if this error came from the fetch collaborator.
    #[inline]
    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::Fetch { .. })
    }
}
