//! Structural change notifications.

use alloc::vec::Vec;

/// Row path from the root: the row of each node on the way down.
///
/// The root's path is empty; a top-level node's path has one element.
pub type NodePath = Vec<usize>;

/// A structural change of a `QueryTree`, addressed by parent path and row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeEvent {
    /// A child node was inserted at `row`.
    RowInserted { parent: NodePath, row: usize },
    /// The child at `row` and its whole subtree are about to be removed.
    RowAboutToBeRemoved { parent: NodePath, row: usize },
    /// The child that was at `row` has been removed.
    RowRemoved { parent: NodePath, row: usize },
    /// The item of the child at `row` changed; its subtree is unchanged.
    DataChanged { parent: NodePath, row: usize },
}

impl TreeEvent {
    /// Returns the path of the parent node.
    pub fn parent(&self) -> &[usize] {
        match self {
            TreeEvent::RowInserted { parent, .. }
            | TreeEvent::RowAboutToBeRemoved { parent, .. }
            | TreeEvent::RowRemoved { parent, .. }
            | TreeEvent::DataChanged { parent, .. } => parent,
        }
    }

    /// Returns the affected row.
    pub fn row(&self) -> usize {
        match self {
            TreeEvent::RowInserted { row, .. }
            | TreeEvent::RowAboutToBeRemoved { row, .. }
            | TreeEvent::RowRemoved { row, .. }
            | TreeEvent::DataChanged { row, .. } => *row,
        }
    }

    /// Returns the path of the affected node.
    pub fn path(&self) -> NodePath {
        let mut path = self.parent().to_vec();
        path.push(self.row());
        path
    }

    /// Returns true for events that change the structure of the tree.
    pub fn is_structural(&self) -> bool {
        !matches!(self, TreeEvent::DataChanged { .. })
    }
}
