//! Lazily materialized query tree.
//!
//! Each node's children come from one query result, obtained by calling the
//! tree's generator with the node's item the first time the children are
//! asked for. Inserts, removes and replaces on that result are translated
//! into structural changes of the tree and reported to subscribers.

use crate::arena::{NodeArena, NodeId};
use crate::event::{NodePath, TreeEvent};
use alloc::rc::{Rc, Weak};
use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use tracing::{debug, trace};
use trellis_core::{Error, Result};
use trellis_reactive::QueryResult;

/// Produces the children result of a node; `None` asks for the top level.
pub type ChildGenerator<T> = Rc<dyn Fn(Option<&T>) -> QueryResult<T>>;

/// Unique identifier for a tree subscription.
pub type SubscriptionId = u64;

type Listener = Rc<dyn Fn(&TreeEvent)>;

struct Node<T> {
    /// `None` for the root
    item: Option<T>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Keeps the children's provider alive
    result: Option<QueryResult<T>>,
    materialized: bool,
}

impl<T> Node<T> {
    fn new(item: Option<T>, parent: Option<NodeId>) -> Self {
        Self {
            item,
            parent,
            children: Vec::new(),
            result: None,
            materialized: false,
        }
    }
}

struct TreeState<T> {
    arena: NodeArena<Node<T>>,
    root: NodeId,
}

impl<T> TreeState<T> {
    fn path(&self, id: NodeId) -> Option<NodePath> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.arena.get(current)?.parent {
            let row = self
                .arena
                .get(parent)?
                .children
                .iter()
                .position(|child| *child == current)?;
            path.push(row);
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Frees `id` and every materialized node below it.
    ///
    /// The results of the freed nodes are handed back so the caller can
    /// drop them once the state is no longer borrowed.
    fn free_subtree(&mut self, id: NodeId, released: &mut Vec<QueryResult<T>>) -> usize {
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(id) = stack.pop() {
            if let Some(node) = self.arena.free(id) {
                stack.extend(node.children);
                released.extend(node.result);
                freed += 1;
            }
        }
        freed
    }
}

struct TreeInner<T> {
    state: RefCell<TreeState<T>>,
    generator: ChildGenerator<T>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_listener: Cell<SubscriptionId>,
}

impl<T: Clone + 'static> TreeInner<T> {
    fn emit(&self, event: TreeEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    /// Populates the children of `id` on first use.
    fn materialize(self: &Rc<Self>, id: NodeId) {
        let item = {
            let mut state = self.state.borrow_mut();
            let Some(node) = state.arena.get_mut(id) else {
                return;
            };
            if node.materialized {
                return;
            }
            node.materialized = true;
            node.item.clone()
        };

        // The generator may fetch synchronously; nothing is borrowed meanwhile.
        let result = (self.generator)(item.as_ref());
        self.attach(&result, id);

        let mut state = self.state.borrow_mut();
        if !state.arena.contains(id) {
            drop(state);
            drop(result);
            return;
        }
        let children: Vec<NodeId> = result
            .data()
            .into_iter()
            .map(|child| state.arena.alloc(Node::new(Some(child), Some(id))))
            .collect();
        debug!(node = %id, children = children.len(), "materialized node");
        if let Some(node) = state.arena.get_mut(id) {
            node.children = children;
            node.result = Some(result);
        }
    }

    fn attach(self: &Rc<Self>, result: &QueryResult<T>, id: NodeId) {
        let tree = Rc::downgrade(self);
        result.on_post_insert(move |item, row| {
            if let Some(tree) = tree.upgrade() {
                tree.inserted(id, row, item);
            }
        });

        let tree = Rc::downgrade(self);
        result.on_pre_remove(move |_, row| {
            if let Some(tree) = tree.upgrade() {
                tree.removing(id, row);
            }
        });

        let tree: Weak<Self> = Rc::downgrade(self);
        result.on_post_replace(move |item, row| {
            if let Some(tree) = tree.upgrade() {
                tree.replaced(id, row, item);
            }
        });
    }

    fn inserted(&self, parent: NodeId, row: usize, item: &T) {
        let path = {
            let mut state = self.state.borrow_mut();
            let Some(len) = state.arena.get(parent).map(|node| node.children.len()) else {
                return;
            };
            debug_assert!(row <= len, "insert row out of range");
            let child = state.arena.alloc(Node::new(Some(item.clone()), Some(parent)));
            if let Some(node) = state.arena.get_mut(parent) {
                node.children.insert(row.min(len), child);
            }
            trace!(parent = %parent, row, child = %child, "row inserted");
            state.path(parent)
        };
        if let Some(path) = path {
            self.emit(TreeEvent::RowInserted { parent: path, row });
        }
    }

    fn removing(&self, parent: NodeId, row: usize) {
        let path = {
            let state = self.state.borrow();
            let present = state
                .arena
                .get(parent)
                .is_some_and(|node| row < node.children.len());
            if !present {
                return;
            }
            state.path(parent)
        };
        let Some(path) = path else {
            return;
        };
        self.emit(TreeEvent::RowAboutToBeRemoved {
            parent: path.clone(),
            row,
        });

        let mut released = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            let child = match state.arena.get_mut(parent) {
                Some(node) if row < node.children.len() => node.children.remove(row),
                _ => return,
            };
            let freed = state.free_subtree(child, &mut released);
            trace!(parent = %parent, row, freed, "row removed");
        }
        // Releasing the subtree's results tears down their providers.
        drop(released);

        self.emit(TreeEvent::RowRemoved { parent: path, row });
    }

    fn replaced(&self, parent: NodeId, row: usize, item: &T) {
        let path = {
            let mut state = self.state.borrow_mut();
            let Some(child) = state
                .arena
                .get(parent)
                .and_then(|node| node.children.get(row).copied())
            else {
                return;
            };
            if let Some(node) = state.arena.get_mut(child) {
                node.item = Some(item.clone());
            }
            state.path(parent)
        };
        if let Some(path) = path {
            self.emit(TreeEvent::DataChanged { parent: path, row });
        }
    }
}

/// A tree whose levels are live query results, materialized on demand.
///
/// Nodes are addressed by `NodeId`. Ids of removed nodes go stale: reading
/// them yields nothing and never fetches again. A replace keeps the node and
/// its materialized subtree, only the item changes.
///
/// # Example
///
/// ```ignore
/// let tree = QueryTree::new(move |parent: Option<&Task>| {
///     let key = parent.map(|t| t.id);
///     cache.query(key, || children_of(key)).unwrap_or_else(|_| empty.result())
/// });
///
/// tree.subscribe(|event| println!("{:?}", event));
/// let top = tree.row_count(tree.root());
/// let first = tree.child_at(tree.root(), 0);
/// ```
pub struct QueryTree<T> {
    inner: Rc<TreeInner<T>>,
}

impl<T> Clone for QueryTree<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> QueryTree<T> {
    /// Creates a tree. Nothing is fetched until the root's rows are asked for.
    pub fn new<F>(generator: F) -> Self
    where
        F: Fn(Option<&T>) -> QueryResult<T> + 'static,
    {
        let mut arena = NodeArena::new();
        let root = arena.alloc(Node::new(None, None));
        Self {
            inner: Rc::new(TreeInner {
                state: RefCell::new(TreeState { arena, root }),
                generator: Rc::new(generator),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(1),
            }),
        }
    }

    /// Returns the root node. The root has no item.
    pub fn root(&self) -> NodeId {
        self.inner.state.borrow().root
    }

    /// Returns the number of children, materializing them on first use.
    ///
    /// Stale ids report 0.
    pub fn row_count(&self, node: NodeId) -> usize {
        self.inner.materialize(node);
        self.inner
            .state
            .borrow()
            .arena
            .get(node)
            .map_or(0, |n| n.children.len())
    }

    /// Returns the child at `row`, materializing the children on first use.
    pub fn child_at(&self, node: NodeId, row: usize) -> Option<NodeId> {
        self.inner.materialize(node);
        self.inner
            .state
            .borrow()
            .arena
            .get(node)
            .and_then(|n| n.children.get(row).copied())
    }

    /// Returns the children, materializing them on first use.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.materialize(node);
        self.inner
            .state
            .borrow()
            .arena
            .get(node)
            .map_or_else(Vec::new, |n| n.children.clone())
    }

    /// Returns the parent node; `None` for the root and for stale ids.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.state.borrow().arena.get(node)?.parent
    }

    /// Returns a clone of the node's item; `None` for the root and stale ids.
    pub fn item(&self, node: NodeId) -> Option<T> {
        self.inner.state.borrow().arena.get(node)?.item.clone()
    }

    /// Returns the row path of a node.
    pub fn path(&self, node: NodeId) -> Result<NodePath> {
        self.inner
            .state
            .borrow()
            .path(node)
            .ok_or_else(|| Error::node_not_found(node.to_string()))
    }

    /// Follows a row path from the root, materializing along the way.
    pub fn node_at(&self, path: &[usize]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |node, &row| self.child_at(node, row))
    }

    /// Returns true if `node` is a live node of this tree.
    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.state.borrow().arena.contains(node)
    }

    /// Returns true if the node's children have been requested.
    pub fn is_materialized(&self, node: NodeId) -> bool {
        self.inner
            .state
            .borrow()
            .arena
            .get(node)
            .is_some_and(|n| n.materialized)
    }

    /// Returns the number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.inner.state.borrow().arena.len()
    }

    /// Registers a listener for structural changes and returns its ID.
    ///
    /// Listeners run after the tree has been updated for the event (before
    /// it, for `RowAboutToBeRemoved`) and may read the tree.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&TreeEvent) + 'static,
    {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    /// Removes a listener. Returns true if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let len_before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() < len_before
    }
}
