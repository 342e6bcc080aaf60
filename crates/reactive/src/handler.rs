//! Per-phase handler lists for result observers.
//!
//! Every mutation of a provider is bracketed by a pre and a post phase. A
//! result handle keeps one ordered list of handlers per phase plus a list of
//! done handlers.

use alloc::rc::Rc;
use alloc::vec::Vec;

/// Handler invoked with the affected item and its index.
pub type ItemHandler<T> = Rc<dyn Fn(&T, usize)>;

/// Handler invoked once the initial population has completed.
pub type DoneHandler = Rc<dyn Fn()>;

/// Mutation phase a handler is registered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    PreInsert,
    PostInsert,
    PreRemove,
    PostRemove,
    PreReplace,
    PostReplace,
}

impl Phase {
    /// All phases, in slot order.
    pub const ALL: [Phase; 6] = [
        Phase::PreInsert,
        Phase::PostInsert,
        Phase::PreRemove,
        Phase::PostRemove,
        Phase::PreReplace,
        Phase::PostReplace,
    ];

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

/// Handlers registered on one result handle.
pub struct HandlerSet<T> {
    /// Item handlers, indexed by `Phase::slot`
    item_handlers: [Vec<ItemHandler<T>>; 6],
    /// Done handlers
    done_handlers: Vec<DoneHandler>,
}

impl<T> Default for HandlerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandlerSet<T> {
    /// Creates an empty handler set.
    pub fn new() -> Self {
        Self {
            item_handlers: core::array::from_fn(|_| Vec::new()),
            done_handlers: Vec::new(),
        }
    }

    /// Registers a handler for the given phase.
    pub fn add(&mut self, phase: Phase, handler: ItemHandler<T>) {
        self.item_handlers[phase.slot()].push(handler);
    }

    /// Registers a done handler.
    pub fn add_done(&mut self, handler: DoneHandler) {
        self.done_handlers.push(handler);
    }

    /// Returns a snapshot of the handlers for the given phase, in
    /// registration order.
    ///
    /// Callers invoke the snapshot after releasing any borrow on the set, so a
    /// handler may register further handlers without conflicting.
    pub fn handlers(&self, phase: Phase) -> Vec<ItemHandler<T>> {
        self.item_handlers[phase.slot()].clone()
    }

    /// Returns a snapshot of the done handlers.
    pub fn done_handlers(&self) -> Vec<DoneHandler> {
        self.done_handlers.clone()
    }

    /// Returns the number of handlers for the given phase.
    #[inline]
    pub fn len(&self, phase: Phase) -> usize {
        self.item_handlers[phase.slot()].len()
    }

    /// Returns true if no handler of any kind is registered.
    pub fn is_empty(&self) -> bool {
        self.done_handlers.is_empty() && self.item_handlers.iter().all(|h| h.is_empty())
    }

    /// Removes every handler.
    pub fn clear(&mut self) {
        for handlers in self.item_handlers.iter_mut() {
            handlers.clear();
        }
        self.done_handlers.clear();
    }
}
