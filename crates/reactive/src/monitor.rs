//! Change feed routing.
//!
//! This module provides `Monitor`, which receives the external store's
//! added/removed/changed notifications and routes them to every attached live
//! query, whatever domain type each query produces.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use tracing::debug;
use trellis_core::ChangeEvent;

/// Unique identifier for an attached listener.
pub type ListenerId = u64;

/// Something that reconciles change notifications for records of type `R`.
pub trait ChangeListener<R> {
    /// Handles an `added` notification.
    fn on_added(&self, record: &R);

    /// Handles a `removed` notification.
    fn on_removed(&self, record: &R);

    /// Handles a `changed` notification.
    fn on_changed(&self, record: &R);

    /// Returns false while the listener has nothing to maintain.
    ///
    /// A listener that is not alive is skipped. It stays attached as long as
    /// something besides the monitor holds it, since it may come back to life.
    fn is_alive(&self) -> bool;

    /// Dispatches one change event.
    fn on_event(&self, event: &ChangeEvent<R>) {
        match event {
            ChangeEvent::Added(record) => self.on_added(record),
            ChangeEvent::Removed(record) => self.on_removed(record),
            ChangeEvent::Changed(record) => self.on_changed(record),
        }
    }
}

/// Routes store notifications to attached listeners.
///
/// Delivery over-approximates: every live listener sees every event and
/// filters it with its own predicate. Listeners whose provider has been torn
/// down are skipped, and detached at the next dispatch or cleanup once the
/// monitor holds the only reference to them. A live query that is still held
/// elsewhere keeps its attachment, so running it again resumes delivery.
///
/// # Example
///
/// ```ignore
/// let monitor = Rc::new(Monitor::new());
/// let live = LiveQuery::new(query);
/// monitor.attach(live.clone());
/// let result = live.run();
///
/// monitor.on_changed(&record);
/// ```
pub struct Monitor<R> {
    /// Attached listeners, in attachment order
    listeners: RefCell<Vec<(ListenerId, Rc<dyn ChangeListener<R>>)>>,
    /// Next listener ID to assign
    next_id: Cell<ListenerId>,
}

impl<R> Default for Monitor<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Monitor<R> {
    /// Creates a new monitor.
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Attaches a listener and returns its ID.
    pub fn attach(&self, listener: Rc<dyn ChangeListener<R>>) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Detaches a listener by ID.
    ///
    /// Returns true if the listener was found and removed.
    pub fn detach(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let len_before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() < len_before
    }

    /// Routes one event to every live listener, in attachment order.
    pub fn dispatch(&self, event: &ChangeEvent<R>) {
        // Listeners may attach further listeners while handling the event.
        for listener in self.live_listeners() {
            listener.on_event(event);
        }
    }

    /// Routes an `added` notification.
    pub fn on_added(&self, record: &R) {
        for listener in self.live_listeners() {
            listener.on_added(record);
        }
    }

    /// Routes a `removed` notification.
    pub fn on_removed(&self, record: &R) {
        for listener in self.live_listeners() {
            listener.on_removed(record);
        }
    }

    /// Routes a `changed` notification.
    pub fn on_changed(&self, record: &R) {
        for listener in self.live_listeners() {
            listener.on_changed(record);
        }
    }

    /// Returns the number of attached listeners, dead or alive.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Returns true if there are no attached listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Detaches listeners that are not alive and that nobody else holds.
    pub fn cleanup(&self) {
        let mut listeners = self.listeners.borrow_mut();
        let len_before = listeners.len();
        listeners.retain(|(_, listener)| listener.is_alive() || Rc::strong_count(listener) > 1);
        let pruned = len_before - listeners.len();
        if pruned > 0 {
            debug!(pruned, remaining = listeners.len(), "detached dead listeners");
        }
    }

    /// Detaches every listener.
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    fn live_listeners(&self) -> Vec<Rc<dyn ChangeListener<R>>> {
        self.cleanup();
        self.listeners
            .borrow()
            .iter()
            .filter(|(_, listener)| listener.is_alive())
            .map(|(_, listener)| listener.clone())
            .collect()
    }
}
