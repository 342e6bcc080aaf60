//! Result handles: the read/subscribe surface of a provider.

use crate::change_set::ChangeSet;
use crate::handler::{HandlerSet, Phase};
use crate::provider::Provider;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

/// State shared by all clones of one result handle.
///
/// The provider only holds a weak reference to this state; the state holds
/// the provider strongly.
pub(crate) struct ResultState<T> {
    pub(crate) provider: Rc<Provider<T>>,
    pub(crate) handlers: RefCell<HandlerSet<T>>,
}

/// A consumer-facing handle onto a provider.
///
/// A provider lives as long as at least one result referencing it lives.
/// Clones of a result share one registration (and one set of handlers); call
/// `Provider::result` or `QueryResult::create` to get an independent one.
///
/// # Example
///
/// ```ignore
/// let result = live_query.run();
/// result.on_post_insert(|task, row| println!("{:?} inserted at {}", task, row));
/// result.on_done(|| println!("initial population complete"));
/// ```
pub struct QueryResult<T> {
    state: Rc<ResultState<T>>,
}

impl<T> Clone for QueryResult<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + 'static> QueryResult<T> {
    /// Creates a new result handle registered on `provider`.
    pub fn create(provider: &Rc<Provider<T>>) -> Self {
        let state = Rc::new(ResultState {
            provider: provider.clone(),
            handlers: RefCell::new(HandlerSet::new()),
        });
        provider.register(Rc::downgrade(&state));
        Self { state }
    }

    /// Returns a snapshot of the current items.
    pub fn data(&self) -> Vec<T> {
        self.state.provider.data()
    }

    /// Runs `f` with a borrowed view of the current items.
    pub fn with_data<U, F>(&self, f: F) -> U
    where
        F: FnOnce(&[T]) -> U,
    {
        self.state.provider.with_data(f)
    }

    /// Returns a clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.state.provider.get(index)
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.state.provider.len()
    }

    /// Returns true if there are no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state.provider.is_empty()
    }

    /// Returns whether the initial population completed.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.provider.is_done()
    }

    /// Returns true if both handles observe the same provider.
    pub fn same_provider(&self, other: &QueryResult<T>) -> bool {
        Rc::ptr_eq(&self.state.provider, &other.state.provider)
    }

    pub(crate) fn provider(&self) -> &Rc<Provider<T>> {
        &self.state.provider
    }

    /// Registers a handler called before an item is inserted.
    pub fn on_pre_insert<F>(&self, handler: F)
    where
        F: Fn(&T, usize) + 'static,
    {
        self.add_handler(Phase::PreInsert, handler);
    }

    /// Registers a handler called after an item is inserted.
    pub fn on_post_insert<F>(&self, handler: F)
    where
        F: Fn(&T, usize) + 'static,
    {
        self.add_handler(Phase::PostInsert, handler);
    }

    /// Registers a handler called before an item is removed.
    pub fn on_pre_remove<F>(&self, handler: F)
    where
        F: Fn(&T, usize) + 'static,
    {
        self.add_handler(Phase::PreRemove, handler);
    }

    /// Registers a handler called after an item is removed.
    pub fn on_post_remove<F>(&self, handler: F)
    where
        F: Fn(&T, usize) + 'static,
    {
        self.add_handler(Phase::PostRemove, handler);
    }

    /// Registers a handler called with the old item before a replace.
    pub fn on_pre_replace<F>(&self, handler: F)
    where
        F: Fn(&T, usize) + 'static,
    {
        self.add_handler(Phase::PreReplace, handler);
    }

    /// Registers a handler called with the new item after a replace.
    pub fn on_post_replace<F>(&self, handler: F)
    where
        F: Fn(&T, usize) + 'static,
    {
        self.add_handler(Phase::PostReplace, handler);
    }

    /// Registers a handler called once the initial population completed.
    ///
    /// A handler registered after that point is not called; check `is_done`.
    pub fn on_done<F>(&self, handler: F)
    where
        F: Fn() + 'static,
    {
        self.state.handlers.borrow_mut().add_done(Rc::new(handler));
    }

    /// Registers a handler for an arbitrary phase.
    pub fn add_handler<F>(&self, phase: Phase, handler: F)
    where
        F: Fn(&T, usize) + 'static,
    {
        self.state.handlers.borrow_mut().add(phase, Rc::new(handler));
    }

    /// Records every subsequent change into a shared change set.
    ///
    /// The recorder only holds the change set; it lives as long as this
    /// result handle.
    pub fn record_changes(&self) -> Rc<RefCell<ChangeSet<T>>> {
        let changes = Rc::new(RefCell::new(ChangeSet::new()));
        let pending_old: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));

        let c = changes.clone();
        self.on_post_insert(move |item, index| c.borrow_mut().insert(index, item.clone()));

        let c = changes.clone();
        self.on_post_remove(move |item, index| c.borrow_mut().remove(index, item.clone()));

        let p = pending_old.clone();
        self.on_pre_replace(move |item, _| *p.borrow_mut() = Some(item.clone()));

        let c = changes.clone();
        self.on_post_replace(move |item, index| {
            if let Some(old) = pending_old.borrow_mut().take() {
                c.borrow_mut().replace(index, old, item.clone());
            }
        });

        let c = changes.clone();
        self.on_done(move || c.borrow_mut().done = true);

        changes
    }
}
