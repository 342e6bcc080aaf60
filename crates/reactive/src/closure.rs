//! Ancestor closure of a result.
//!
//! Some sources only report the items a consumer asked for (the "wanted"
//! items), while a tree view also needs every ancestor on the way to the top
//! level. `AncestorClosure` derives a provider holding both, and garbage
//! collects an ancestor as soon as no wanted item below it remains.

use crate::provider::Provider;
use crate::result::QueryResult;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt::Debug;
use core::hash::Hash;
use hashbrown::HashMap;
use tracing::{trace, warn};
use trellis_core::Result;

/// Bookkeeping for one item of the closure.
#[derive(Clone, Debug)]
struct Entry<K> {
    parent: Option<K>,
    /// Whether the input lists this item itself
    wanted: bool,
    /// Wanted items strictly below this one
    descendants: usize,
}

/// A provider mutation computed under the entry borrow, applied after it.
enum Op<K, T> {
    Append(T),
    Replace(K, T),
    Remove(K),
    /// Moves an item and everything below it after its parent, if needed
    Reorder(K),
}

struct Closure<K, T> {
    key_of: Rc<dyn Fn(&T) -> K>,
    parent_of: Rc<dyn Fn(&T) -> Option<T>>,
    entries: RefCell<HashMap<K, Entry<K>>>,
}

impl<K, T> Closure<K, T>
where
    K: Eq + Hash + Clone + Debug + 'static,
    T: Clone + 'static,
{
    /// The input started listing `item`.
    fn want(&self, item: &T) -> Vec<Op<K, T>> {
        let key = (self.key_of)(item);
        let mut entries = self.entries.borrow_mut();
        let mut ops = Vec::new();

        match entries.get_mut(&key) {
            Some(entry) if entry.wanted => {
                trace!(key = ?key, "item already wanted");
                return ops;
            }
            Some(entry) => {
                // Present as an ancestor; the wanted version takes its place.
                entry.wanted = true;
                ops.push(Op::Replace(key.clone(), item.clone()));
            }
            None => {
                let parent = self.link_ancestors(&mut entries, item, &mut ops);
                entries.insert(
                    key.clone(),
                    Entry {
                        parent,
                        wanted: true,
                        descendants: 0,
                    },
                );
                ops.push(Op::Append(item.clone()));
            }
        }

        let parent = entries.get(&key).and_then(|entry| entry.parent.clone());
        Self::adjust(&mut entries, parent, 1, true);
        ops
    }

    /// The input stopped listing `item`.
    fn unwant(&self, item: &T) -> Vec<Op<K, T>> {
        let key = (self.key_of)(item);
        let mut entries = self.entries.borrow_mut();
        let mut ops = Vec::new();

        let parent = match entries.get_mut(&key) {
            Some(entry) if entry.wanted => {
                entry.wanted = false;
                entry.parent.clone()
            }
            _ => return ops,
        };
        Self::adjust(&mut entries, parent, 1, false);
        Self::prune(&mut entries, Some(key), &mut ops);
        ops
    }

    /// The input replaced `old` by `new` in place.
    fn rewant(&self, old: &T, new: &T) -> Vec<Op<K, T>> {
        let (old_key, key) = ((self.key_of)(old), (self.key_of)(new));
        if old_key != key {
            let mut ops = self.unwant(old);
            ops.extend(self.want(new));
            return ops;
        }

        let new_parent = (self.parent_of)(new).map(|p| (self.key_of)(&p));
        let mut entries = self.entries.borrow_mut();
        let mut ops = Vec::new();
        let Some(old_parent) = entries.get(&key).map(|entry| entry.parent.clone()) else {
            drop(entries);
            return self.want(new);
        };

        if old_parent != new_parent {
            trace!(key = ?key, "wanted item moved");
            let parent = self.link_ancestors(&mut entries, new, &mut ops);
            let carried = entries.get(&key).map_or(0, |entry| entry.descendants + 1);
            Self::adjust(&mut entries, parent.clone(), carried, true);
            if let Some(entry) = entries.get_mut(&key) {
                entry.parent = parent;
            }
            ops.push(Op::Replace(key.clone(), new.clone()));
            ops.push(Op::Reorder(key));
            Self::adjust(&mut entries, old_parent.clone(), carried, false);
            Self::prune(&mut entries, old_parent, &mut ops);
        } else {
            ops.push(Op::Replace(key, new.clone()));
        }
        ops
    }

    /// Creates entries for the missing ancestors of `item`, topmost first,
    /// and returns the key of its parent.
    fn link_ancestors(
        &self,
        entries: &mut HashMap<K, Entry<K>>,
        item: &T,
        ops: &mut Vec<Op<K, T>>,
    ) -> Option<K> {
        let parent = (self.parent_of)(item)?;
        let parent_key = (self.key_of)(&parent);

        let mut missing = Vec::new();
        let mut next = Some(parent);
        while let Some(ancestor) = next {
            let ancestor_key = (self.key_of)(&ancestor);
            if entries.contains_key(&ancestor_key) {
                break;
            }
            next = (self.parent_of)(&ancestor);
            let grandparent = next.as_ref().map(|p| (self.key_of)(p));
            missing.push((ancestor_key, grandparent, ancestor));
        }

        for (ancestor_key, grandparent, ancestor) in missing.into_iter().rev() {
            trace!(key = ?ancestor_key, "adding ancestor");
            entries.insert(
                ancestor_key,
                Entry {
                    parent: grandparent,
                    wanted: false,
                    descendants: 0,
                },
            );
            ops.push(Op::Append(ancestor));
        }
        Some(parent_key)
    }

    /// Adds or subtracts `count` wanted descendants on `from` and everything
    /// above it.
    fn adjust(entries: &mut HashMap<K, Entry<K>>, from: Option<K>, count: usize, increment: bool) {
        let mut next = from;
        while let Some(key) = next {
            let Some(entry) = entries.get_mut(&key) else {
                break;
            };
            if increment {
                entry.descendants += count;
            } else {
                debug_assert!(entry.descendants >= count, "descendant count underflow");
                entry.descendants = entry.descendants.saturating_sub(count);
            }
            next = entry.parent.clone();
        }
    }

    /// Removes unwanted entries without wanted descendants, from `from` upward.
    fn prune(entries: &mut HashMap<K, Entry<K>>, from: Option<K>, ops: &mut Vec<Op<K, T>>) {
        let mut next = from;
        while let Some(key) = next {
            let collectable = entries
                .get(&key)
                .is_some_and(|entry| !entry.wanted && entry.descendants == 0);
            if !collectable {
                break;
            }
            next = entries.remove(&key).and_then(|entry| entry.parent);
            trace!(key = ?key, "collecting ancestor");
            ops.push(Op::Remove(key));
        }
    }

    fn apply(&self, provider: &Provider<T>, ops: Vec<Op<K, T>>) {
        for op in ops {
            let outcome = match op {
                Op::Append(item) => {
                    provider.append(item);
                    Ok(())
                }
                Op::Replace(key, item) => match self.index_of(provider, &key) {
                    Some(index) => provider.replace(index, item).map(|_| ()),
                    None => Ok(()),
                },
                Op::Remove(key) => match self.index_of(provider, &key) {
                    Some(index) => provider.remove_at(index),
                    None => Ok(()),
                },
                Op::Reorder(key) => self.reorder(provider, &key),
            };
            if let Err(error) = outcome {
                warn!(%error, "ancestor closure update failed");
            }
        }
    }

    fn index_of(&self, provider: &Provider<T>, key: &K) -> Option<usize> {
        provider.position(|item| (self.key_of)(item) == *key)
    }

    /// Restores parent-first order after `key` moved under a parent that
    /// sits further down the sequence.
    fn reorder(&self, provider: &Provider<T>, key: &K) -> Result<()> {
        let moved: Vec<usize> = {
            let entries = self.entries.borrow();
            let Some(parent) = entries.get(key).and_then(|entry| entry.parent.clone()) else {
                return Ok(());
            };
            match (self.index_of(provider, &parent), self.index_of(provider, key)) {
                (Some(parent_index), Some(index)) if parent_index > index => {}
                _ => return Ok(()),
            }
            provider.with_data(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter(|(_, item)| Self::within(&entries, (self.key_of)(item), key))
                    .map(|(index, _)| index)
                    .collect()
            })
        };
        trace!(key = ?key, count = moved.len(), "moving subtree after its parent");

        // Taken from the back so earlier rows keep their index
        let mut taken = Vec::with_capacity(moved.len());
        for index in moved.into_iter().rev() {
            taken.push(provider.take_at(index)?);
        }
        for item in taken.into_iter().rev() {
            provider.append(item);
        }
        Ok(())
    }

    /// Returns true if `key` is `root` or lies below it.
    fn within(entries: &HashMap<K, Entry<K>>, key: K, root: &K) -> bool {
        let mut next = Some(key);
        while let Some(key) = next {
            if key == *root {
                return true;
            }
            next = entries.get(&key).and_then(|entry| entry.parent.clone());
        }
        false
    }
}

/// A derived provider holding a set of wanted items plus all their ancestors.
///
/// Ancestors are appended before the first wanted item that needs them, so
/// a parent always precedes its children in the derived sequence. When a
/// wanted item is reparented below a later row, it moves to the end together
/// with everything below it. Each
/// ancestor counts the wanted items below it; when that count drops to zero
/// and the ancestor is not wanted itself, it is removed, and the removal
/// cascades upward.
///
/// # Example
///
/// ```ignore
/// let matching = search.run();
/// let closure = AncestorClosure::new(&matching, |t: &Task| t.id, |t| store.parent(t));
/// let tree = QueryTree::new(move |parent| children_in(&closure.result(), parent));
/// ```
pub struct AncestorClosure<K, T> {
    provider: Rc<Provider<T>>,
    closure: Rc<Closure<K, T>>,
}

impl<K, T> AncestorClosure<K, T>
where
    K: Eq + Hash + Clone + Debug + 'static,
    T: Clone + 'static,
{
    /// Builds the closure of `input`.
    ///
    /// `key_of` identifies an item; `parent_of` resolves an item's parent,
    /// or `None` at the top level.
    pub fn new<KF, PF>(input: &QueryResult<T>, key_of: KF, parent_of: PF) -> Self
    where
        KF: Fn(&T) -> K + 'static,
        PF: Fn(&T) -> Option<T> + 'static,
    {
        let closure = Rc::new(Closure {
            key_of: Rc::new(key_of),
            parent_of: Rc::new(parent_of),
            entries: RefCell::new(HashMap::new()),
        });
        let provider = Provider::new();
        for item in input.data() {
            let ops = closure.want(&item);
            closure.apply(&provider, ops);
        }

        let upstream = QueryResult::create(input.provider());
        Self::forward(&upstream, &closure, Rc::downgrade(&provider));
        if upstream.is_done() {
            provider.done();
        }
        provider.retain_upstream(upstream);
        Self { provider, closure }
    }

    /// Returns the derived provider.
    pub fn provider(&self) -> &Rc<Provider<T>> {
        &self.provider
    }

    /// Returns a new result handle on the derived provider.
    pub fn result(&self) -> QueryResult<T> {
        self.provider.result()
    }

    /// Returns true if `key` is listed by the input itself.
    pub fn is_wanted(&self, key: &K) -> bool {
        self.closure
            .entries
            .borrow()
            .get(key)
            .is_some_and(|entry| entry.wanted)
    }

    /// Returns the number of wanted items strictly below `key`.
    pub fn descendants(&self, key: &K) -> Option<usize> {
        self.closure
            .entries
            .borrow()
            .get(key)
            .map(|entry| entry.descendants)
    }

    fn forward(upstream: &QueryResult<T>, closure: &Rc<Closure<K, T>>, derived: Weak<Provider<T>>) {
        let (c, target) = (closure.clone(), derived.clone());
        upstream.on_post_insert(move |item, _| {
            if let Some(derived) = target.upgrade() {
                let ops = c.want(item);
                c.apply(&derived, ops);
            }
        });

        let (c, target) = (closure.clone(), derived.clone());
        upstream.on_pre_remove(move |item, _| {
            if let Some(derived) = target.upgrade() {
                let ops = c.unwant(item);
                c.apply(&derived, ops);
            }
        });

        let pending: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
        let p = pending.clone();
        upstream.on_pre_replace(move |old, _| *p.borrow_mut() = Some(old.clone()));

        let (c, target) = (closure.clone(), derived.clone());
        upstream.on_post_replace(move |new, _| {
            let (Some(derived), Some(old)) = (target.upgrade(), pending.borrow_mut().take()) else {
                return;
            };
            let ops = c.rewant(&old, new);
            c.apply(&derived, ops);
        });

        upstream.on_done(move || {
            if let Some(derived) = derived.upgrade() {
                derived.done();
            }
        });
    }
}
