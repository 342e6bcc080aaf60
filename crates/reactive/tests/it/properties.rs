//! Property-based tests using proptest.

use crate::helpers::{ids, live, record, tagged, Store, Task};
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use trellis_reactive::{Provider, QueryResult};

#[derive(Clone, Debug)]
enum StoreOp {
    Add(u64, char),
    Remove(u64),
    Change(u64, char),
}

fn store_op() -> impl Strategy<Value = StoreOp> {
    let tag = prop::sample::select(vec!['A', 'B', 'C']);
    prop_oneof![
        (0u64..8, tag.clone()).prop_map(|(id, tag)| StoreOp::Add(id, tag)),
        (0u64..8).prop_map(StoreOp::Remove),
        (0u64..8, tag).prop_map(|(id, tag)| StoreOp::Change(id, tag)),
    ]
}

fn apply(store: &Store, op: &StoreOp) {
    match *op {
        StoreOp::Add(id, tag) => {
            store.add(record(id, tag));
        }
        StoreOp::Remove(id) => {
            store.remove(id);
        }
        StoreOp::Change(id, tag) => {
            store.change(record(id, tag));
        }
    }
}

/// Ids the store currently holds with `tag`, sorted.
fn expected(store: &Store, tag: char) -> Vec<u64> {
    let mut ids: Vec<u64> = store
        .records()
        .iter()
        .filter(|r| r.tag == tag)
        .map(|r| r.id)
        .collect();
    ids.sort_unstable();
    ids
}

fn sorted(result: &QueryResult<Task>) -> Vec<u64> {
    let mut ids = ids(result);
    ids.sort_unstable();
    ids
}

fn assert_no_duplicates(result: &QueryResult<Task>) -> Result<(), TestCaseError> {
    let all = ids(result);
    let unique: HashSet<u64> = all.iter().copied().collect();
    prop_assert_eq!(unique.len(), all.len(), "duplicate identity in {:?}", all);
    Ok(())
}

proptest! {
    /// Records failing the predicate never appear, whatever the event order.
    #[test]
    fn predicate_filtering(ops in prop::collection::vec(store_op(), 1..60)) {
        let store = Store::new();
        let query = live(&store, tagged(&store, 'A'));
        let result = query.run();

        for op in &ops {
            apply(&store, op);
            prop_assert!(result.data().iter().all(|t| t.tag == 'A'));
        }
    }

    /// No two items ever derive from the same record, and the result ends up
    /// matching the store.
    #[test]
    fn identity_uniqueness(
        seed in prop::collection::vec((0u64..8, prop::sample::select(vec!['A', 'B'])), 0..8),
        ops in prop::collection::vec(store_op(), 1..60),
    ) {
        let store = Store::new();
        for (id, tag) in seed {
            store.add(record(id, tag));
        }
        let query = live(&store, tagged(&store, 'A'));
        let result = query.run();

        for op in &ops {
            apply(&store, op);
            assert_no_duplicates(&result)?;
        }
        prop_assert_eq!(sorted(&result), expected(&store, 'A'));
    }

    /// Events arriving while the fetch is outstanding are applied in order,
    /// and the stale snapshot never overrides them.
    #[test]
    fn interleaved_fetch_converges(
        seed in prop::collection::vec((0u64..8, prop::sample::select(vec!['A', 'B'])), 0..8),
        early in prop::collection::vec(store_op(), 0..30),
        late in prop::collection::vec(store_op(), 0..30),
    ) {
        let store = Store::new();
        for (id, tag) in seed {
            store.add(record(id, tag));
        }
        store.defer_fetches();
        let query = live(&store, tagged(&store, 'A'));
        let result = query.run();

        for op in &early {
            apply(&store, op);
            assert_no_duplicates(&result)?;
        }
        store.release();
        prop_assert!(result.is_done());
        prop_assert_eq!(sorted(&result), expected(&store, 'A'));

        for op in &late {
            apply(&store, op);
        }
        assert_no_duplicates(&result)?;
        prop_assert_eq!(sorted(&result), expected(&store, 'A'));
    }

    /// Dropped results are never called again; live ones see every mutation.
    #[test]
    fn weak_observer_safety(
        steps in prop::collection::vec((0u8..4, 0usize..4, any::<i32>()), 1..80),
    ) {
        let provider = Provider::with_items(vec![0, 1, 2]);
        let mut handles: Vec<(QueryResult<i32>, Rc<Cell<usize>>)> = Vec::new();
        let mut dropped: Vec<Rc<Cell<usize>>> = Vec::new();
        let mut frozen: Vec<usize> = Vec::new();

        for (action, slot, value) in steps {
            match action {
                0 => {
                    let result = provider.result();
                    let calls = Rc::new(Cell::new(0));
                    let c = calls.clone();
                    result.on_post_insert(move |_, _| c.set(c.get() + 1));
                    let c = calls.clone();
                    result.on_post_remove(move |_, _| c.set(c.get() + 1));
                    let c = calls.clone();
                    result.on_post_replace(move |_, _| c.set(c.get() + 1));
                    handles.push((result, calls));
                }
                1 if !handles.is_empty() => {
                    let (result, calls) = handles.remove(slot % handles.len());
                    drop(result);
                    frozen.push(calls.get());
                    dropped.push(calls);
                }
                2 => provider.append(value),
                _ => {
                    if !provider.is_empty() {
                        let index = slot % provider.len();
                        if value % 2 == 0 {
                            provider.replace(index, value).unwrap();
                        } else {
                            provider.remove_at(index).unwrap();
                        }
                    }
                }
            }
        }

        for (calls, at_drop) in dropped.iter().zip(&frozen) {
            prop_assert_eq!(calls.get(), *at_drop);
        }
        prop_assert_eq!(provider.observer_count(), handles.len());
    }
}
