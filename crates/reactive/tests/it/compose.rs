//! Derived results over live queries.

use crate::helpers::{child, ids, live, record, tagged, Store, Task};
use std::rc::Rc;
use trellis_reactive::{AncestorClosure, FilteredProvider, MergedProvider};

#[test]
fn test_merged_follows_live_inputs() {
    let store = Store::with_records(vec![record(1, 'A'), record(2, 'B')]);
    let a = live(&store, tagged(&store, 'A'));
    let b = live(&store, tagged(&store, 'B'));

    let merged = MergedProvider::new(vec![a.run(), b.run()]);
    let all = merged.result();
    assert_eq!(ids(&all), vec![1, 2]);
    assert!(all.is_done());

    // Moves between inputs: removed from one, appended from the other
    store.change(record(1, 'B'));
    assert_eq!(ids(&all), vec![2, 1]);

    // Update within one input: a replace in place
    let changes = all.record_changes();
    store.change(record(2, 'B'));
    assert_eq!(changes.borrow().replaced.len(), 1);
    assert_eq!(all.get(0).map(|t| t.revision), Some(1));
}

#[test]
fn test_merged_keeps_input_queries_alive() {
    let store = Store::with_records(vec![record(1, 'A')]);
    let a = live(&store, tagged(&store, 'A'));
    let merged = MergedProvider::new(vec![a.run()]);

    assert!(a.has_provider());
    store.add(record(2, 'A'));
    assert_eq!(ids(&merged.result()), vec![1, 2]);

    drop(merged);
    assert!(!a.has_provider());
}

#[test]
fn test_filtered_view_of_live_query() {
    let store = Store::with_records(vec![child(1, 'A', 10), child(2, 'A', 20), child(3, 'A', 10)]);
    let everything = live(&store, tagged(&store, 'A')).run();
    let under_10 = FilteredProvider::new(&everything, |t: &Task| t.parent == Some(10));
    let result = under_10.result();
    assert_eq!(ids(&result), vec![1, 3]);

    store.change(child(2, 'A', 10));
    assert_eq!(ids(&result), vec![1, 2, 3]);

    store.change(child(1, 'A', 20));
    assert_eq!(ids(&result), vec![2, 3]);
}

#[test]
fn test_ancestor_closure_over_search_results() {
    // 1 -> 2 -> {3, 4}; only tag 'S' items match the search
    let store = Store::with_records(vec![
        record(1, 'x'),
        child(2, 'x', 1),
        child(3, 'S', 2),
        child(4, 'x', 2),
    ]);
    let hits = live(&store, tagged(&store, 'S')).run();

    let lookup = Rc::downgrade(&store);
    let closure = AncestorClosure::new(
        &hits,
        |t: &Task| t.id,
        move |t: &Task| {
            let store = lookup.upgrade()?;
            let parent = t.parent?;
            store
                .records()
                .iter()
                .find(|r| r.id == parent)
                .map(|r| Task::from(r))
        },
    );
    let shown = closure.result();
    assert_eq!(ids(&shown), vec![1, 2, 3]);

    store.change(child(4, 'S', 2));
    assert_eq!(ids(&shown), vec![1, 2, 3, 4]);

    // No hit left below 1: the whole chain is collected
    store.change(child(3, 'x', 2));
    store.change(child(4, 'x', 2));
    assert!(shown.is_empty());
}
