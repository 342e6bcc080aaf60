//! Membership transitions driven by store change events.

use crate::helpers::{child, ids, live, record, tagged, Store};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_retag_walkthrough() {
    let store = Store::with_records(vec![record(1, 'A'), record(2, 'B')]);
    let query = live(&store, tagged(&store, 'A'));
    let result = query.run();
    assert_eq!(ids(&result), vec![1]);

    // 2 was not represented: appended
    store.change(record(2, 'A'));
    assert_eq!(ids(&result), vec![1, 2]);

    // 1 lost membership: removed
    store.change(record(1, 'B'));
    assert_eq!(ids(&result), vec![2]);
}

#[test]
fn test_one_event_moves_record_between_queries() {
    let store = Store::with_records(vec![record(1, 'A')]);
    let a = live(&store, tagged(&store, 'A'));
    let b = live(&store, tagged(&store, 'B'));
    let in_a = a.run();
    let in_b = b.run();

    let a_changes = in_a.record_changes();
    let b_changes = in_b.record_changes();

    store.change(record(1, 'B'));

    assert!(in_a.is_empty());
    assert_eq!(ids(&in_b), vec![1]);
    assert_eq!(a_changes.borrow().removed.len(), 1);
    assert_eq!(b_changes.borrow().inserted.len(), 1);
}

#[test]
fn test_reparent_moves_between_child_queries() {
    let store = Store::with_records(vec![record(1, 'A'), record(2, 'A'), child(3, 'A', 1)]);
    let under_1 = live(&store, crate::helpers::children(&store, Some(1))).run();
    let under_2 = live(&store, crate::helpers::children(&store, Some(2))).run();
    assert_eq!(ids(&under_1), vec![3]);

    store.change(child(3, 'A', 2));

    assert!(under_1.is_empty());
    assert_eq!(ids(&under_2), vec![3]);
}

#[test]
fn test_update_in_place_is_one_replace() {
    let store = Store::with_records(vec![record(1, 'A'), record(2, 'A'), record(3, 'A')]);
    let query = live(&store, tagged(&store, 'A'));
    let result = query.run();

    let events = Rc::new(RefCell::new(Vec::new()));
    let e = events.clone();
    result.on_pre_remove(move |_, row| e.borrow_mut().push(("pre-remove", row)));
    let e = events.clone();
    result.on_post_insert(move |_, row| e.borrow_mut().push(("post-insert", row)));
    let e = events.clone();
    result.on_pre_replace(move |_, row| e.borrow_mut().push(("pre-replace", row)));
    let e = events.clone();
    result.on_post_replace(move |task, row| {
        assert_eq!(task.revision, 1);
        e.borrow_mut().push(("post-replace", row));
    });

    store.change(record(2, 'A'));

    assert_eq!(*events.borrow(), vec![("pre-replace", 1), ("post-replace", 1)]);
    assert_eq!(ids(&result), vec![1, 2, 3]);
}

#[test]
fn test_predicate_ignores_unrelated_records() {
    let store = Store::new();
    let query = live(&store, tagged(&store, 'A'));
    let result = query.run();
    let changes = result.record_changes();

    store.add(record(1, 'B'));
    store.change(record(1, 'C'));
    store.remove(1);

    assert!(result.is_empty());
    assert!(changes.borrow().is_empty());
}

#[test]
fn test_appends_in_discovery_order() {
    let store = Store::new();
    let query = live(&store, tagged(&store, 'A'));
    let result = query.run();

    for id in [5, 3, 9, 1] {
        store.add(record(id, 'A'));
    }
    assert_eq!(ids(&result), vec![5, 3, 9, 1]);
}

#[test]
fn test_early_events_then_stale_snapshot() {
    let store = Store::with_records(vec![record(1, 'A'), record(2, 'A'), record(3, 'A')]);
    store.defer_fetches();
    let query = live(&store, tagged(&store, 'A'));
    let result = query.run();
    assert!(result.is_empty());
    assert!(!result.is_done());

    // The parked snapshot still holds 1, 2 and 3 as tagged A
    store.change(record(2, 'B'));
    store.remove(3);
    store.add(record(4, 'A'));
    assert_eq!(ids(&result), vec![4]);

    store.release();
    assert_eq!(ids(&result), vec![4, 1]);
    assert!(result.is_done());
}

#[test]
fn test_failed_fetch_keeps_event_driven_items() {
    let store = Store::with_records(vec![record(1, 'A'), record(2, 'A')]);
    store.defer_fetches();
    let query = live(&store, tagged(&store, 'A'));
    let result = query.run();

    store.change(record(2, 'A'));
    store.fail();

    // 1 came only from the failed fetch; 2 was confirmed by an event
    assert_eq!(ids(&result), vec![2]);
    assert!(result.is_done());
}
