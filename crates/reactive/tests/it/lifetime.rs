//! Provider teardown, weak observers and query reuse.

use crate::helpers::{ids, live, record, tagged, Store, Task, TaskRecord};
use std::cell::Cell;
use std::rc::Rc;
use trellis_reactive::{Provider, QueryCache};

#[test]
fn test_dropped_result_gets_no_more_calls() {
    let provider = Provider::with_items(vec![1, 2]);
    let kept = provider.result();
    let dropped = provider.result();

    let kept_calls = Rc::new(Cell::new(0));
    let dropped_calls = Rc::new(Cell::new(0));
    let k = kept_calls.clone();
    kept.on_post_insert(move |_, _| k.set(k.get() + 1));
    let d = dropped_calls.clone();
    dropped.on_post_insert(move |_, _| d.set(d.get() + 1));

    provider.append(3);
    drop(dropped);
    provider.append(4);
    provider.replace(0, 10).unwrap();
    provider.take_last();

    assert_eq!(kept_calls.get(), 2);
    assert_eq!(dropped_calls.get(), 1);
    assert_eq!(provider.observer_count(), 1);
}

#[test]
fn test_last_result_tears_down_provider() {
    let store = Store::with_records(vec![record(1, 'A')]);
    let query = live(&store, tagged(&store, 'A'));

    let first = query.run();
    let second = query.run();
    assert_eq!(store.fetch_count(), 1);

    drop(first);
    assert!(query.has_provider());
    drop(second);
    assert!(!query.has_provider());

    // Events for a torn down query are no-ops; the monitor lets go of it
    // once nothing else can run it again
    store.add(record(2, 'A'));
    assert_eq!(store.monitor().listener_count(), 1);
    drop(query);
    store.add(record(3, 'A'));
    assert_eq!(store.monitor().listener_count(), 0);
}

#[test]
fn test_rerun_after_teardown_keeps_following_store() {
    let store = Store::with_records(vec![record(1, 'A')]);
    let query = live(&store, tagged(&store, 'A'));

    drop(query.run());
    // Dispatched while the query has no provider
    store.add(record(5, 'B'));

    let again = query.run();
    assert_eq!(store.fetch_count(), 2);
    assert_eq!(ids(&again), vec![1]);

    store.add(record(2, 'A'));
    assert_eq!(ids(&again), vec![1, 2]);
    store.change(record(1, 'B'));
    assert_eq!(ids(&again), vec![2]);
    assert_eq!(store.monitor().listener_count(), 1);
}

#[test]
fn test_result_dropped_before_fetch_completes() {
    let store = Store::with_records(vec![record(1, 'A')]);
    store.defer_fetches();
    let query = live(&store, tagged(&store, 'A'));

    drop(query.run());
    store.release();

    assert!(!query.has_provider());
    assert!(!query.is_fetching());
}

fn cached(store: &Rc<Store>, cache: &QueryCache<char, TaskRecord, Task>, tag: char) -> Vec<u64> {
    let result = cache.query(tag, || Ok(tagged(store, tag))).unwrap();
    ids(&result)
}

#[test]
fn test_cache_refetches_only_after_teardown() {
    let store = Store::with_records(vec![record(1, 'A'), record(2, 'B')]);
    let cache = QueryCache::new(store.monitor().clone());

    let held = cache.query('A', || Ok(tagged(&store, 'A'))).unwrap();
    assert_eq!(cached(&store, &cache, 'A'), vec![1]);
    assert_eq!(store.fetch_count(), 1);

    store.add(record(3, 'A'));
    assert_eq!(ids(&held), vec![1, 3]);

    drop(held);
    assert!(!cache.contains(&'A'));
    assert_eq!(cached(&store, &cache, 'A'), vec![1, 3]);
    assert_eq!(store.fetch_count(), 2);

    cache.cleanup();
    assert!(cache.is_empty());
    assert_eq!(store.monitor().listener_count(), 0);
}
