//! Model record store and task types shared by the integration tests.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use trellis_reactive::{FetchSink, LiveQuery, Monitor, Query, QueryResult, Record};

#[derive(Clone, Debug, PartialEq)]
pub struct TaskRecord {
    pub id: u64,
    pub tag: char,
    pub parent: Option<u64>,
}

impl Record for TaskRecord {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: u64,
    pub tag: char,
    pub parent: Option<u64>,
    pub revision: u32,
}

impl From<&TaskRecord> for Task {
    fn from(record: &TaskRecord) -> Self {
        Task {
            id: record.id,
            tag: record.tag,
            parent: record.parent,
            revision: 0,
        }
    }
}

pub fn record(id: u64, tag: char) -> TaskRecord {
    TaskRecord {
        id,
        tag,
        parent: None,
    }
}

pub fn child(id: u64, tag: char, parent: u64) -> TaskRecord {
    TaskRecord {
        id,
        tag,
        parent: Some(parent),
    }
}

/// In-memory record store notifying a monitor on every mutation.
///
/// Fetches either complete synchronously, or are parked with a snapshot
/// taken at request time until `release` is called.
pub struct Store {
    records: RefCell<Vec<TaskRecord>>,
    monitor: Rc<Monitor<TaskRecord>>,
    fetches: Cell<usize>,
    deferred: Cell<bool>,
    parked: RefCell<Vec<(FetchSink<TaskRecord>, Vec<TaskRecord>)>>,
}

impl Store {
    pub fn new() -> Rc<Self> {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<TaskRecord>) -> Rc<Self> {
        Rc::new(Store {
            records: RefCell::new(records),
            monitor: Rc::new(Monitor::new()),
            fetches: Cell::new(0),
            deferred: Cell::new(false),
            parked: RefCell::new(Vec::new()),
        })
    }

    pub fn monitor(&self) -> &Rc<Monitor<TaskRecord>> {
        &self.monitor
    }

    pub fn defer_fetches(&self) {
        self.deferred.set(true);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    pub fn records(&self) -> Vec<TaskRecord> {
        self.records.borrow().clone()
    }

    pub fn fetch(&self, sink: FetchSink<TaskRecord>) {
        self.fetches.set(self.fetches.get() + 1);
        let snapshot = self.records();
        if self.deferred.get() {
            self.parked.borrow_mut().push((sink, snapshot));
        } else {
            sink.complete(Ok(snapshot));
        }
    }

    /// Completes every parked fetch with its stale snapshot.
    pub fn release(&self) {
        let parked = std::mem::take(&mut *self.parked.borrow_mut());
        for (sink, snapshot) in parked {
            sink.complete(Ok(snapshot));
        }
    }

    /// Fails every parked fetch after delivering its snapshot.
    pub fn fail(&self) {
        let parked = std::mem::take(&mut *self.parked.borrow_mut());
        for (sink, snapshot) in parked {
            sink.extend(snapshot);
            sink.fail(trellis_reactive::Error::fetch("connection reset"));
        }
    }

    pub fn add(&self, record: TaskRecord) -> bool {
        if self.position(record.id).is_some() {
            return false;
        }
        self.records.borrow_mut().push(record.clone());
        self.monitor.on_added(&record);
        true
    }

    pub fn remove(&self, id: u64) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let record = self.records.borrow_mut().remove(index);
        self.monitor.on_removed(&record);
        true
    }

    pub fn change(&self, record: TaskRecord) -> bool {
        let Some(index) = self.position(record.id) else {
            return false;
        };
        self.records.borrow_mut()[index] = record.clone();
        self.monitor.on_changed(&record);
        true
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.records.borrow().iter().position(|r| r.id == id)
    }
}

fn fetch_from(store: &Rc<Store>) -> impl Fn(FetchSink<TaskRecord>) + 'static {
    let store: Weak<Store> = Rc::downgrade(store);
    move |sink| {
        if let Some(store) = store.upgrade() {
            store.fetch(sink);
        }
    }
}

/// Tasks carrying `tag`.
pub fn tagged(store: &Rc<Store>, tag: char) -> Query<TaskRecord, Task> {
    Query::builder(format!("tagged {}", tag))
        .fetch(fetch_from(store))
        .predicate(move |r: &TaskRecord| r.tag == tag)
        .convert(|r| Task::from(r))
        .update(|r, t| {
            t.tag = r.tag;
            t.parent = r.parent;
            t.revision += 1;
        })
        .represents(|r, t| r.id == t.id)
        .build()
        .unwrap()
}

/// Tasks directly below `parent` (`None` for the top level).
pub fn children(store: &Rc<Store>, parent: Option<u64>) -> Query<TaskRecord, Task> {
    Query::builder(format!("children of {:?}", parent))
        .fetch(fetch_from(store))
        .predicate(move |r: &TaskRecord| r.parent == parent)
        .convert(|r| Task::from(r))
        .represents(|r, t| r.id == t.id)
        .build()
        .unwrap()
}

/// Creates a live query attached to the store's monitor.
pub fn live(store: &Rc<Store>, query: Query<TaskRecord, Task>) -> Rc<LiveQuery<TaskRecord, Task>> {
    let live = LiveQuery::new(query);
    store.monitor().attach(live.clone());
    live
}

pub fn ids(result: &QueryResult<Task>) -> Vec<u64> {
    result.data().iter().map(|t| t.id).collect()
}
