//! Shared fixtures for collection integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ripple_collection::{
    mutation_fn, CollectionConfig, CollectionConfigBuilder, Confirmation, HandlerError,
    LoadSubsetFn, MutationFn, SyncConfig, SyncHandle, SyncMessage, SyncResult,
};
use ripple_core::{Key, Value};
use ripple_reactive::{ChangeMessage, ChangeType};
use tokio::sync::Notify;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn row(id: i64, title: &str) -> Value {
    Value::object([("id", Value::from(id)), ("title", Value::from(title))])
}

pub fn key_of(row: &Value) -> Option<Key> {
    row.get("id").and_then(|id| Key::from_value(id).ok())
}

pub fn title_of(value: &Value) -> Option<&str> {
    value.get("title").and_then(Value::as_str)
}

/// A sync source the test drives by hand.
#[derive(Clone, Default)]
pub struct TestSync {
    handle: Rc<RefCell<Option<SyncHandle>>>,
    starts: Rc<Cell<usize>>,
    cleanups: Rc<Cell<usize>>,
    load_subset: Option<LoadSubsetFn>,
}

impl TestSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_subset(mut self, load: LoadSubsetFn) -> Self {
        self.load_subset = Some(load);
        self
    }

    pub fn config(&self) -> SyncConfig {
        let this = self.clone();
        SyncConfig::new(move |params| {
            this.starts.set(this.starts.get() + 1);
            *this.handle.borrow_mut() = Some(params.handle);
            let cleanups = Rc::clone(&this.cleanups);
            let mut result =
                SyncResult::default().with_cleanup(move || cleanups.set(cleanups.get() + 1));
            if let Some(load) = &this.load_subset {
                result = result.with_load_subset(Rc::clone(load));
            }
            result
        })
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.borrow().clone().expect("sync not started")
    }

    pub fn starts(&self) -> usize {
        self.starts.get()
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.get()
    }

    /// Commits one batch inserting `rows`.
    pub fn insert(&self, rows: &[(i64, &str)]) {
        let handle = self.handle();
        handle.begin();
        for (id, title) in rows {
            handle.write(SyncMessage::insert(row(*id, title))).unwrap();
        }
        handle.commit().unwrap();
    }

    /// Commits the initial rows and marks the collection ready.
    pub fn ready(&self, rows: &[(i64, &str)]) {
        self.insert(rows);
        self.handle().mark_ready();
    }

    /// Commits a truncate followed by `rows`.
    pub fn resync(&self, rows: &[(i64, &str)]) {
        let handle = self.handle();
        handle.begin();
        handle.truncate().unwrap();
        for (id, title) in rows {
            handle.write(SyncMessage::insert(row(*id, title))).unwrap();
        }
        handle.commit().unwrap();
    }
}

pub fn builder(sync: &TestSync) -> CollectionConfigBuilder {
    CollectionConfig::builder(key_of, sync.config()).id("todos")
}

/// Collects every batch a subscriber receives.
#[derive(Clone, Default)]
pub struct Recorder {
    batches: Rc<RefCell<Vec<Vec<ChangeMessage>>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn(&[ChangeMessage]) + 'static {
        let batches = Rc::clone(&self.batches);
        move |changes: &[ChangeMessage]| batches.borrow_mut().push(changes.to_vec())
    }

    pub fn batches(&self) -> Vec<Vec<ChangeMessage>> {
        self.batches.borrow().clone()
    }

    pub fn last(&self) -> Vec<ChangeMessage> {
        self.batches.borrow().last().cloned().unwrap_or_default()
    }

    pub fn events(&self) -> Vec<(ChangeType, Key)> {
        self.batches
            .borrow()
            .iter()
            .flatten()
            .map(|c| (c.change_type, c.key.clone()))
            .collect()
    }

    pub fn count(&self, change_type: ChangeType, key: Key) -> usize {
        self.events()
            .into_iter()
            .filter(|(t, k)| *t == change_type && *k == key)
            .count()
    }

    pub fn clear(&self) {
        self.batches.borrow_mut().clear();
    }
}

pub fn kinds(batch: &[ChangeMessage]) -> Vec<(ChangeType, Key)> {
    batch.iter().map(|c| (c.change_type, c.key.clone())).collect()
}

pub fn ok_handler() -> MutationFn {
    mutation_fn(|_| async { Ok::<_, HandlerError>(Confirmation::None) })
}

pub fn failing_handler(message: &'static str) -> MutationFn {
    mutation_fn(move |_| async move { Err::<Confirmation, HandlerError>(message.into()) })
}

/// A handler that stays persisting until `gate` is notified.
pub fn gated_handler(gate: Rc<Notify>) -> MutationFn {
    mutation_fn(move |_| {
        let gate = Rc::clone(&gate);
        async move {
            gate.notified().await;
            Ok::<_, HandlerError>(Confirmation::None)
        }
    })
}

/// Like [`gated_handler`] but fails once released.
pub fn gated_failing_handler(gate: Rc<Notify>) -> MutationFn {
    mutation_fn(move |_| {
        let gate = Rc::clone(&gate);
        async move {
            gate.notified().await;
            Err::<Confirmation, HandlerError>("rejected".into())
        }
    })
}

/// Lets spawned local tasks run.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
