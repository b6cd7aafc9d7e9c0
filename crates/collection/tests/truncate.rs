//! Truncate interleaved with optimistic transactions.

mod common;

use std::rc::Rc;

use common::*;
use ripple_collection::{Collection, TransactionState};
use ripple_core::{Key, Value};
use ripple_reactive::{ChangeType, SubscribeOptions};
use tokio::sync::Notify;
use tokio::task::LocalSet;

fn retitle(title: &'static str) -> impl FnOnce(&mut Value) {
    move |draft| draft.set("title", Value::from(title))
}

#[tokio::test]
async fn test_pending_insert_survives_truncate_resync() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let sync = TestSync::new();
            let gate = Rc::new(Notify::new());
            let todos = Collection::new(builder(&sync).on_insert(gated_handler(gate.clone())).build());
            let recorder = Recorder::new();
            let _sub = todos
                .subscribe_changes(recorder.callback(), SubscribeOptions::default())
                .unwrap();
            sync.ready(&[(1, "a"), (2, "b")]);

            let tx = todos.insert(row(3, "c")).unwrap();
            settle().await;
            assert_eq!(tx.state(), TransactionState::Persisting);

            sync.resync(&[(1, "a"), (2, "b")]);
            assert_eq!(todos.keys(), vec![Key::Int(1), Key::Int(2), Key::Int(3)]);

            gate.notify_one();
            tx.is_persisted().await.unwrap();
            assert_eq!(todos.get(3), Some(row(3, "c")));

            let inserts = recorder.count(ChangeType::Insert, Key::Int(3));
            let deletes = recorder.count(ChangeType::Delete, Key::Int(3));
            assert_eq!(inserts - deletes, 1);
        })
        .await;
}

#[tokio::test]
async fn test_persisting_update_survives_truncate() {
    LocalSet::new()
        .run_until(async {
            let sync = TestSync::new();
            let gate = Rc::new(Notify::new());
            let todos = Collection::new(builder(&sync).on_update(gated_handler(gate.clone())).build());
            let recorder = Recorder::new();
            let _sub = todos
                .subscribe_changes(recorder.callback(), SubscribeOptions::default())
                .unwrap();
            sync.ready(&[(1, "a"), (2, "b"), (3, "c")]);

            let tx = todos.update(3, retitle("edited")).unwrap();
            recorder.clear();

            sync.resync(&[(1, "a"), (2, "b")]);
            let batch = recorder.last();
            assert_eq!(recorder.batches().len(), 1);
            let for_three: Vec<_> = batch.iter().filter(|c| c.key == Key::Int(3)).collect();
            assert_eq!(for_three.len(), 2);
            assert_eq!(for_three[0].change_type, ChangeType::Delete);
            assert_eq!(for_three[1].change_type, ChangeType::Insert);
            assert_eq!(for_three[1].value, row(3, "edited"));
            assert_eq!(todos.get(3), Some(row(3, "edited")));

            gate.notify_one();
            tx.is_persisted().await.unwrap();
            assert_eq!(todos.get(3), Some(row(3, "edited")));
        })
        .await;
}

#[tokio::test]
async fn test_transaction_completing_before_truncate_commit() {
    LocalSet::new()
        .run_until(async {
            let sync = TestSync::new();
            let gate = Rc::new(Notify::new());
            let todos = Collection::new(builder(&sync).on_update(gated_handler(gate.clone())).build());
            todos.start_sync().unwrap();
            sync.ready(&[(1, "a")]);

            let tx = todos.update(1, retitle("mine")).unwrap();
            let handle = sync.handle();
            handle.begin();
            handle.truncate().unwrap();

            gate.notify_one();
            tx.is_persisted().await.unwrap();

            handle.commit().unwrap();
            assert_eq!(todos.get(1), Some(row(1, "mine")));
        })
        .await;
}

#[tokio::test]
async fn test_mutation_after_snapshot_overrides_it() {
    LocalSet::new()
        .run_until(async {
            let sync = TestSync::new();
            let first = Rc::new(Notify::new());
            let todos = Collection::new(builder(&sync).on_update(gated_handler(first.clone())).build());
            todos.start_sync().unwrap();
            sync.ready(&[(1, "a")]);

            let _a = todos.update(1, retitle("first")).unwrap();
            let handle = sync.handle();
            handle.begin();
            handle.truncate().unwrap();
            let _b = todos.update(1, retitle("second")).unwrap();
            handle.commit().unwrap();

            assert_eq!(todos.get(1), Some(row(1, "second")));
        })
        .await;
}

#[tokio::test]
async fn test_optimistic_value_beats_server_reinsert() {
    LocalSet::new()
        .run_until(async {
            let sync = TestSync::new();
            let gate = Rc::new(Notify::new());
            let todos = Collection::new(builder(&sync).on_update(gated_handler(gate.clone())).build());
            todos.start_sync().unwrap();
            sync.ready(&[(1, "a")]);

            let tx = todos.update(1, retitle("mine")).unwrap();
            sync.resync(&[(1, "server")]);
            assert_eq!(todos.get(1), Some(row(1, "mine")));

            gate.notify_one();
            tx.is_persisted().await.unwrap();
            assert_eq!(todos.get(1), Some(row(1, "mine")));

            // A later synced write supersedes the preserved value.
            sync.insert(&[(1, "confirmed")]);
            assert_eq!(todos.get(1), Some(row(1, "confirmed")));
        })
        .await;
}

#[tokio::test]
async fn test_failed_transaction_after_truncate_rolls_back() {
    LocalSet::new()
        .run_until(async {
            let sync = TestSync::new();
            let gate = Rc::new(Notify::new());
            let todos = Collection::new(
                builder(&sync)
                    .on_insert(gated_failing_handler(gate.clone()))
                    .build(),
            );
            let recorder = Recorder::new();
            let _sub = todos
                .subscribe_changes(recorder.callback(), SubscribeOptions::default())
                .unwrap();
            sync.ready(&[(1, "a")]);

            let tx = todos.insert(row(2, "b")).unwrap();
            sync.resync(&[(1, "a")]);
            assert!(todos.has(2));

            gate.notify_one();
            assert!(tx.is_persisted().await.is_err());
            assert!(!todos.has(2));
            assert_eq!(kinds(&recorder.last()), vec![(ChangeType::Delete, Key::Int(2))]);
        })
        .await;
}

#[tokio::test]
async fn test_truncating_empty_collection_emits_nothing() {
    let sync = TestSync::new();
    let todos = Collection::new(builder(&sync).build());
    let recorder = Recorder::new();
    let _sub = todos
        .subscribe_changes(recorder.callback(), SubscribeOptions::default())
        .unwrap();

    sync.resync(&[]);
    assert!(recorder.batches().is_empty());
    assert_eq!(todos.size(), 0);
}

#[tokio::test]
async fn test_truncate_resets_loaded_subsets() {
    use ripple_collection::{LoadSubsetFn, LoadSubsetResult};
    use ripple_query::ir::LoadSubsetOptions;
    use std::cell::Cell;

    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let load: LoadSubsetFn = Rc::new(move |_: &LoadSubsetOptions| {
        counter.set(counter.get() + 1);
        LoadSubsetResult::Ready
    });
    let sync = TestSync::new().with_load_subset(load);
    let todos = Collection::new(builder(&sync).build());

    assert!(todos.load_subset(&LoadSubsetOptions::all()).unwrap().is_ready());
    todos.load_subset(&LoadSubsetOptions::all()).unwrap();
    assert_eq!(calls.get(), 1);

    sync.resync(&[]);
    todos.load_subset(&LoadSubsetOptions::all()).unwrap();
    assert_eq!(calls.get(), 2);
}
