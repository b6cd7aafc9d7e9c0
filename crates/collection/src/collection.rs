//! The collection handle.
//!
//! A `Collection` owns one [`CollectionState`] together with the
//! subscriptions, lifecycle, indexes and confirmation waiters built on top
//! of it. Every operation follows the same shape: borrow the core, apply
//! the change, compute per-subscription notifications, release the borrow,
//! then run subscriber callbacks. Callbacks may therefore read the
//! collection or start new mutations.
//!
//! Persistence handlers and garbage collection run on the current
//! `tokio::task::LocalSet`.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::future::LocalBoxFuture;
use ripple_core::{Key, Value};
use ripple_query::ir::{BasicExpression, Direction, LoadSubsetOptions, Nulls, OrderByClause};
use ripple_query::{compile_where, evaluate, RowScope};
use ripple_reactive::{
    deliver_all, ChangeMessage, ChangeSet, Notification, SubscribeOptions, SubscriptionId,
    SubscriptionManager,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{AutoIndex, CollectionConfig};
use crate::confirm::{self, MatchFn, Waiters};
use crate::dedupe::{DeduplicatedLoadSubset, LoadSubsetResult};
use crate::error::{Error, HandlerKind, Result};
use crate::index::AutoIndexes;
use crate::lifecycle::{CollectionStatus, Lifecycle};
use crate::mutation::PendingMutation;
use crate::state::CollectionState;
use crate::sync::{SyncHandle, SyncMessage, SyncParams};
use crate::transaction::{MutationFn, Transaction, TransactionConfig, TransactionId};

/// Options for [`Collection::current_state_as_changes`].
#[derive(Clone, Debug, Default)]
pub struct CurrentStateOptions {
    pub where_: Option<BasicExpression>,
    pub order_by: Option<Vec<OrderByClause>>,
    pub limit: Option<usize>,
}

struct Core {
    state: CollectionState,
    subscriptions: SubscriptionManager,
    lifecycle: Lifecycle,
    indexes: AutoIndexes,
    transactions: BTreeMap<TransactionId, Transaction>,
    gc_task: Option<JoinHandle<()>>,
    sync_cleanup: Option<Box<dyn FnOnce()>>,
    sync_started: bool,
}

impl Core {
    /// Updates indexes and builds the notifications for `changes`.
    fn emit(&mut self, changes: &ChangeSet) -> Vec<Notification> {
        if changes.is_empty() {
            return Vec::new();
        }
        tracing::trace!(changes = changes.len(), "visible state changed");
        self.indexes.apply(changes.as_slice());
        self.subscriptions.dispatch(changes.as_slice())
    }
}

pub(crate) struct Inner {
    id: String,
    config: CollectionConfig,
    core: RefCell<Core>,
    waiters: Rc<RefCell<Waiters>>,
    loader: RefCell<Option<Rc<DeduplicatedLoadSubset>>>,
    status_tx: watch::Sender<CollectionStatus>,
}

impl Inner {
    fn set_status(&self, core: &mut Core, to: CollectionStatus) -> Result<()> {
        core.lifecycle.transition(to)?;
        self.status_tx.send_replace(to);
        Ok(())
    }

    fn key_of(&self, value: &Value) -> Result<Key> {
        (self.config.get_key)(value).ok_or_else(|| Error::UndefinedKey {
            collection: self.id.clone(),
        })
    }

    fn loader(&self) -> Option<Rc<DeduplicatedLoadSubset>> {
        self.loader.borrow().clone()
    }

    pub(crate) fn sync_begin(&self) {
        self.core.borrow_mut().state.begin();
    }

    pub(crate) fn sync_write(&self, message: SyncMessage) -> Result<()> {
        let key = self.key_of(&message.value)?;
        self.core.borrow_mut().state.write(key, message)
    }

    pub(crate) fn sync_truncate(&self) -> Result<()> {
        tracing::debug!(collection = %self.id, "sync truncate");
        self.core.borrow_mut().state.truncate()
    }

    pub(crate) fn sync_commit(&self) -> Result<()> {
        let _span = tracing::debug_span!("collection", id = %self.id).entered();
        let (notifications, batches, truncated) = {
            let mut core = self.core.borrow_mut();
            let mode = self
                .config
                .sync
                .row_update_mode
                .unwrap_or(self.config.row_update_mode);
            let outcome = core.state.commit(mode)?;
            tracing::debug!(
                batches = outcome.batches.len(),
                changes = outcome.changes.len(),
                truncated = outcome.truncated,
                "sync commit"
            );
            let notifications = core.emit(&outcome.changes);
            (notifications, outcome.batches, outcome.truncated)
        };
        // Match predicates may read the collection.
        confirm::on_commit(&self.waiters, &batches);
        if truncated {
            if let Some(loader) = self.loader() {
                loader.reset();
            }
        }
        deliver_all(notifications);
        Ok(())
    }

    pub(crate) fn sync_mark_ready(&self) {
        let mut core = self.core.borrow_mut();
        if core.lifecycle.status() == CollectionStatus::Loading {
            if let Err(err) = self.set_status(&mut core, CollectionStatus::Ready) {
                tracing::warn!(collection = %self.id, error = %err, "mark_ready failed");
            }
        }
    }

    pub(crate) fn transaction_settled(&self, tx_id: TransactionId) {
        let _span = tracing::debug_span!("collection", id = %self.id).entered();
        let notifications = {
            let mut core = self.core.borrow_mut();
            core.transactions.remove(&tx_id);
            let changes = core.state.settle_transaction(tx_id);
            core.emit(&changes)
        };
        deliver_all(notifications);
    }

    pub(crate) fn transaction_failed(&self, tx_id: TransactionId) {
        let _span = tracing::debug_span!("collection", id = %self.id).entered();
        let notifications = {
            let mut core = self.core.borrow_mut();
            core.transactions.remove(&tx_id);
            let changes = core.state.fail_transaction(tx_id);
            tracing::debug!(tx = tx_id, rolled_back = changes.len(), "transaction rolled back");
            core.emit(&changes)
        };
        deliver_all(notifications);
    }

    fn schedule_gc(self: &Rc<Self>, core: &mut Core) {
        let gc_time = self.config.gc_time;
        if gc_time.is_zero() {
            return;
        }
        if let Some(task) = core.gc_task.take() {
            task.abort();
        }
        tracing::debug!(collection = %self.id, ?gc_time, "gc scheduled");
        let weak = Rc::downgrade(self);
        core.gc_task = Some(tokio::task::spawn_local(async move {
            tokio::time::sleep(gc_time).await;
            if let Some(inner) = weak.upgrade() {
                Collection::from_inner(inner).collect_garbage();
            }
        }));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        if let Some(task) = core.gc_task.take() {
            task.abort();
        }
        if let Some(cleanup) = core.sync_cleanup.take() {
            cleanup();
        }
    }
}

/// A reactive keyed collection. Clones share the collection.
#[derive(Clone)]
pub struct Collection {
    inner: Rc<Inner>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .field("size", &self.size())
            .finish()
    }
}

impl Collection {
    /// Creates a collection, starting sync at once when configured to.
    pub fn new(config: CollectionConfig) -> Self {
        let id = config.id.clone();
        let (status_tx, _) = watch::channel(CollectionStatus::Idle);
        let start_sync = config.start_sync;
        let inner = Rc::new(Inner {
            id: id.clone(),
            core: RefCell::new(Core {
                state: CollectionState::new(),
                subscriptions: SubscriptionManager::new(),
                lifecycle: Lifecycle::new(id),
                indexes: AutoIndexes::new(),
                transactions: BTreeMap::new(),
                gc_task: None,
                sync_cleanup: None,
                sync_started: false,
            }),
            config,
            waiters: Rc::new(RefCell::new(Waiters::new())),
            loader: RefCell::new(None),
            status_tx,
        });
        let collection = Collection { inner };
        if start_sync {
            if let Err(err) = collection.start_sync() {
                tracing::warn!(collection = %collection.id(), error = %err, "eager sync start failed");
            }
        }
        collection
    }

    pub(crate) fn from_inner(inner: Rc<Inner>) -> Self {
        Collection { inner }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.inner.config
    }

    pub fn status(&self) -> CollectionStatus {
        self.inner.core.borrow().lifecycle.status()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == CollectionStatus::Ready
    }

    /// A receiver that observes every status change.
    pub fn status_changes(&self) -> watch::Receiver<CollectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Moves the collection to the `Error` status.
    pub fn mark_error(&self) -> Result<()> {
        let mut core = self.inner.core.borrow_mut();
        self.inner.set_status(&mut core, CollectionStatus::Error)
    }

    /// Starts the sync source unless it is already running.
    pub fn start_sync(&self) -> Result<()> {
        {
            let mut core = self.inner.core.borrow_mut();
            if core.sync_started {
                return Ok(());
            }
            self.inner.set_status(&mut core, CollectionStatus::Loading)?;
            core.sync_started = true;
        }
        tracing::debug!(collection = %self.inner.id, "sync started");

        let params = SyncParams {
            collection_id: self.inner.id.clone(),
            handle: SyncHandle::new(Rc::downgrade(&self.inner)),
        };
        let result = (self.inner.config.sync.sync)(params);
        self.inner.core.borrow_mut().sync_cleanup = result.cleanup;
        *self.inner.loader.borrow_mut() = result
            .load_subset
            .map(|load| Rc::new(DeduplicatedLoadSubset::new(load)));
        Ok(())
    }

    /// Starts sync and waits until the collection is ready.
    pub async fn preload(&self) -> Result<()> {
        self.start_sync()?;
        let mut rx = self.inner.status_tx.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            match status {
                CollectionStatus::Ready => return Ok(()),
                CollectionStatus::Error | CollectionStatus::CleanedUp => {
                    return Err(Error::CollectionInErrorState {
                        collection: self.inner.id.clone(),
                        status,
                    })
                }
                CollectionStatus::Idle | CollectionStatus::Loading => {}
            }
            if rx.changed().await.is_err() {
                return Err(Error::Cancelled);
            }
        }
    }

    /// The visible rows once the collection is ready.
    pub async fn state_when_ready(&self) -> Result<BTreeMap<Key, Value>> {
        self.preload().await?;
        Ok(self.entries().into_iter().collect())
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.inner.core.borrow().state.get(&key.into()).cloned()
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.inner.core.borrow().state.has(&key.into())
    }

    pub fn size(&self) -> usize {
        self.inner.core.borrow().state.len()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.inner.core.borrow().state.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.inner.core.borrow().state.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Visible rows in key order.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.inner
            .core
            .borrow()
            .state
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Visible rows ordered by the configured `compare`, else by key.
    pub fn to_array(&self) -> Vec<Value> {
        let mut values = self.values();
        if let Some(compare) = &self.inner.config.compare {
            values.sort_by(|a, b| compare(a, b));
        }
        values
    }

    /// Metadata of the last synced write to `key`.
    pub fn synced_metadata(&self, key: impl Into<Key>) -> Option<Value> {
        self.inner
            .core
            .borrow()
            .state
            .synced_metadata(&key.into())
            .cloned()
    }

    /// Transactions with optimistic changes in this collection that have
    /// not finished yet.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner.core.borrow().transactions.values().cloned().collect()
    }

    /// The rows matching `options` as a batch of inserts.
    pub fn current_state_as_changes(
        &self,
        options: &CurrentStateOptions,
    ) -> Result<Vec<ChangeMessage>> {
        let order_by = options.order_by.as_deref().unwrap_or(&[]);
        if options.limit.is_some() && order_by.is_empty() {
            return Err(Error::LimitWithoutOrderBy);
        }
        let filter = options.where_.clone().map(compile_where).transpose()?;

        let core = self.inner.core.borrow();
        let candidates = options
            .where_
            .as_ref()
            .and_then(|w| core.indexes.candidates(w));
        let mut rows: Vec<(&Key, &Value)> = match &candidates {
            Some(keys) => keys
                .iter()
                .filter_map(|k| core.state.get(k).map(|v| (k, v)))
                .collect(),
            None => core.state.iter().collect(),
        };
        if let Some(filter) = &filter {
            rows.retain(|(_, v)| filter.matches(v));
        }
        if !order_by.is_empty() {
            rows.sort_by(|(_, a), (_, b)| compare_rows(order_by, a, b));
        }
        if let Some(limit) = options.limit {
            rows.truncate(limit);
        }
        Ok(rows
            .into_iter()
            .map(|(k, v)| ChangeMessage::insert(k.clone(), v.clone()))
            .collect())
    }

    /// Subscribes `callback` to visible changes.
    ///
    /// Starts sync if needed and cancels a pending garbage collection. With
    /// `include_initial_state`, the matching rows are delivered as one
    /// insert batch before this returns.
    pub fn subscribe_changes<F>(
        &self,
        callback: F,
        options: SubscribeOptions,
    ) -> Result<CollectionSubscription>
    where
        F: Fn(&[ChangeMessage]) + 'static,
    {
        if let Some(task) = self.inner.core.borrow_mut().gc_task.take() {
            task.abort();
        }
        // Initial-state subscribers get rows loaded during sync start in
        // their first batch; the others see those rows as changes.
        if options.include_initial_state {
            self.start_sync()?;
        }

        let (id, initial) = {
            let mut core = self.inner.core.borrow_mut();
            let Core {
                state,
                subscriptions,
                indexes,
                ..
            } = &mut *core;
            let id = subscriptions.subscribe(Rc::new(callback), &options)?;
            if let Some(where_) = &options.where_expression {
                if self.inner.config.auto_index == AutoIndex::Eager {
                    indexes.ensure(where_, state.iter());
                }
            }
            let initial = if options.include_initial_state {
                let candidates = options
                    .where_expression
                    .as_ref()
                    .and_then(|w| indexes.candidates(w));
                match candidates {
                    Some(keys) => subscriptions.initial_state(
                        id,
                        keys.iter().filter_map(|k| state.get(k).map(|v| (k, v))),
                    ),
                    None => subscriptions.initial_state(id, state.iter()),
                }
            } else {
                None
            };
            (id, initial)
        };
        tracing::debug!(collection = %self.inner.id, subscription = id, "subscribed");

        if !options.include_initial_state {
            if let Err(err) = self.start_sync() {
                self.unsubscribe(id);
                return Err(err);
            }
        }
        if let Some(notification) = initial {
            notification.deliver();
        }
        Ok(CollectionSubscription {
            id,
            inner: Rc::downgrade(&self.inner),
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut core = self.inner.core.borrow_mut();
        if core.subscriptions.unsubscribe(id) {
            tracing::debug!(collection = %self.inner.id, subscription = id, "unsubscribed");
            if core.subscriptions.is_empty() {
                self.inner.schedule_gc(&mut core);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.core.borrow().subscriptions.len()
    }

    fn collect_garbage(&self) {
        let idle = {
            let mut core = self.inner.core.borrow_mut();
            core.gc_task = None;
            core.subscriptions.is_empty()
        };
        if idle {
            tracing::debug!(collection = %self.inner.id, "gc collecting idle collection");
            if let Err(err) = self.cleanup() {
                tracing::warn!(collection = %self.inner.id, error = %err, "gc cleanup failed");
            }
        }
    }

    /// Clears all state, cancels outstanding confirmation waits and calls
    /// the sync cleanup hook. The next subscriber restarts sync.
    pub fn cleanup(&self) -> Result<()> {
        let hook = {
            let mut core = self.inner.core.borrow_mut();
            if let Some(task) = core.gc_task.take() {
                task.abort();
            }
            self.inner.set_status(&mut core, CollectionStatus::CleanedUp)?;
            core.state.clear();
            core.indexes.clear_entries();
            core.subscriptions.reset_sent();
            core.transactions.clear();
            core.sync_started = false;
            core.sync_cleanup.take()
        };
        self.inner.waiters.borrow_mut().cancel_all();
        if let Some(loader) = self.inner.loader.borrow_mut().take() {
            loader.reset();
        }
        tracing::debug!(collection = %self.inner.id, "cleaned up");
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }

    /// Loads a subset through the sync source's loader, skipping what was
    /// already loaded. Ready at once when the source has no loader.
    pub fn load_subset(&self, options: &LoadSubsetOptions) -> Result<LoadSubsetResult> {
        self.start_sync()?;
        Ok(match self.inner.loader() {
            Some(loader) => loader.load_subset(options),
            None => LoadSubsetResult::Ready,
        })
    }

    /// Waits until a committed sync batch carries `txid`.
    pub fn await_txid(
        &self,
        txid: &Value,
        timeout: Option<Duration>,
    ) -> Result<LocalBoxFuture<'static, Result<()>>> {
        confirm::await_txid(&self.inner.waiters, txid, timeout)
    }

    /// Waits until a sync message satisfies `predicate`.
    pub fn await_match(
        &self,
        predicate: MatchFn,
        timeout: Option<Duration>,
    ) -> LocalBoxFuture<'static, Result<()>> {
        let core = self.inner.core.borrow();
        confirm::await_match(
            &self.inner.waiters,
            predicate,
            timeout,
            core.state.pending_messages(),
        )
    }

    /// Number of outstanding confirmation waits.
    pub fn pending_waits(&self) -> usize {
        self.inner.waiters.borrow().len()
    }

    fn handler(&self, kind: HandlerKind) -> Result<MutationFn> {
        let config = &self.inner.config;
        let handler = match kind {
            HandlerKind::Insert => &config.on_insert,
            HandlerKind::Update => &config.on_update,
            HandlerKind::Delete => &config.on_delete,
        };
        handler.clone().ok_or_else(|| Error::MissingHandler {
            collection: self.inner.id.clone(),
            kind,
        })
    }

    // A cleaned-up collection restarts sync when it is used again.
    fn check_mutable(&self) -> Result<()> {
        if self.status() == CollectionStatus::CleanedUp {
            self.start_sync()?;
        }
        self.inner.core.borrow().lifecycle.check_mutable()
    }

    // Mutations outside `Transaction::mutate` get their own transaction
    // bound to the collection's handler.
    fn in_transaction<F>(&self, kind: HandlerKind, f: F) -> Result<Transaction>
    where
        F: FnOnce(&Transaction) -> Result<()>,
    {
        if let Some(tx) = Transaction::ambient() {
            f(&tx)?;
            return Ok(tx);
        }
        let handler = self.handler(kind)?;
        self.check_mutable()?;
        let tx = Transaction::new(TransactionConfig::new(handler));
        tx.mutate(f)?;
        Ok(tx)
    }

    /// Inserts `value` optimistically.
    pub fn insert(&self, value: Value) -> Result<Transaction> {
        self.in_transaction(HandlerKind::Insert, |tx| self.insert_in(tx, value))
    }

    /// Applies `f` to a copy of the row at `key` and records the result.
    pub fn update<F>(&self, key: impl Into<Key>, f: F) -> Result<Transaction>
    where
        F: FnOnce(&mut Value),
    {
        let key = key.into();
        self.in_transaction(HandlerKind::Update, |tx| self.update_in(tx, key, f))
    }

    pub fn delete(&self, key: impl Into<Key>) -> Result<Transaction> {
        let key = key.into();
        self.in_transaction(HandlerKind::Delete, |tx| self.delete_in(tx, key))
    }

    pub fn insert_in(&self, tx: &Transaction, value: Value) -> Result<()> {
        tx.check_pending()?;
        self.check_mutable()?;
        let key = self.inner.key_of(&value)?;
        self.record(tx, |state| {
            if state.has(&key) {
                return Err(Error::duplicate_key(&self.inner.id, key.clone()));
            }
            Ok(Some(PendingMutation::insert(&self.inner.id, key.clone(), value)))
        })
    }

    pub fn update_in<F>(&self, tx: &Transaction, key: impl Into<Key>, f: F) -> Result<()>
    where
        F: FnOnce(&mut Value),
    {
        tx.check_pending()?;
        self.check_mutable()?;
        let key = key.into();
        let original = self
            .inner
            .core
            .borrow()
            .state
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::key_not_found(&self.inner.id, key.clone()))?;
        let mut draft = original.clone();
        f(&mut draft);
        if draft == original {
            return Ok(());
        }
        if self.inner.key_of(&draft)? != key {
            return Err(Error::KeyUpdateNotAllowed {
                collection: self.inner.id.clone(),
                key,
            });
        }
        self.record(tx, |state| {
            if !state.has(&key) {
                return Err(Error::key_not_found(&self.inner.id, key.clone()));
            }
            Ok(Some(PendingMutation::update(
                &self.inner.id,
                key.clone(),
                original,
                draft,
            )))
        })
    }

    pub fn delete_in(&self, tx: &Transaction, key: impl Into<Key>) -> Result<()> {
        tx.check_pending()?;
        self.check_mutable()?;
        let key = key.into();
        self.record(tx, |state| {
            let original = state
                .get(&key)
                .cloned()
                .ok_or_else(|| Error::key_not_found(&self.inner.id, key.clone()))?;
            Ok(Some(PendingMutation::delete(&self.inner.id, key.clone(), original)))
        })
    }

    /// Validates and records one mutation, applies it to the overlay and
    /// notifies subscribers.
    fn record<F>(&self, tx: &Transaction, build: F) -> Result<()>
    where
        F: FnOnce(&CollectionState) -> Result<Option<PendingMutation>>,
    {
        let notifications = {
            let mut core = self.inner.core.borrow_mut();
            core.lifecycle.check_mutable()?;
            let Some(mutation) = build(&core.state)? else {
                return Ok(());
            };
            let key = mutation.key.clone();
            let merged = tx.add_mutation(&self.inner, mutation)?;
            let tx_id = tx.id();
            let changes = match merged {
                Some(m) => core.state.set_optimistic(tx_id, key, m.visible_value().cloned()),
                None => core.state.clear_optimistic(tx_id, &key),
            };
            core.transactions.insert(tx_id, tx.clone());
            core.emit(&changes)
        };
        deliver_all(notifications);
        Ok(())
    }
}

/// Handle returned by [`Collection::subscribe_changes`].
#[derive(Debug)]
pub struct CollectionSubscription {
    id: SubscriptionId,
    inner: Weak<Inner>,
}

impl CollectionSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stops notifications. When this was the last subscriber, garbage
    /// collection is scheduled.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            Collection::from_inner(inner).unsubscribe(self.id);
        }
    }
}

fn compare_rows(order_by: &[OrderByClause], a: &Value, b: &Value) -> Ordering {
    for clause in order_by {
        let x = evaluate(&clause.expression, RowScope::Single(a));
        let y = evaluate(&clause.expression, RowScope::Single(b));
        let nulls_first = clause.compare_options.nulls == Nulls::First;
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match clause.compare_options.direction {
                Direction::Asc => x.cmp(&y),
                Direction::Desc => y.cmp(&x),
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
