//! Optimistic transactions.
//!
//! A transaction collects mutations across one or more collections. Each
//! mutation is applied to the collection's optimistic overlay the moment
//! it is recorded. `commit` hands the mutations to the persistence handler
//! on the local task set; the transaction then completes or fails, and the
//! collections settle or roll back its overlay entries accordingly.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::{try_join_all, LocalBoxFuture};
use futures::FutureExt;
use ripple_core::Value;
use tokio::sync::watch;
use tracing::Instrument;

use crate::collection::{Collection, Inner};
use crate::confirm::MatchFn;
use crate::error::{Error, HandlerError, Result};
use crate::mutation::{merge_pending, PendingMutation};

/// Global transaction ID counter.
static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction ID type.
pub type TransactionId = u64;

thread_local! {
    static AMBIENT: RefCell<Vec<Transaction>> = const { RefCell::new(Vec::new()) };
}

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Accepting mutations.
    Pending,
    /// Handed to the persistence handler.
    Persisting,
    /// Persisted and confirmed.
    Completed,
    /// Handler failure, confirmation timeout or rollback.
    Failed,
}

impl TransactionState {
    pub fn is_active(self) -> bool {
        matches!(self, TransactionState::Pending | TransactionState::Persisting)
    }
}

/// How a persistence handler asks to wait for its writes to come back
/// through sync.
#[derive(Clone, Default)]
pub enum Confirmation {
    /// Done as soon as the handler returns.
    #[default]
    None,
    /// Wait until sync reports every one of these txids.
    TxIds(Vec<Value>),
    /// Wait until a committed sync message satisfies `predicate`.
    Match {
        predicate: MatchFn,
        timeout: Option<Duration>,
    },
}

impl fmt::Debug for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confirmation::None => f.write_str("None"),
            Confirmation::TxIds(ids) => f.debug_tuple("TxIds").field(ids).finish(),
            Confirmation::Match { timeout, .. } => {
                f.debug_struct("Match").field("timeout", timeout).finish_non_exhaustive()
            }
        }
    }
}

/// Passed to a persistence handler.
pub struct MutationParams {
    pub transaction: Transaction,
    /// The first collection the transaction touched.
    pub collection: Option<Collection>,
}

/// An async persistence handler.
pub type MutationFn = Rc<
    dyn Fn(MutationParams) -> LocalBoxFuture<'static, std::result::Result<Confirmation, HandlerError>>,
>;

/// Builds a [`MutationFn`] from an async closure.
pub fn mutation_fn<F, Fut>(f: F) -> MutationFn
where
    F: Fn(MutationParams) -> Fut + 'static,
    Fut: std::future::Future<Output = std::result::Result<Confirmation, HandlerError>> + 'static,
{
    Rc::new(move |params| f(params).boxed_local())
}

pub struct TransactionConfig {
    pub mutation_fn: MutationFn,
    /// Commit at the end of [`Transaction::mutate`].
    pub auto_commit: bool,
    pub metadata: Option<Value>,
}

impl TransactionConfig {
    pub fn new(mutation_fn: MutationFn) -> Self {
        Self {
            mutation_fn,
            auto_commit: true,
            metadata: None,
        }
    }

    pub fn manual_commit(mut self) -> Self {
        self.auto_commit = false;
        self
    }
}

struct TxInner {
    id: TransactionId,
    state: TransactionState,
    mutations: Vec<PendingMutation>,
    collections: Vec<Weak<Inner>>,
    mutation_fn: MutationFn,
    auto_commit: bool,
    metadata: Option<Value>,
    error: Option<Error>,
    state_tx: watch::Sender<TransactionState>,
}

/// A handle to an optimistic transaction. Clones share the transaction.
#[derive(Clone)]
pub struct Transaction {
    inner: Rc<RefCell<TxInner>>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Transaction")
            .field("id", &inner.id)
            .field("state", &inner.state)
            .field("mutations", &inner.mutations.len())
            .finish()
    }
}

impl Transaction {
    /// Creates a new pending transaction.
    pub fn new(config: TransactionConfig) -> Self {
        let (state_tx, _) = watch::channel(TransactionState::Pending);
        Self {
            inner: Rc::new(RefCell::new(TxInner {
                id: NEXT_TX_ID.fetch_add(1, Ordering::SeqCst),
                state: TransactionState::Pending,
                mutations: Vec::new(),
                collections: Vec::new(),
                mutation_fn: config.mutation_fn,
                auto_commit: config.auto_commit,
                metadata: config.metadata,
                error: None,
                state_tx,
            })),
        }
    }

    /// The transaction a surrounding [`Transaction::mutate`] call is running.
    pub fn ambient() -> Option<Transaction> {
        AMBIENT.with(|stack| stack.borrow().last().cloned())
    }

    pub fn id(&self) -> TransactionId {
        self.inner.borrow().id
    }

    pub fn state(&self) -> TransactionState {
        self.inner.borrow().state
    }

    pub fn metadata(&self) -> Option<Value> {
        self.inner.borrow().metadata.clone()
    }

    /// Mutations recorded so far, after same-key merging.
    pub fn mutations(&self) -> Vec<PendingMutation> {
        self.inner.borrow().mutations.clone()
    }

    /// The error that failed the transaction.
    pub fn error(&self) -> Option<Error> {
        self.inner.borrow().error.clone()
    }

    #[cfg(test)]
    pub(crate) fn ptr_eq(&self, other: &Transaction) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn check_pending(&self) -> Result<()> {
        let inner = self.inner.borrow();
        if inner.state != TransactionState::Pending {
            return Err(Error::TransactionNotPending {
                id: inner.id,
                state: inner.state,
            });
        }
        Ok(())
    }

    /// Runs `f` with this transaction as the ambient one, then commits if
    /// the transaction auto-commits.
    pub fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Transaction) -> Result<()>,
    {
        self.check_pending()?;
        AMBIENT.with(|stack| stack.borrow_mut().push(self.clone()));
        let result = f(self);
        AMBIENT.with(|stack| {
            stack.borrow_mut().pop();
        });
        result?;
        if self.inner.borrow().auto_commit {
            self.commit()?;
        }
        Ok(())
    }

    /// Records `mutation`, merging it with an earlier one for the same key.
    ///
    /// Returns the merged mutation for the key, or `None` when the two
    /// cancelled out.
    pub(crate) fn add_mutation(
        &self,
        collection: &Rc<Inner>,
        mutation: PendingMutation,
    ) -> Result<Option<PendingMutation>> {
        self.check_pending()?;
        let mut inner = self.inner.borrow_mut();
        let weak = Rc::downgrade(collection);
        if !inner.collections.iter().any(|c| c.ptr_eq(&weak)) {
            inner.collections.push(weak);
        }

        let existing = inner
            .mutations
            .iter()
            .position(|m| m.targets(&mutation.collection, &mutation.key));
        let merged = match existing {
            Some(pos) => {
                let prior = inner.mutations.remove(pos);
                let merged = merge_pending(prior, mutation);
                if let Some(m) = &merged {
                    inner.mutations.insert(pos, m.clone());
                }
                merged
            }
            None => {
                inner.mutations.push(mutation.clone());
                Some(mutation)
            }
        };
        Ok(merged)
    }

    /// Hands the transaction to its persistence handler.
    ///
    /// A transaction without mutations completes at once. Otherwise the
    /// handler runs on the current `LocalSet`.
    pub fn commit(&self) -> Result<()> {
        self.check_pending()?;
        if self.inner.borrow().mutations.is_empty() {
            self.set_state(TransactionState::Completed);
            return Ok(());
        }
        self.set_state(TransactionState::Persisting);
        let tx = self.clone();
        tokio::task::spawn_local(async move { tx.persist().await });
        Ok(())
    }

    /// Fails the transaction and removes its optimistic changes.
    pub fn rollback(&self) -> Result<()> {
        let (id, state) = {
            let inner = self.inner.borrow();
            (inner.id, inner.state)
        };
        if !state.is_active() {
            return Err(Error::TransactionNotPending { id, state });
        }
        self.fail(Error::RolledBack { id });
        Ok(())
    }

    /// Resolves once the transaction completes, or with its error once it
    /// fails.
    pub async fn is_persisted(&self) -> Result<()> {
        let mut rx = self.inner.borrow().state_tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                TransactionState::Completed => return Ok(()),
                TransactionState::Failed => {
                    let id = self.id();
                    return Err(self.error().unwrap_or(Error::RolledBack { id }));
                }
                TransactionState::Pending | TransactionState::Persisting => {}
            }
            if rx.changed().await.is_err() {
                return Err(Error::Cancelled);
            }
        }
    }

    fn set_state(&self, state: TransactionState) {
        let mut inner = self.inner.borrow_mut();
        tracing::debug!(tx = inner.id, from = ?inner.state, to = ?state, "transaction state");
        inner.state = state;
        inner.state_tx.send_replace(state);
    }

    fn collections(&self) -> Vec<Rc<Inner>> {
        self.inner
            .borrow()
            .collections
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    async fn persist(self) {
        let (id, mutation_fn) = {
            let inner = self.inner.borrow();
            (inner.id, inner.mutation_fn.clone())
        };
        let primary = self.collections().into_iter().next().map(Collection::from_inner);
        let span = tracing::debug_span!("persist", tx = id);

        let outcome = async {
            let params = MutationParams {
                transaction: self.clone(),
                collection: primary.clone(),
            };
            let confirmation = mutation_fn(params).await.map_err(Error::handler)?;
            match primary {
                Some(collection) => await_confirmation(&collection, confirmation).await,
                None => Ok(()),
            }
        }
        .instrument(span)
        .await;

        match outcome {
            Ok(()) => self.complete(),
            Err(err) => {
                tracing::warn!(tx = id, error = %err, "transaction failed");
                self.fail(err);
            }
        }
    }

    fn complete(&self) {
        if !self.state().is_active() {
            return;
        }
        self.set_state(TransactionState::Completed);
        let id = self.id();
        for collection in self.collections() {
            Inner::transaction_settled(&collection, id);
        }
    }

    fn fail(&self, err: Error) {
        if !self.state().is_active() {
            return;
        }
        self.inner.borrow_mut().error = Some(err);
        self.set_state(TransactionState::Failed);
        let id = self.id();
        for collection in self.collections() {
            Inner::transaction_failed(&collection, id);
        }
    }
}

async fn await_confirmation(collection: &Collection, confirmation: Confirmation) -> Result<()> {
    match confirmation {
        Confirmation::None => Ok(()),
        Confirmation::TxIds(txids) => {
            // Every txid is validated before any wait starts.
            let waits = txids
                .iter()
                .map(|txid| collection.await_txid(txid, None))
                .collect::<Result<Vec<_>>>()?;
            try_join_all(waits).await.map(|_| ())
        }
        Confirmation::Match { predicate, timeout } => {
            collection.await_match(predicate, timeout).await
        }
    }
}
