//! Waiting for sync to confirm a write.
//!
//! Waiters live in a table keyed by waiter id. A waiter leaves the table
//! when it resolves, times out, is cancelled by cleanup, or when its future
//! is dropped.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use hashbrown::{HashMap, HashSet};
use ripple_core::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::sync::{PendingSyncBatch, SyncMessage};

pub const DEFAULT_TXID_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MATCH_TIMEOUT: Duration = Duration::from_millis(3_000);

/// How many confirmed txids a collection remembers.
pub const SEEN_TXID_CAPACITY: usize = 1_024;

/// Decides whether a synced message confirms a write.
pub type MatchFn = Rc<dyn Fn(&SyncMessage) -> bool>;

type Reply = oneshot::Sender<Result<()>>;

enum Waiter {
    TxId(i64, Reply),
    Match(MatchFn, Reply),
}

/// The most recent confirmed txids, oldest evicted first.
#[derive(Default)]
struct SeenTxids {
    order: VecDeque<i64>,
    set: HashSet<i64>,
}

impl SeenTxids {
    fn insert(&mut self, txid: i64) {
        if !self.set.insert(txid) {
            return;
        }
        self.order.push_back(txid);
        if self.order.len() > SEEN_TXID_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
    }

    fn contains(&self, txid: &i64) -> bool {
        self.set.contains(txid)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.set.clear();
    }
}

/// Outstanding confirmation waits of one collection.
#[derive(Default)]
pub struct Waiters {
    next_id: u64,
    waiters: HashMap<u64, Waiter>,
    seen_txids: SeenTxids,
    last_committed: Vec<SyncMessage>,
}

impl Waiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding waits.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    pub fn has_seen(&self, txid: i64) -> bool {
        self.seen_txids.contains(&txid)
    }

    fn register(&mut self, waiter: Waiter) -> u64 {
        self.next_id += 1;
        self.waiters.insert(self.next_id, waiter);
        self.next_id
    }

    /// Rejects every outstanding wait with [`Error::Cancelled`] and forgets
    /// every confirmation seen so far.
    pub fn cancel_all(&mut self) {
        for (_, waiter) in self.waiters.drain() {
            let (Waiter::TxId(_, reply) | Waiter::Match(_, reply)) = waiter;
            let _ = reply.send(Err(Error::Cancelled));
        }
        self.seen_txids.clear();
        self.last_committed.clear();
    }
}

/// Resolves every wait satisfied by the batches of one sync commit.
///
/// Match predicates run while the table is not borrowed, so they may read
/// the collection or its waits.
pub fn on_commit(table: &Rc<RefCell<Waiters>>, batches: &[PendingSyncBatch]) {
    let messages: Vec<SyncMessage> = batches
        .iter()
        .flat_map(|b| b.operations.iter().map(|op| op.message.clone()))
        .collect();

    let predicates: Vec<(u64, MatchFn)> = {
        let mut waiters = table.borrow_mut();
        for txid in batches.iter().flat_map(PendingSyncBatch::txids) {
            if let Ok(id) = parse_txid(txid) {
                waiters.seen_txids.insert(id);
            }
        }
        waiters
            .waiters
            .iter()
            .filter_map(|(id, waiter)| match waiter {
                Waiter::Match(predicate, _) => Some((*id, Rc::clone(predicate))),
                Waiter::TxId(..) => None,
            })
            .collect()
    };
    let mut ready: Vec<u64> = predicates
        .into_iter()
        .filter(|(_, predicate)| messages.iter().any(|m| predicate(m)))
        .map(|(id, _)| id)
        .collect();

    let mut waiters = table.borrow_mut();
    let table = &mut *waiters;
    ready.extend(table.waiters.iter().filter_map(|(id, waiter)| match waiter {
        Waiter::TxId(txid, _) if table.seen_txids.contains(txid) => Some(*id),
        _ => None,
    }));
    for id in ready {
        if let Some(Waiter::TxId(_, reply) | Waiter::Match(_, reply)) = table.waiters.remove(&id) {
            let _ = reply.send(Ok(()));
        }
    }
    table.last_committed = messages;
}

/// Removes a waiter from its table when the waiting future goes away.
struct WaiterGuard {
    table: Weak<RefCell<Waiters>>,
    id: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            if let Ok(mut waiters) = table.try_borrow_mut() {
                waiters.waiters.remove(&self.id);
            }
        }
    }
}

/// Txids must be integers. Integral floats are accepted.
pub fn parse_txid(txid: &Value) -> Result<i64> {
    match txid {
        Value::Int64(i) => Ok(*i),
        Value::Float64(f) if f.is_finite() && f.fract() == 0.0 => Ok(*f as i64),
        other => Err(Error::ExpectedNumberTxId(other.clone())),
    }
}

/// Waits until a committed sync batch carries `txid`.
///
/// The txid is validated before this returns; an already-seen txid yields
/// a future that is immediately ready.
pub fn await_txid(
    table: &Rc<RefCell<Waiters>>,
    txid: &Value,
    timeout: Option<Duration>,
) -> Result<LocalBoxFuture<'static, Result<()>>> {
    let id = parse_txid(txid)?;
    if table.borrow().has_seen(id) {
        return Ok(future::ready(Ok(())).boxed_local());
    }

    let (reply, rx) = oneshot::channel();
    let waiter_id = table.borrow_mut().register(Waiter::TxId(id, reply));
    let guard = WaiterGuard {
        table: Rc::downgrade(table),
        id: waiter_id,
    };
    let timeout = timeout.unwrap_or(DEFAULT_TXID_TIMEOUT);

    Ok(async move {
        let _guard = guard;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Cancelled),
            Err(_) => {
                tracing::warn!(txid = id, ?timeout, "timed out waiting for txid");
                Err(Error::TimeoutWaitingForTxId(id))
            }
        }
    }
    .boxed_local())
}

/// Waits until a committed sync message satisfies `predicate`.
///
/// `pending` are the messages of the currently open sync buffers; they and
/// the most recently committed batch are checked before waiting.
pub fn await_match<'a>(
    table: &Rc<RefCell<Waiters>>,
    predicate: MatchFn,
    timeout: Option<Duration>,
    pending: impl IntoIterator<Item = &'a SyncMessage>,
) -> LocalBoxFuture<'static, Result<()>> {
    let already = {
        let waiters = table.borrow();
        pending.into_iter().any(|m| predicate(m))
            || waiters.last_committed.iter().any(|m| predicate(m))
    };
    if already {
        return future::ready(Ok(())).boxed_local();
    }

    let (reply, rx) = oneshot::channel();
    let waiter_id = table.borrow_mut().register(Waiter::Match(predicate, reply));
    let guard = WaiterGuard {
        table: Rc::downgrade(table),
        id: waiter_id,
    };
    let timeout = timeout.unwrap_or(DEFAULT_MATCH_TIMEOUT);

    async move {
        let _guard = guard;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Cancelled),
            Err(_) => {
                tracing::warn!(?timeout, "timed out waiting for a matching sync message");
                Err(Error::TimeoutWaitingForMatch)
            }
        }
    }
    .boxed_local()
}
