//! The sync contract between a collection and its data source.
//!
//! A sync source receives a [`SyncHandle`] and drives it with
//! `begin / write / commit`, possibly interleaving several buffers. Writes
//! are normalized as they arrive; nothing becomes visible until `commit`.

use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use ripple_core::{Key, Value};
use ripple_reactive::ChangeType;

use crate::collection::{Collection, Inner};
use crate::config::RowUpdateMode;
use crate::dedupe::LoadSubsetFn;
use crate::error::Result;
use crate::transaction::TransactionId;

/// A message written by a sync source.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncMessage {
    pub change_type: ChangeType,
    pub value: Value,
    pub metadata: Option<Value>,
    /// Transaction ids this message confirms.
    pub txids: Vec<Value>,
}

impl SyncMessage {
    pub fn insert(value: Value) -> Self {
        Self::new(ChangeType::Insert, value)
    }

    pub fn update(value: Value) -> Self {
        Self::new(ChangeType::Update, value)
    }

    pub fn delete(value: Value) -> Self {
        Self::new(ChangeType::Delete, value)
    }

    fn new(change_type: ChangeType, value: Value) -> Self {
        Self {
            change_type,
            value,
            metadata: None,
            txids: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_txids(mut self, txids: Vec<Value>) -> Self {
        self.txids = txids;
        self
    }
}

/// A normalized write inside a sync buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncOperation {
    pub key: Key,
    pub message: SyncMessage,
}

/// One `begin .. commit` buffer of sync writes.
#[derive(Clone, Debug, Default)]
pub struct PendingSyncBatch {
    pub committed: bool,
    pub operations: Vec<SyncOperation>,
    /// Last write type per key, used to normalize repeated inserts.
    last_write: HashMap<Key, ChangeType>,
    pub truncate: bool,
    /// Overlay entries that were active when `truncate` ran.
    pub optimistic_snapshot: Vec<(TransactionId, Key)>,
}

impl PendingSyncBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a write, turning an insert of a row that already exists into
    /// an update.
    ///
    /// `synced_has_key` tells whether the key is present in synced data; it
    /// is ignored once the batch is a truncate.
    pub fn push(&mut self, key: Key, mut message: SyncMessage, synced_has_key: bool) {
        if message.change_type == ChangeType::Insert {
            let exists = match self.last_write.get(&key) {
                Some(ChangeType::Delete) => false,
                Some(_) => true,
                None => synced_has_key && !self.truncate,
            };
            if exists {
                message.change_type = ChangeType::Update;
            }
        }
        self.last_write.insert(key.clone(), message.change_type);
        self.operations.push(SyncOperation { key, message });
    }

    /// Drops buffered writes and marks the batch as a truncate.
    pub fn truncate(&mut self, snapshot: Vec<(TransactionId, Key)>) {
        self.operations.clear();
        self.last_write.clear();
        self.truncate = true;
        self.optimistic_snapshot = snapshot;
    }

    /// Txids carried by the batch's messages, in write order.
    pub fn txids(&self) -> impl Iterator<Item = &Value> {
        self.operations.iter().flat_map(|op| op.message.txids.iter())
    }
}

/// Called once per sync start.
pub type SyncFn = Rc<dyn Fn(SyncParams) -> SyncResult>;

/// A sync source.
#[derive(Clone)]
pub struct SyncConfig {
    pub(crate) sync: SyncFn,
    pub(crate) row_update_mode: Option<RowUpdateMode>,
}

impl SyncConfig {
    pub fn new<F>(sync: F) -> Self
    where
        F: Fn(SyncParams) -> SyncResult + 'static,
    {
        Self {
            sync: Rc::new(sync),
            row_update_mode: None,
        }
    }

    /// Overrides the collection's row update mode for this source.
    pub fn with_row_update_mode(mut self, mode: RowUpdateMode) -> Self {
        self.row_update_mode = Some(mode);
        self
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("row_update_mode", &self.row_update_mode)
            .finish_non_exhaustive()
    }
}

/// What a sync source receives when sync starts.
pub struct SyncParams {
    pub collection_id: String,
    pub handle: SyncHandle,
}

/// What a sync source hands back.
#[derive(Default)]
pub struct SyncResult {
    /// Invoked when the collection is cleaned up.
    pub cleanup: Option<Box<dyn FnOnce()>>,
    /// On-demand loader used by `Collection::load_subset`.
    pub load_subset: Option<LoadSubsetFn>,
}

impl SyncResult {
    pub fn with_cleanup<F: FnOnce() + 'static>(mut self, cleanup: F) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    pub fn with_load_subset(mut self, load_subset: LoadSubsetFn) -> Self {
        self.load_subset = Some(load_subset);
        self
    }
}

/// Write access to a collection's sync buffers.
///
/// Holds the collection weakly; once the collection is dropped every call
/// is a no-op.
#[derive(Clone)]
pub struct SyncHandle {
    inner: Weak<Inner>,
}

impl SyncHandle {
    pub(crate) fn new(inner: Weak<Inner>) -> Self {
        Self { inner }
    }

    /// The collection this handle writes to, if it is still alive.
    pub fn collection(&self) -> Option<Collection> {
        self.inner.upgrade().map(Collection::from_inner)
    }

    /// Opens a new sync buffer.
    pub fn begin(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.sync_begin();
        }
    }

    /// Appends a message to the most recent open buffer.
    pub fn write(&self, message: SyncMessage) -> Result<()> {
        match self.inner.upgrade() {
            Some(inner) => inner.sync_write(message),
            None => Ok(()),
        }
    }

    /// Commits the most recent buffer and applies every committed buffer.
    pub fn commit(&self) -> Result<()> {
        match self.inner.upgrade() {
            Some(inner) => Inner::sync_commit(&inner),
            None => Ok(()),
        }
    }

    /// Marks the initial sync as done.
    pub fn mark_ready(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.sync_mark_ready();
        }
    }

    /// Schedules deletion of every visible row when the open buffer commits.
    pub fn truncate(&self) -> Result<()> {
        match self.inner.upgrade() {
            Some(inner) => inner.sync_truncate(),
            None => Ok(()),
        }
    }
}
