//! Synced rows, the optimistic overlay and the open sync buffers of one
//! collection.
//!
//! Every overlay write and every applied sync operation takes a number
//! from one sequence clock. The visible value of a key is the overlay
//! entry with the highest sequence number, or the synced row when the key
//! has no overlay entries. An entry of a finished transaction is *settled*:
//! it stays visible until a synced write with a sequence number above its
//! guard lands on the same key.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::{HashMap, HashSet};
use ripple_core::{Key, Value};
use ripple_reactive::{ChangeSet, ChangeType};

use crate::config::RowUpdateMode;
use crate::error::{Error, Result};
use crate::sync::{PendingSyncBatch, SyncMessage, SyncOperation};
use crate::transaction::TransactionId;

/// One transaction's optimistic value for one key.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayEntry {
    pub tx_id: TransactionId,
    pub seq: u64,
    /// `None` hides the key.
    pub value: Option<Value>,
    pub settled: bool,
    /// Synced writes at or below this sequence number do not supersede a
    /// settled entry.
    pub guard: u64,
}

/// What one sync commit applied.
#[derive(Debug, Default)]
pub struct CommitOutcome {
    pub changes: ChangeSet,
    pub batches: Vec<PendingSyncBatch>,
    pub truncated: bool,
}

#[derive(Debug, Default)]
pub struct CollectionState {
    synced: BTreeMap<Key, Value>,
    synced_metadata: HashMap<Key, Value>,
    synced_seq: HashMap<Key, u64>,
    overlay: BTreeMap<Key, Vec<OverlayEntry>>,
    pending_sync: Vec<PendingSyncBatch>,
    last_buffer_committed: bool,
    seq: u64,
}

impl CollectionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// The visible value of `key`.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        match self
            .overlay
            .get(key)
            .and_then(|entries| entries.iter().max_by_key(|e| e.seq))
        {
            Some(entry) => entry.value.as_ref(),
            None => self.synced.get(key),
        }
    }

    pub fn has(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Visible rows in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> + '_ {
        let keys: BTreeSet<&Key> = self.synced.keys().chain(self.overlay.keys()).collect();
        keys.into_iter()
            .filter_map(move |key| self.get(key).map(|value| (key, value)))
    }

    pub fn len(&self) -> usize {
        let hidden_synced = self
            .overlay
            .keys()
            .filter(|key| self.synced.contains_key(*key))
            .count();
        let visible_overlay = self.overlay.keys().filter(|key| self.has(key)).count();
        self.synced.len() - hidden_synced + visible_overlay
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metadata of the last synced write to `key`.
    pub fn synced_metadata(&self, key: &Key) -> Option<&Value> {
        self.synced_metadata.get(key)
    }

    pub fn has_overlay(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// Re-reads the visible value of `keys` around `f` and records the
    /// transitions.
    fn track<F>(&mut self, keys: Vec<Key>, f: F) -> ChangeSet
    where
        F: FnOnce(&mut Self),
    {
        let before: Vec<(Key, Option<Value>)> = keys
            .into_iter()
            .map(|key| {
                let value = self.get(&key).cloned();
                (key, value)
            })
            .collect();
        f(self);
        let mut changes = ChangeSet::new();
        for (key, prev) in before {
            let next = self.get(&key).cloned();
            changes.record(key, prev, next);
        }
        changes
    }

    fn keys_of(&self, tx_id: TransactionId) -> Vec<Key> {
        self.overlay
            .iter()
            .filter(|(_, entries)| entries.iter().any(|e| e.tx_id == tx_id))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Writes `tx_id`'s optimistic value for `key`.
    pub fn set_optimistic(
        &mut self,
        tx_id: TransactionId,
        key: Key,
        value: Option<Value>,
    ) -> ChangeSet {
        self.track(vec![key.clone()], |state| {
            let seq = state.next_seq();
            let entries = state.overlay.entry(key).or_default();
            match entries.iter_mut().find(|e| e.tx_id == tx_id) {
                Some(entry) => {
                    entry.seq = seq;
                    entry.value = value;
                }
                None => entries.push(OverlayEntry {
                    tx_id,
                    seq,
                    value,
                    settled: false,
                    guard: 0,
                }),
            }
        })
    }

    /// Drops `tx_id`'s entry for `key`.
    pub fn clear_optimistic(&mut self, tx_id: TransactionId, key: &Key) -> ChangeSet {
        self.track(vec![key.clone()], |state| {
            state.remove_entries(key, |e| e.tx_id == tx_id);
        })
    }

    /// Marks `tx_id`'s entries settled. Entries whose key already received
    /// a newer synced write disappear at once.
    pub fn settle_transaction(&mut self, tx_id: TransactionId) -> ChangeSet {
        let keys = self.keys_of(tx_id);
        self.track(keys.clone(), |state| {
            for key in &keys {
                if let Some(entries) = state.overlay.get_mut(key) {
                    for entry in entries.iter_mut().filter(|e| e.tx_id == tx_id) {
                        entry.settled = true;
                        entry.guard = entry.guard.max(entry.seq);
                    }
                }
                state.retire(key);
            }
        })
    }

    /// Removes every entry of `tx_id`.
    pub fn fail_transaction(&mut self, tx_id: TransactionId) -> ChangeSet {
        let keys = self.keys_of(tx_id);
        self.track(keys.clone(), |state| {
            for key in &keys {
                state.remove_entries(key, |e| e.tx_id == tx_id);
            }
        })
    }

    fn remove_entries<P>(&mut self, key: &Key, mut remove: P)
    where
        P: FnMut(&OverlayEntry) -> bool,
    {
        if let Some(entries) = self.overlay.get_mut(key) {
            entries.retain(|e| !remove(e));
            if entries.is_empty() {
                self.overlay.remove(key);
            }
        }
    }

    // Drops settled entries superseded by a later synced write.
    fn retire(&mut self, key: &Key) {
        if let Some(&synced_at) = self.synced_seq.get(key) {
            self.remove_entries(key, |e| e.settled && synced_at > e.guard);
        }
    }

    /// Entries of transactions that have not finished yet.
    pub fn active_snapshot(&self) -> Vec<(TransactionId, Key)> {
        self.overlay
            .iter()
            .flat_map(|(key, entries)| {
                entries
                    .iter()
                    .filter(|e| !e.settled)
                    .map(move |e| (e.tx_id, key.clone()))
            })
            .collect()
    }

    pub fn begin(&mut self) {
        self.pending_sync.push(PendingSyncBatch::new());
        self.last_buffer_committed = false;
    }

    fn open_buffer(&mut self, closed: Error, missing: Error) -> Result<&mut PendingSyncBatch> {
        let committed = self.last_buffer_committed;
        match self.pending_sync.last_mut() {
            Some(batch) if !batch.committed => Ok(batch),
            Some(_) => Err(closed),
            None if committed => Err(closed),
            None => Err(missing),
        }
    }

    pub fn write(&mut self, key: Key, message: SyncMessage) -> Result<()> {
        let synced_has_key = self.synced.contains_key(&key);
        let batch = self.open_buffer(
            Error::SyncTransactionAlreadyCommittedWrite,
            Error::NoPendingSyncTransactionWrite,
        )?;
        batch.push(key, message, synced_has_key);
        Ok(())
    }

    pub fn truncate(&mut self) -> Result<()> {
        let snapshot = self.active_snapshot();
        let batch = self.open_buffer(
            Error::SyncTransactionAlreadyCommittedWrite,
            Error::NoPendingSyncTransactionWrite,
        )?;
        batch.truncate(snapshot);
        Ok(())
    }

    /// Messages of the buffers not yet committed.
    pub fn pending_messages(&self) -> impl Iterator<Item = &SyncMessage> + '_ {
        self.pending_sync
            .iter()
            .filter(|b| !b.committed)
            .flat_map(|b| b.operations.iter().map(|op| &op.message))
    }

    pub fn pending_sync_len(&self) -> usize {
        self.pending_sync.len()
    }

    /// Commits the most recent buffer and applies every committed buffer in
    /// order, returning one change batch for the whole commit.
    pub fn commit(&mut self, mode: RowUpdateMode) -> Result<CommitOutcome> {
        self.open_buffer(
            Error::SyncTransactionAlreadyCommitted,
            Error::NoPendingSyncTransactionCommit,
        )?
        .committed = true;
        self.last_buffer_committed = true;

        let (batches, open): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_sync)
            .into_iter()
            .partition(|b| b.committed);
        self.pending_sync = open;

        let mut before: BTreeMap<Key, Option<Value>> = BTreeMap::new();
        let mut truncated = false;
        for batch in &batches {
            if batch.truncate {
                truncated = true;
                for (key, value) in self.iter() {
                    before.entry(key.clone()).or_insert_with(|| Some(value.clone()));
                }
                self.synced.clear();
                self.synced_metadata.clear();
                self.synced_seq.clear();
            }
            for op in &batch.operations {
                if !before.contains_key(&op.key) {
                    before.insert(op.key.clone(), self.get(&op.key).cloned());
                }
                self.apply_sync_op(op, mode);
            }
            if batch.truncate {
                let commit_seq = self.next_seq();
                self.protect_snapshot(&batch.optimistic_snapshot, commit_seq);
            }
        }
        for op in batches.iter().flat_map(|b| b.operations.iter()) {
            self.retire(&op.key);
        }

        let mut changes = ChangeSet::new();
        if truncated {
            for (key, prev) in &before {
                if let Some(prev) = prev {
                    changes.remove(key.clone(), prev.clone());
                }
            }
            for (key, value) in self.iter() {
                changes.add(key.clone(), value.clone());
            }
        } else {
            for (key, prev) in before {
                let next = self.get(&key).cloned();
                changes.record(key, prev, next);
            }
        }
        Ok(CommitOutcome {
            changes,
            batches,
            truncated,
        })
    }

    fn apply_sync_op(&mut self, op: &SyncOperation, mode: RowUpdateMode) {
        let seq = self.next_seq();
        let message = &op.message;
        match message.change_type {
            ChangeType::Insert => {
                self.synced.insert(op.key.clone(), message.value.clone());
            }
            ChangeType::Update => {
                let next = match (mode, self.synced.get(&op.key)) {
                    (RowUpdateMode::Partial, Some(existing)) => existing.merge_object(&message.value),
                    _ => message.value.clone(),
                };
                self.synced.insert(op.key.clone(), next);
            }
            ChangeType::Delete => {
                self.synced.remove(&op.key);
                self.synced_metadata.remove(&op.key);
            }
        }
        if message.change_type != ChangeType::Delete {
            if let Some(metadata) = &message.metadata {
                self.synced_metadata.insert(op.key.clone(), metadata.clone());
            }
        }
        self.synced_seq.insert(op.key.clone(), seq);
    }

    // Keeps the truncate snapshot and still-running transactions alive past
    // the truncate; drops finished entries the snapshot did not contain.
    fn protect_snapshot(&mut self, snapshot: &[(TransactionId, Key)], commit_seq: u64) {
        let protected: HashSet<(TransactionId, &Key)> =
            snapshot.iter().map(|(tx, key)| (*tx, key)).collect();
        for (key, entries) in self.overlay.iter_mut() {
            entries.retain(|e| !e.settled || protected.contains(&(e.tx_id, key)));
            for entry in entries.iter_mut() {
                entry.guard = entry.guard.max(commit_seq);
            }
        }
        self.overlay.retain(|_, entries| !entries.is_empty());
    }

    /// Drops all rows, overlay entries and open buffers.
    pub fn clear(&mut self) {
        let seq = self.seq;
        *self = Self::default();
        self.seq = seq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, title: &str) -> Value {
        Value::object([("id", Value::from(id)), ("title", Value::from(title))])
    }

    fn sync_rows(state: &mut CollectionState, rows: &[(i64, &str)]) -> CommitOutcome {
        state.begin();
        for (id, title) in rows {
            state
                .write(Key::Int(*id), SyncMessage::insert(row(*id, title)))
                .unwrap();
        }
        state.commit(RowUpdateMode::Partial).unwrap()
    }

    fn kinds(changes: &ChangeSet) -> Vec<(ChangeType, Key)> {
        changes
            .as_slice()
            .iter()
            .map(|c| (c.change_type, c.key.clone()))
            .collect()
    }

    #[test]
    fn test_sync_commit_emits_inserts() {
        let mut state = CollectionState::new();
        let outcome = sync_rows(&mut state, &[(1, "a"), (2, "b")]);
        assert_eq!(
            kinds(&outcome.changes),
            vec![(ChangeType::Insert, Key::Int(1)), (ChangeType::Insert, Key::Int(2))]
        );
        assert_eq!(state.len(), 2);
        assert!(!outcome.truncated);
    }

    #[test]
    fn test_sync_contract_errors() {
        let mut state = CollectionState::new();
        assert!(matches!(
            state.write(Key::Int(1), SyncMessage::insert(row(1, "a"))),
            Err(Error::NoPendingSyncTransactionWrite)
        ));
        assert!(matches!(
            state.commit(RowUpdateMode::Partial),
            Err(Error::NoPendingSyncTransactionCommit)
        ));
        state.begin();
        state.commit(RowUpdateMode::Partial).unwrap();
        assert!(matches!(
            state.write(Key::Int(1), SyncMessage::insert(row(1, "a"))),
            Err(Error::SyncTransactionAlreadyCommittedWrite)
        ));
        assert!(matches!(
            state.commit(RowUpdateMode::Partial),
            Err(Error::SyncTransactionAlreadyCommitted)
        ));
    }

    #[test]
    fn test_partial_and_full_updates() {
        let mut state = CollectionState::new();
        sync_rows(&mut state, &[(1, "a")]);
        state.begin();
        state
            .write(
                Key::Int(1),
                SyncMessage::update(Value::object([("done", Value::from(true))])),
            )
            .unwrap();
        state.commit(RowUpdateMode::Partial).unwrap();
        let merged = state.get(&Key::Int(1)).unwrap();
        assert_eq!(merged.get("title"), Some(&Value::from("a")));
        assert_eq!(merged.get("done"), Some(&Value::from(true)));

        state.begin();
        state
            .write(
                Key::Int(1),
                SyncMessage::update(Value::object([("id", Value::from(1))])),
            )
            .unwrap();
        state.commit(RowUpdateMode::Full).unwrap();
        assert_eq!(state.get(&Key::Int(1)).unwrap().get("title"), None);
    }

    #[test]
    fn test_optimistic_overlay_wins_until_superseded() {
        let mut state = CollectionState::new();
        sync_rows(&mut state, &[(1, "a")]);

        let changes = state.set_optimistic(7, Key::Int(1), Some(row(1, "mine")));
        assert_eq!(kinds(&changes), vec![(ChangeType::Update, Key::Int(1))]);

        // A synced write while the transaction runs stays hidden.
        let outcome = sync_rows(&mut state, &[(1, "server")]);
        assert!(outcome.changes.is_empty());
        assert_eq!(state.get(&Key::Int(1)), Some(&row(1, "mine")));

        // Settling retires the entry because a newer synced write exists.
        let changes = state.settle_transaction(7);
        assert_eq!(kinds(&changes), vec![(ChangeType::Update, Key::Int(1))]);
        assert_eq!(state.get(&Key::Int(1)), Some(&row(1, "server")));
        assert!(!state.has_overlay());
    }

    #[test]
    fn test_settled_entry_waits_for_sync() {
        let mut state = CollectionState::new();
        state.set_optimistic(3, Key::Int(3), Some(row(3, "new")));
        assert!(state.settle_transaction(3).is_empty());
        assert_eq!(state.get(&Key::Int(3)), Some(&row(3, "new")));

        let outcome = sync_rows(&mut state, &[(3, "new")]);
        assert!(outcome.changes.is_empty());
        assert!(!state.has_overlay());
        assert_eq!(state.get(&Key::Int(3)), Some(&row(3, "new")));
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let mut state = CollectionState::new();
        sync_rows(&mut state, &[(1, "a")]);
        state.set_optimistic(5, Key::Int(1), None);
        state.set_optimistic(5, Key::Int(2), Some(row(2, "b")));
        assert_eq!(state.len(), 1);

        let changes = state.fail_transaction(5);
        assert_eq!(
            kinds(&changes),
            vec![(ChangeType::Insert, Key::Int(1)), (ChangeType::Delete, Key::Int(2))]
        );
        assert_eq!(state.len(), 1);
        assert!(state.has(&Key::Int(1)));
    }

    #[test]
    fn test_truncate_keeps_active_optimistic_rows() {
        let mut state = CollectionState::new();
        sync_rows(&mut state, &[(1, "a"), (2, "b")]);
        state.set_optimistic(9, Key::Int(3), Some(row(3, "c")));

        state.begin();
        state.truncate().unwrap();
        state.write(Key::Int(1), SyncMessage::insert(row(1, "a"))).unwrap();
        state.write(Key::Int(2), SyncMessage::insert(row(2, "b"))).unwrap();
        let outcome = state.commit(RowUpdateMode::Partial).unwrap();

        assert!(outcome.truncated);
        assert_eq!(
            kinds(&outcome.changes),
            vec![
                (ChangeType::Delete, Key::Int(1)),
                (ChangeType::Delete, Key::Int(2)),
                (ChangeType::Delete, Key::Int(3)),
                (ChangeType::Insert, Key::Int(1)),
                (ChangeType::Insert, Key::Int(2)),
                (ChangeType::Insert, Key::Int(3)),
            ]
        );
        assert_eq!(state.get(&Key::Int(3)), Some(&row(3, "c")));
    }

    #[test]
    fn test_optimistic_beats_truncate_reinsert() {
        let mut state = CollectionState::new();
        sync_rows(&mut state, &[(1, "a")]);
        state.set_optimistic(4, Key::Int(1), Some(row(1, "local")));

        state.begin();
        state.truncate().unwrap();
        state.write(Key::Int(1), SyncMessage::insert(row(1, "server"))).unwrap();
        state.commit(RowUpdateMode::Partial).unwrap();
        assert_eq!(state.get(&Key::Int(1)), Some(&row(1, "local")));

        // Completion before the next synced write keeps the value visible.
        state.settle_transaction(4);
        assert_eq!(state.get(&Key::Int(1)), Some(&row(1, "local")));
        sync_rows(&mut state, &[(1, "server2")]);
        assert_eq!(state.get(&Key::Int(1)), Some(&row(1, "server2")));
    }

    #[test]
    fn test_truncate_drops_finished_entries_outside_snapshot() {
        let mut state = CollectionState::new();
        state.set_optimistic(1, Key::Int(1), Some(row(1, "done")));
        state.settle_transaction(1);

        state.begin();
        state.truncate().unwrap();
        let outcome = state.commit(RowUpdateMode::Partial).unwrap();
        assert_eq!(kinds(&outcome.changes), vec![(ChangeType::Delete, Key::Int(1))]);
        assert!(state.is_empty());
    }

    #[test]
    fn test_truncate_empty_collection_emits_nothing() {
        let mut state = CollectionState::new();
        state.begin();
        state.truncate().unwrap();
        let outcome = state.commit(RowUpdateMode::Partial).unwrap();
        assert!(outcome.truncated);
        assert!(outcome.changes.is_empty());
    }

    #[test]
    fn test_interleaved_buffers_apply_in_order() {
        let mut state = CollectionState::new();
        state.begin();
        state.write(Key::Int(1), SyncMessage::insert(row(1, "first"))).unwrap();
        state.begin();
        state.write(Key::Int(2), SyncMessage::insert(row(2, "second"))).unwrap();
        let outcome = state.commit(RowUpdateMode::Partial).unwrap();
        assert_eq!(kinds(&outcome.changes), vec![(ChangeType::Insert, Key::Int(2))]);
        assert_eq!(state.pending_sync_len(), 1);

        let outcome = state.commit(RowUpdateMode::Partial).unwrap();
        assert_eq!(kinds(&outcome.changes), vec![(ChangeType::Insert, Key::Int(1))]);
        assert_eq!(state.pending_sync_len(), 0);
    }

    #[test]
    fn test_metadata_tracked_per_row() {
        let mut state = CollectionState::new();
        state.begin();
        state
            .write(
                Key::Int(1),
                SyncMessage::insert(row(1, "a")).with_metadata(Value::from("v1")),
            )
            .unwrap();
        state.commit(RowUpdateMode::Partial).unwrap();
        assert_eq!(state.synced_metadata(&Key::Int(1)), Some(&Value::from("v1")));
    }
}
