//! Optimistic mutations recorded by a transaction.

use std::sync::atomic::{AtomicU64, Ordering};

use ripple_core::{Key, Value};
use ripple_reactive::ChangeType;

static NEXT_MUTATION_ID: AtomicU64 = AtomicU64::new(1);

/// One optimistic change to one key of one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingMutation {
    pub mutation_id: u64,
    pub collection: String,
    pub key: Key,
    pub change_type: ChangeType,
    /// Row before the transaction touched it. `None` for inserts.
    pub original: Option<Value>,
    /// Row after the mutation. For deletes, the row being deleted.
    pub modified: Value,
    /// Fields changed by the mutation. For inserts, the whole row.
    pub changes: Value,
    pub metadata: Option<Value>,
}

impl PendingMutation {
    pub fn insert(collection: &str, key: Key, value: Value) -> Self {
        Self::new(collection, key, ChangeType::Insert, None, value.clone(), value)
    }

    pub fn update(collection: &str, key: Key, original: Value, modified: Value) -> Self {
        let changes = Value::changed_fields(&original, &modified);
        Self::new(collection, key, ChangeType::Update, Some(original), modified, changes)
    }

    pub fn delete(collection: &str, key: Key, original: Value) -> Self {
        Self::new(
            collection,
            key,
            ChangeType::Delete,
            Some(original.clone()),
            original,
            Value::Null,
        )
    }

    fn new(
        collection: &str,
        key: Key,
        change_type: ChangeType,
        original: Option<Value>,
        modified: Value,
        changes: Value,
    ) -> Self {
        Self {
            mutation_id: NEXT_MUTATION_ID.fetch_add(1, Ordering::Relaxed),
            collection: collection.into(),
            key,
            change_type,
            original,
            modified,
            changes,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns true if this mutation targets `key` in `collection`.
    pub fn targets(&self, collection: &str, key: &Key) -> bool {
        self.collection == collection && &self.key == key
    }

    /// The optimistic value this mutation leaves behind, `None` for deletes.
    pub fn visible_value(&self) -> Option<&Value> {
        match self.change_type {
            ChangeType::Delete => None,
            ChangeType::Insert | ChangeType::Update => Some(&self.modified),
        }
    }
}

/// Folds `incoming` into `existing` for the same key.
///
/// Returns `None` when the two cancel out.
pub fn merge_pending(existing: PendingMutation, incoming: PendingMutation) -> Option<PendingMutation> {
    use ChangeType::*;
    let metadata = incoming.metadata.clone().or(existing.metadata.clone());
    let merged = match (existing.change_type, incoming.change_type) {
        (Insert, Update) => PendingMutation {
            change_type: Insert,
            original: None,
            changes: existing.changes.merge_object(&incoming.changes),
            metadata,
            ..incoming
        },
        (Insert, Delete) => return None,
        (Update, Delete) => PendingMutation {
            original: existing.original,
            ..incoming
        },
        (Update, Update) => PendingMutation {
            original: existing.original,
            changes: existing.changes.merge_object(&incoming.changes),
            metadata,
            ..incoming
        },
        // The row existed before the transaction, so the pair is an update
        // from the original row to the re-inserted one.
        (Delete, Insert) => PendingMutation {
            change_type: Update,
            original: existing.original,
            metadata,
            ..incoming
        },
        _ => incoming,
    };
    Some(merged)
}
