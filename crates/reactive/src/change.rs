//! Change messages emitted to subscribers.
//!
//! A `ChangeSet` is one batch: everything a single commit or mutation
//! changed, in emission order.

use alloc::vec::Vec;
use ripple_core::{Key, Value};

/// Kind of a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// One visible change to one key.
///
/// For deletes, `value` is the last visible value of the row.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeMessage {
    pub key: Key,
    pub change_type: ChangeType,
    pub value: Value,
    pub previous_value: Option<Value>,
    pub metadata: Option<Value>,
}

impl ChangeMessage {
    #[inline]
    pub fn insert(key: Key, value: Value) -> Self {
        Self {
            key,
            change_type: ChangeType::Insert,
            value,
            previous_value: None,
            metadata: None,
        }
    }

    #[inline]
    pub fn update(key: Key, previous: Value, value: Value) -> Self {
        Self {
            key,
            change_type: ChangeType::Update,
            value,
            previous_value: Some(previous),
            metadata: None,
        }
    }

    #[inline]
    pub fn delete(key: Key, previous: Value) -> Self {
        Self {
            key,
            change_type: ChangeType::Delete,
            value: previous.clone(),
            previous_value: Some(previous),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the row as it stands after this change, if any.
    pub fn current(&self) -> Option<&Value> {
        match self.change_type {
            ChangeType::Delete => None,
            ChangeType::Insert | ChangeType::Update => Some(&self.value),
        }
    }
}

/// An ordered batch of change messages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    pub changes: Vec<ChangeMessage>,
}

impl ChangeSet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the transition of `key` from `before` to `after` as visible
    /// state. Equal states record nothing.
    pub fn record(&mut self, key: Key, before: Option<Value>, after: Option<Value>) {
        match (before, after) {
            (None, None) => {}
            (None, Some(v)) => self.add(key, v),
            (Some(p), None) => self.remove(key, p),
            (Some(p), Some(v)) => {
                if p != v {
                    self.modify(key, p, v);
                }
            }
        }
    }

    #[inline]
    pub fn add(&mut self, key: Key, value: Value) {
        self.changes.push(ChangeMessage::insert(key, value));
    }

    #[inline]
    pub fn remove(&mut self, key: Key, previous: Value) {
        self.changes.push(ChangeMessage::delete(key, previous));
    }

    #[inline]
    pub fn modify(&mut self, key: Key, previous: Value, value: Value) {
        self.changes.push(ChangeMessage::update(key, previous, value));
    }

    /// Appends another batch after this one.
    pub fn merge(&mut self, other: ChangeSet) {
        self.changes.extend(other.changes);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn as_slice(&self) -> &[ChangeMessage] {
        &self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, status: &str) -> Value {
        Value::object([("id", Value::from(id)), ("status", Value::from(status))])
    }

    #[test]
    fn test_change_set_new() {
        let cs = ChangeSet::new();
        assert!(cs.is_empty());
        assert_eq!(cs.len(), 0);
    }

    #[test]
    fn test_record_transitions() {
        let mut cs = ChangeSet::new();
        cs.record(Key::Int(1), None, Some(row(1, "a")));
        cs.record(Key::Int(2), Some(row(2, "a")), Some(row(2, "b")));
        cs.record(Key::Int(3), Some(row(3, "a")), None);
        cs.record(Key::Int(4), Some(row(4, "a")), Some(row(4, "a")));
        cs.record(Key::Int(5), None, None);

        let kinds: Vec<ChangeType> = cs.changes.iter().map(|c| c.change_type).collect();
        assert_eq!(kinds, [ChangeType::Insert, ChangeType::Update, ChangeType::Delete]);
        assert_eq!(cs.changes[1].previous_value, Some(row(2, "a")));
        assert_eq!(cs.changes[2].value, row(3, "a"));
    }

    #[test]
    fn test_change_set_merge() {
        let mut cs1 = ChangeSet::new();
        cs1.add(Key::Int(1), row(1, "a"));

        let mut cs2 = ChangeSet::new();
        cs2.add(Key::Int(2), row(2, "a"));
        cs2.remove(Key::Int(3), row(3, "a"));

        cs1.merge(cs2);
        assert_eq!(cs1.len(), 3);
        assert_eq!(cs1.changes[2].change_type, ChangeType::Delete);
    }

    #[test]
    fn test_current_value() {
        assert!(ChangeMessage::delete(Key::Int(1), row(1, "a")).current().is_none());
        assert_eq!(ChangeMessage::insert(Key::Int(1), row(1, "a")).current(), Some(&row(1, "a")));
    }
}
