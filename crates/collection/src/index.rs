//! Value indexes created for simple filter subscriptions.
//!
//! An index maps the value of one field to the keys holding it. Lookups
//! return candidate keys; callers still evaluate the full where clause.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use hashbrown::HashMap;
use ripple_core::{Key, Value};
use ripple_query::ir::{BasicExpression, PropRef};
use ripple_query::predicate::{CmpOp, Comparison, InList};
use ripple_reactive::{ChangeMessage, ChangeType};

/// A lookup an index can answer.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexLookup<'a> {
    Range(Bound<&'a Value>, Bound<&'a Value>),
    In(&'a [Value]),
}

impl<'a> IndexLookup<'a> {
    /// Recognises `op(field, literal)` and `in(field, [literals])`.
    pub fn of(expr: &'a BasicExpression) -> Option<(&'a PropRef, IndexLookup<'a>)> {
        let func = expr.as_func()?;
        if let Some(c) = Comparison::extract(func) {
            let range = match c.op {
                CmpOp::Eq => (Bound::Included(c.value), Bound::Included(c.value)),
                CmpOp::Gt => (Bound::Excluded(c.value), Bound::Unbounded),
                CmpOp::Gte => (Bound::Included(c.value), Bound::Unbounded),
                CmpOp::Lt => (Bound::Unbounded, Bound::Excluded(c.value)),
                CmpOp::Lte => (Bound::Unbounded, Bound::Included(c.value)),
            };
            return Some((c.field, IndexLookup::Range(range.0, range.1)));
        }
        InList::extract(func).map(|list| (list.field, IndexLookup::In(list.values)))
    }
}

/// Keys grouped by the value of one field.
#[derive(Debug)]
pub struct ValueIndex {
    path: Vec<String>,
    entries: BTreeMap<Value, BTreeSet<Key>>,
}

impl ValueIndex {
    pub fn new(field: &PropRef) -> Self {
        Self {
            path: field.path.clone(),
            entries: BTreeMap::new(),
        }
    }

    /// Rows without the field are not indexed.
    pub fn add(&mut self, key: &Key, row: &Value) {
        if let Some(v) = row.get_path(&self.path) {
            self.entries.entry(v.clone()).or_default().insert(key.clone());
        }
    }

    pub fn remove(&mut self, key: &Key, row: &Value) {
        let Some(v) = row.get_path(&self.path) else {
            return;
        };
        if let Some(keys) = self.entries.get_mut(v) {
            keys.remove(key);
            if keys.is_empty() {
                self.entries.remove(v);
            }
        }
    }

    pub fn apply(&mut self, change: &ChangeMessage) {
        match change.change_type {
            ChangeType::Insert => self.add(&change.key, &change.value),
            ChangeType::Update => {
                if let Some(prev) = &change.previous_value {
                    self.remove(&change.key, prev);
                }
                self.add(&change.key, &change.value);
            }
            ChangeType::Delete => self.remove(&change.key, &change.value),
        }
    }

    pub fn lookup(&self, lookup: &IndexLookup<'_>) -> BTreeSet<Key> {
        match lookup {
            IndexLookup::Range(lower, upper) => {
                if is_empty_range(*lower, *upper) {
                    return BTreeSet::new();
                }
                self.entries
                    .range::<Value, _>((*lower, *upper))
                    .flat_map(|(_, keys)| keys.iter().cloned())
                    .collect()
            }
            IndexLookup::In(values) => values
                .iter()
                .filter_map(|v| self.entries.get(v))
                .flat_map(|keys| keys.iter().cloned())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// `BTreeMap::range` panics on an inverted or empty excluded range.
fn is_empty_range(lower: Bound<&Value>, upper: Bound<&Value>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}

/// The indexes of one collection, keyed by field path.
#[derive(Debug, Default)]
pub struct AutoIndexes {
    indexes: HashMap<String, ValueIndex>,
}

impl AutoIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index for the field `where_` constrains, if it is a
    /// simple comparison and no index exists yet. Returns true when an
    /// index was built.
    pub fn ensure<'a, I>(&mut self, where_: &BasicExpression, rows: I) -> bool
    where
        I: IntoIterator<Item = (&'a Key, &'a Value)>,
    {
        let Some((field, _)) = IndexLookup::of(where_) else {
            return false;
        };
        let name = field.field_key();
        if self.indexes.contains_key(&name) {
            return false;
        }
        let mut index = ValueIndex::new(field);
        for (key, row) in rows {
            index.add(key, row);
        }
        tracing::debug!(field = %name, rows = index.len(), "auto index created");
        self.indexes.insert(name, index);
        true
    }

    /// Candidate keys for `where_`, or `None` when no index applies.
    pub fn candidates(&self, where_: &BasicExpression) -> Option<BTreeSet<Key>> {
        let (field, lookup) = IndexLookup::of(where_)?;
        let index = self.indexes.get(&field.field_key())?;
        Some(index.lookup(&lookup))
    }

    pub fn apply(&mut self, changes: &[ChangeMessage]) {
        if self.indexes.is_empty() {
            return;
        }
        for change in changes {
            for index in self.indexes.values_mut() {
                index.apply(change);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Drops indexed keys but keeps the indexed fields.
    pub fn clear_entries(&mut self) {
        for index in self.indexes.values_mut() {
            index.entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_query::ir::builders::{and, eq, gt, in_array, lt, prop, val};

    fn row(id: i64, age: i64) -> Value {
        Value::object([("id", Value::from(id)), ("age", Value::from(age))])
    }

    fn rows() -> Vec<(Key, Value)> {
        (1..=5).map(|i| (Key::Int(i), row(i, i * 10))).collect()
    }

    fn indexes() -> AutoIndexes {
        let data = rows();
        let mut idx = AutoIndexes::new();
        assert!(idx.ensure(&gt(prop(&["age"]), val(0)), data.iter().map(|(k, v)| (k, v))));
        idx
    }

    #[test]
    fn test_range_lookup() {
        let idx = indexes();
        let keys = idx.candidates(&gt(prop(&["age"]), val(30))).unwrap();
        assert_eq!(keys, [Key::Int(4), Key::Int(5)].into_iter().collect());
        let keys = idx.candidates(&lt(prop(&["age"]), val(20))).unwrap();
        assert_eq!(keys, [Key::Int(1)].into_iter().collect());
        let keys = idx.candidates(&eq(prop(&["age"]), val(30))).unwrap();
        assert_eq!(keys, [Key::Int(3)].into_iter().collect());
    }

    #[test]
    fn test_in_lookup() {
        let idx = indexes();
        let keys = idx
            .candidates(&in_array(prop(&["age"]), vec![Value::from(10), Value::from(50)]))
            .unwrap();
        assert_eq!(keys, [Key::Int(1), Key::Int(5)].into_iter().collect());
    }

    #[test]
    fn test_unindexable_expressions() {
        let mut idx = indexes();
        let complex = and(vec![gt(prop(&["age"]), val(1)), lt(prop(&["age"]), val(9))]);
        assert!(idx.candidates(&complex).is_none());
        assert!(idx.candidates(&eq(prop(&["name"]), val("x"))).is_none());
        assert!(!idx.ensure(&complex, std::iter::empty()));
        assert!(!idx.ensure(&eq(prop(&["age"]), val(1)), std::iter::empty()));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_index_follows_changes() {
        let mut idx = indexes();
        idx.apply(&[
            ChangeMessage::update(Key::Int(1), row(1, 10), row(1, 60)),
            ChangeMessage::delete(Key::Int(5), row(5, 50)),
            ChangeMessage::insert(Key::Int(6), row(6, 45)),
        ]);
        let keys = idx.candidates(&gt(prop(&["age"]), val(40))).unwrap();
        assert_eq!(keys, [Key::Int(1), Key::Int(6)].into_iter().collect());
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let idx = indexes();
        let index = idx.indexes.get("age").unwrap();
        let v = Value::from(30);
        let lookup = IndexLookup::Range(Bound::Excluded(&v), Bound::Excluded(&v));
        assert!(index.lookup(&lookup).is_empty());
    }
}
