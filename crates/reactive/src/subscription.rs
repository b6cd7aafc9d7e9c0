//! Subscription management for collection changes.
//!
//! Each subscription keeps the rows it has been sent so far, which lets it
//! turn collection-level changes into changes relative to its own filtered
//! view: a row that starts matching the filter arrives as an insert, one that
//! stops matching leaves as a delete.
//!
//! Dispatching does not call callbacks. It returns [`Notification`]s that the
//! caller delivers once it has released its own state, so a callback can read
//! from (or subscribe to) the source it is listening on.

use alloc::rc::Rc;
use alloc::vec::Vec;
use hashbrown::HashMap;
use ripple_core::{Key, Result, Value};
use ripple_query::ir::BasicExpression;
use ripple_query::{compile_where, CompiledWhere};

use crate::change::ChangeMessage;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for change notifications.
pub type ChangeCallback = Rc<dyn Fn(&[ChangeMessage])>;

/// Options accepted when subscribing.
#[derive(Clone, Debug, Default)]
pub struct SubscribeOptions {
    /// Emit the currently matching rows as one insert batch on subscribe.
    pub include_initial_state: bool,
    /// Only rows matching this expression are visible to the subscriber.
    pub where_expression: Option<BasicExpression>,
}

impl SubscribeOptions {
    pub fn with_initial_state(mut self) -> Self {
        self.include_initial_state = true;
        self
    }

    pub fn filtered(mut self, where_expression: BasicExpression) -> Self {
        self.where_expression = Some(where_expression);
        self
    }
}

/// A batch of changes bound for one callback.
pub struct Notification {
    callback: ChangeCallback,
    pub changes: Vec<ChangeMessage>,
}

impl Notification {
    /// Invokes the callback.
    pub fn deliver(self) {
        (self.callback)(&self.changes);
    }
}

/// Delivers notifications in order.
pub fn deliver_all(notifications: Vec<Notification>) {
    for n in notifications {
        n.deliver();
    }
}

/// A subscription to collection changes.
pub struct Subscription {
    id: SubscriptionId,
    callback: ChangeCallback,
    filter: Option<CompiledWhere>,
    /// Last value sent per key.
    sent: HashMap<Key, Value>,
    active: bool,
}

impl Subscription {
    /// Creates a new subscription.
    pub fn new(id: SubscriptionId, callback: ChangeCallback, filter: Option<CompiledWhere>) -> Self {
        Self {
            id,
            callback,
            filter,
            sent: HashMap::new(),
            active: true,
        }
    }

    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Returns true if `value` passes this subscription's filter.
    pub fn accepts(&self, value: &Value) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(value))
    }

    /// Number of rows this subscriber currently sees.
    pub fn visible_len(&self) -> usize {
        self.sent.len()
    }

    /// Translates collection-level changes into this subscriber's view and
    /// records what was sent.
    pub fn filter_changes(&mut self, changes: &[ChangeMessage]) -> Vec<ChangeMessage> {
        let mut out = Vec::new();
        for change in changes {
            let next = change.current().filter(|v| self.accepts(v)).cloned();
            let prev = self.sent.get(&change.key).cloned();
            let message = match (prev, next) {
                (None, None) => continue,
                (None, Some(v)) => {
                    self.sent.insert(change.key.clone(), v.clone());
                    ChangeMessage::insert(change.key.clone(), v)
                }
                (Some(p), None) => {
                    self.sent.remove(&change.key);
                    ChangeMessage::delete(change.key.clone(), p)
                }
                (Some(p), Some(v)) => {
                    if p == v {
                        continue;
                    }
                    self.sent.insert(change.key.clone(), v.clone());
                    ChangeMessage::update(change.key.clone(), p, v)
                }
            };
            out.push(message.with_metadata(change.metadata.clone()));
        }
        out
    }

    /// Records `rows` as sent and returns the matching ones as inserts.
    pub fn initial_state<'a, I>(&mut self, rows: I) -> Vec<ChangeMessage>
    where
        I: IntoIterator<Item = (&'a Key, &'a Value)>,
    {
        let mut out = Vec::new();
        for (key, value) in rows {
            if self.accepts(value) {
                self.sent.insert(key.clone(), value.clone());
                out.push(ChangeMessage::insert(key.clone(), value.clone()));
            }
        }
        out
    }

    fn notification(&self, changes: Vec<ChangeMessage>) -> Option<Notification> {
        (self.active && !changes.is_empty()).then(|| Notification {
            callback: self.callback.clone(),
            changes,
        })
    }
}

/// Manages the subscriptions of one collection.
pub struct SubscriptionManager {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    /// Ids in subscription order, so notifications go out deterministically.
    order: Vec<SubscriptionId>,
    next_id: SubscriptionId,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
        }
    }

    /// Registers a subscription. Fails if the where expression is invalid.
    pub fn subscribe(
        &mut self,
        callback: ChangeCallback,
        options: &SubscribeOptions,
    ) -> Result<SubscriptionId> {
        let filter = options
            .where_expression
            .clone()
            .map(compile_where)
            .transpose()?;

        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, Subscription::new(id, callback, filter));
        self.order.push(id);
        Ok(id)
    }

    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.order.retain(|i| *i != id);
        self.subscriptions.remove(&id).is_some()
    }

    /// Builds the initial-state batch for one subscription.
    pub fn initial_state<'a, I>(&mut self, id: SubscriptionId, rows: I) -> Option<Notification>
    where
        I: IntoIterator<Item = (&'a Key, &'a Value)>,
    {
        let sub = self.subscriptions.get_mut(&id)?;
        let changes = sub.initial_state(rows);
        sub.notification(changes)
    }

    /// Filters a change batch for every subscription.
    pub fn dispatch(&mut self, changes: &[ChangeMessage]) -> Vec<Notification> {
        if changes.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        for id in &self.order {
            if let Some(sub) = self.subscriptions.get_mut(id) {
                let filtered = sub.filter_changes(changes);
                out.extend(sub.notification(filtered));
            }
        }
        out
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Forgets what every subscription has been sent.
    pub fn reset_sent(&mut self) {
        for sub in self.subscriptions.values_mut() {
            sub.sent.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeType;
    use alloc::vec;
    use core::cell::RefCell;
    use ripple_query::ir::builders::*;

    fn row(id: i64, status: &str) -> Value {
        Value::object([("id", Value::from(id)), ("status", Value::from(status))])
    }

    fn recorder() -> (ChangeCallback, Rc<RefCell<Vec<Vec<ChangeMessage>>>>) {
        let log: Rc<RefCell<Vec<Vec<ChangeMessage>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let cb: ChangeCallback = Rc::new(move |changes: &[ChangeMessage]| {
            sink.borrow_mut().push(changes.to_vec());
        });
        (cb, log)
    }

    fn active_only() -> SubscribeOptions {
        SubscribeOptions::default().filtered(eq(prop(&["status"]), val("active")))
    }

    #[test]
    fn test_subscription_manager_subscribe() {
        let mut manager = SubscriptionManager::new();
        let (cb, _) = recorder();
        let id1 = manager.subscribe(cb.clone(), &SubscribeOptions::default()).unwrap();
        let id2 = manager.subscribe(cb, &SubscribeOptions::default()).unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_subscribe_rejects_invalid_where() {
        let mut manager = SubscriptionManager::new();
        let (cb, _) = recorder();
        let bad = SubscribeOptions::default().filtered(func("nope", vec![]));
        assert!(manager.subscribe(cb, &bad).is_err());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_subscription_manager_unsubscribe() {
        let mut manager = SubscriptionManager::new();
        let (cb, _) = recorder();
        let id = manager.subscribe(cb, &SubscribeOptions::default()).unwrap();
        assert!(manager.unsubscribe(id));
        assert!(!manager.unsubscribe(id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_update_entering_filter_becomes_insert() {
        let mut manager = SubscriptionManager::new();
        let (cb, log) = recorder();
        manager.subscribe(cb, &active_only()).unwrap();

        let k = Key::Int(1);
        let batch = [ChangeMessage::update(k.clone(), row(1, "inactive"), row(1, "active"))];
        deliver_all(manager.dispatch(&batch));

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], vec![ChangeMessage::insert(k, row(1, "active"))]);
    }

    #[test]
    fn test_update_leaving_filter_becomes_delete() {
        let mut manager = SubscriptionManager::new();
        let (cb, log) = recorder();
        let id = manager.subscribe(cb, &active_only()).unwrap();
        let k = Key::Int(1);
        let rows = [(k.clone(), row(1, "active"))];
        let initial = manager.initial_state(id, rows.iter().map(|(k, v)| (k, v)));
        assert!(initial.is_some());

        let batch = [ChangeMessage::update(k.clone(), row(1, "active"), row(1, "inactive"))];
        deliver_all(manager.dispatch(&batch));

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        let delete = &log[0][0];
        assert_eq!(delete.change_type, ChangeType::Delete);
        assert_eq!(delete.previous_value, Some(row(1, "active")));
    }

    #[test]
    fn test_unseen_delete_dropped_and_unseen_update_inserted() {
        let mut sub = Subscription::new(1, recorder().0, None);
        let k = Key::Int(7);
        assert!(sub.filter_changes(&[ChangeMessage::delete(k.clone(), row(7, "a"))]).is_empty());

        let out = sub.filter_changes(&[ChangeMessage::update(k.clone(), row(7, "a"), row(7, "b"))]);
        assert_eq!(out, vec![ChangeMessage::insert(k, row(7, "b"))]);
    }

    #[test]
    fn test_previous_value_from_sent_state() {
        let mut sub = Subscription::new(1, recorder().0, None);
        let k = Key::Int(1);
        sub.filter_changes(&[ChangeMessage::insert(k.clone(), row(1, "a"))]);
        let out = sub.filter_changes(&[ChangeMessage::update(k.clone(), row(1, "x"), row(1, "b"))]);
        assert_eq!(out[0].previous_value, Some(row(1, "a")));
        assert_eq!(sub.visible_len(), 1);
    }

    #[test]
    fn test_delete_then_insert_same_batch() {
        let mut sub = Subscription::new(1, recorder().0, None);
        let k = Key::Int(3);
        sub.filter_changes(&[ChangeMessage::insert(k.clone(), row(3, "a"))]);
        let out = sub.filter_changes(&[
            ChangeMessage::delete(k.clone(), row(3, "a")),
            ChangeMessage::insert(k.clone(), row(3, "a")),
        ]);
        let kinds: Vec<ChangeType> = out.iter().map(|c| c.change_type).collect();
        assert_eq!(kinds, [ChangeType::Delete, ChangeType::Insert]);
    }

    #[test]
    fn test_inactive_subscription_not_notified() {
        let mut manager = SubscriptionManager::new();
        let (cb, log) = recorder();
        let id = manager.subscribe(cb, &SubscribeOptions::default()).unwrap();
        if let Some(sub) = manager.subscriptions.get_mut(&id) {
            sub.deactivate();
        }
        deliver_all(manager.dispatch(&[ChangeMessage::insert(Key::Int(1), row(1, "a"))]));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_notifications_in_subscription_order() {
        let mut manager = SubscriptionManager::new();
        let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3u32 {
            let o = order.clone();
            let cb: ChangeCallback = Rc::new(move |_: &[ChangeMessage]| o.borrow_mut().push(n));
            manager.subscribe(cb, &SubscribeOptions::default()).unwrap();
        }
        deliver_all(manager.dispatch(&[ChangeMessage::insert(Key::Int(1), row(1, "a"))]));
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }
}
