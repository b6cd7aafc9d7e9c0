//! Ripple Reactive - change messages and filtered subscriptions.
//!
//! A collection produces one `ChangeSet` per commit or mutation. The
//! `SubscriptionManager` turns it into per-subscriber batches: each
//! subscription sees only the rows its where expression admits, and rows
//! crossing the filter boundary appear as inserts or deletes.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use ripple_core::{Key, Value};
//! use ripple_query::ir::builders::{eq, prop, val};
//! use ripple_reactive::{deliver_all, ChangeMessage, SubscribeOptions, SubscriptionManager};
//!
//! let mut manager = SubscriptionManager::new();
//! let options = SubscribeOptions::default().filtered(eq(prop(&["done"]), val(true)));
//! manager
//!     .subscribe(Rc::new(|changes: &[ChangeMessage]| assert_eq!(changes.len(), 1)), &options)
//!     .unwrap();
//!
//! let row = Value::object([("id", Value::from(1)), ("done", Value::from(true))]);
//! deliver_all(manager.dispatch(&[ChangeMessage::insert(Key::Int(1), row)]));
//! ```

#![no_std]

extern crate alloc;

pub mod change;
pub mod subscription;

pub use change::{ChangeMessage, ChangeSet, ChangeType};
pub use subscription::{
    deliver_all, ChangeCallback, Notification, SubscribeOptions, Subscription, SubscriptionId,
    SubscriptionManager,
};
