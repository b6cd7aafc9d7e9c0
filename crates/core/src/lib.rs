//! Ripple Core - record values, keys and errors shared by every Ripple crate.
//!
//! - `Value`: JSON-like record data with a total order (used by filters, cursors and indexes)
//! - `Key`: the identity of a record inside a collection
//! - `pattern_match`: LIKE / ILIKE matching used by the row evaluator
//! - `Error`: error type for value, key and expression handling
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{Key, Value};
//!
//! let row = Value::object([("id", Value::from(1)), ("name", Value::from("Alice"))]);
//! let key = Key::from_value(row.get("id").unwrap()).unwrap();
//!
//! assert_eq!(key, Key::Int(1));
//! assert_eq!(row.get("name").and_then(Value::as_str), Some("Alice"));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod key;
pub mod pattern_match;
mod value;

pub use error::{Error, Result};
pub use key::Key;
pub use value::Value;
