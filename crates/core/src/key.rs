//! Record keys.

use crate::error::{Error, Result};
use crate::value::Value;
use alloc::string::{String, ToString};
use core::fmt;
use serde::{Deserialize, Serialize};

/// The identity of a record inside a collection.
///
/// Keys are either integers or strings, like the keys a `get_key`
/// extractor pulls out of a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// Converts a field value into a key.
    ///
    /// Integral floats are accepted as integer keys; every other kind is
    /// rejected.
    pub fn from_value(value: &Value) -> Result<Key> {
        match value {
            Value::Int64(i) => Ok(Key::Int(*i)),
            Value::Float64(f) if f.fract() == 0.0 && f.is_finite() => Ok(Key::Int(*f as i64)),
            Value::String(s) => Ok(Key::Str(s.clone())),
            other => Err(Error::invalid_key(alloc::format!(
                "{} value cannot be used as a key",
                other.type_name()
            ))),
        }
    }

    /// Converts the key back into a value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(i) => Value::Int64(*i),
            Key::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(v as i64)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Str(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_key_from_value() {
        assert_eq!(Key::from_value(&Value::Int64(3)), Ok(Key::Int(3)));
        assert_eq!(Key::from_value(&Value::Float64(4.0)), Ok(Key::Int(4)));
        assert_eq!(Key::from_value(&Value::from("a")), Ok(Key::from("a")));
        assert!(Key::from_value(&Value::Float64(1.5)).is_err());
        assert!(Key::from_value(&Value::Null).is_err());
        assert!(Key::from_value(&Value::Array(vec![])).is_err());
    }

    #[test]
    fn test_key_ordering() {
        assert!(Key::Int(1) < Key::Int(2));
        assert!(Key::Int(100) < Key::from("a"));
        assert_eq!(Key::Int(7).to_value(), Value::Int64(7));
    }
}
