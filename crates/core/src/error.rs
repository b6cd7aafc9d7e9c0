//! Error types for Ripple values and expressions.

use alloc::string::String;
use thiserror::Error;

/// Result type alias for Ripple core operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for value, key and expression handling.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Type mismatch error.
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
    /// A value cannot be used as a record key.
    #[error("Invalid key: {message}")]
    InvalidKey { message: String },
    /// A malformed expression.
    #[error("Invalid expression: {message}")]
    InvalidExpression { message: String },
    /// Invalid operation.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: &'static str, got: &'static str) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Error::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates an invalid expression error.
    pub fn invalid_expression(message: impl Into<String>) -> Self {
        Error::InvalidExpression {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}
