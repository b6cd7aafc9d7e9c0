//! Error types for collections, sync and transactions.

use std::sync::Arc;

use ripple_core::{Key, Value};
use thiserror::Error;

use crate::lifecycle::CollectionStatus;
use crate::transaction::TransactionState;

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by a persistence handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Which mutation a handler was missing for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HandlerKind::Insert => "on_insert",
            HandlerKind::Update => "on_update",
            HandlerKind::Delete => "on_delete",
        })
    }
}

/// Errors raised by collections.
///
/// Cloneable so that one failure can be handed to every party waiting on a
/// transaction.
#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("sync write called without an open sync transaction")]
    NoPendingSyncTransactionWrite,

    #[error("sync write called on an already committed sync transaction")]
    SyncTransactionAlreadyCommittedWrite,

    #[error("sync commit called without an open sync transaction")]
    NoPendingSyncTransactionCommit,

    #[error("sync transaction already committed")]
    SyncTransactionAlreadyCommitted,

    #[error("collection `{collection}` already has a row with key {key}")]
    DuplicateKey { collection: String, key: Key },

    #[error("collection `{collection}` has no row with key {key}")]
    KeyNotFound { collection: String, key: Key },

    #[error("update of {key} in `{collection}` would change its key")]
    KeyUpdateNotAllowed { collection: String, key: Key },

    #[error("get_key returned no key for a row of `{collection}`")]
    UndefinedKey { collection: String },

    #[error("collection `{collection}` has no {kind} handler")]
    MissingHandler {
        collection: String,
        kind: HandlerKind,
    },

    #[error("invalid status transition for `{collection}`: {from} -> {to}")]
    InvalidStatusTransition {
        collection: String,
        from: CollectionStatus,
        to: CollectionStatus,
    },

    #[error("collection `{collection}` is {status} and rejects mutations")]
    CollectionInErrorState {
        collection: String,
        status: CollectionStatus,
    },

    #[error("transaction {id} is {state:?}, expected pending")]
    TransactionNotPending { id: u64, state: TransactionState },

    #[error("transaction {id} was rolled back")]
    RolledBack { id: u64 },

    #[error("expected an integer txid, got {0}")]
    ExpectedNumberTxId(Value),

    #[error("timed out waiting for txid {0}")]
    TimeoutWaitingForTxId(i64),

    #[error("timed out waiting for a matching sync message")]
    TimeoutWaitingForMatch,

    #[error("wait cancelled by collection cleanup")]
    Cancelled,

    #[error("persistence handler failed: {0}")]
    Handler(Arc<dyn std::error::Error + Send + Sync>),

    #[error("limit requires an order_by")]
    LimitWithoutOrderBy,

    #[error("load_subset failed: {0}")]
    LoadSubset(String),

    #[error(transparent)]
    Core(#[from] ripple_core::Error),
}

impl Error {
    pub fn duplicate_key(collection: &str, key: Key) -> Self {
        Error::DuplicateKey {
            collection: collection.into(),
            key,
        }
    }

    pub fn key_not_found(collection: &str, key: Key) -> Self {
        Error::KeyNotFound {
            collection: collection.into(),
            key,
        }
    }

    pub fn handler(err: HandlerError) -> Self {
        Error::Handler(Arc::from(err))
    }

    pub fn load_subset(message: impl Into<String>) -> Self {
        Error::LoadSubset(message.into())
    }

    /// Returns true for the confirmation-window timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::TimeoutWaitingForTxId(_) | Error::TimeoutWaitingForMatch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::duplicate_key("todos", Key::Int(1));
        assert_eq!(err.to_string(), "collection `todos` already has a row with key 1");

        let err = Error::MissingHandler {
            collection: "todos".into(),
            kind: HandlerKind::Update,
        };
        assert_eq!(err.to_string(), "collection `todos` has no on_update handler");
    }

    #[test]
    fn test_handler_error_is_cloneable() {
        let err = Error::handler("boom".into());
        let copy = err.clone();
        assert_eq!(copy.to_string(), "persistence handler failed: boom");
    }

    #[test]
    fn test_from_core_error() {
        let err: Error = ripple_core::Error::invalid_expression("bad").into();
        assert!(matches!(err, Error::Core(_)));
        assert!(Error::TimeoutWaitingForMatch.is_timeout());
        assert!(!Error::Cancelled.is_timeout());
    }
}
