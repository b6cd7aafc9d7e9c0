//! Ripple Collection - reactive keyed collections.
//!
//! A [`Collection`] reconciles rows delivered by a sync source with
//! optimistic mutations made by local [`Transaction`]s. Reads always see the
//! synced rows with every active transaction's changes layered on top, and
//! subscribers receive the difference each time that view changes.
//!
//! Sync sources write through a [`SyncHandle`] in `begin / write / commit`
//! batches. Persistence handlers run when a transaction commits and may ask
//! to wait until sync delivers their writes back, by txid or by predicate.
//!
//! Everything here is single-threaded. Transaction persistence and garbage
//! collection are spawned with `tokio::task::spawn_local`, so commits and
//! unsubscribes must happen inside a `tokio::task::LocalSet`.
//!
//! # Example
//!
//! ```rust
//! use ripple_collection::{
//!     mutation_fn, Collection, CollectionConfig, Confirmation, HandlerError, SyncConfig,
//!     SyncMessage, SyncResult,
//! };
//! use ripple_core::{Key, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async {
//!         let sync = SyncConfig::new(|params| {
//!             params.handle.begin();
//!             params
//!                 .handle
//!                 .write(SyncMessage::insert(Value::object([("id", Value::from(1))])))
//!                 .unwrap();
//!             params.handle.commit().unwrap();
//!             params.handle.mark_ready();
//!             SyncResult::default()
//!         });
//!         let get_key = |row: &Value| row.get("id").and_then(|id| Key::from_value(id).ok());
//!         let config = CollectionConfig::builder(get_key, sync)
//!             .id("todos")
//!             .on_insert(mutation_fn(|_| async { Ok::<_, HandlerError>(Confirmation::None) }))
//!             .build();
//!         let todos = Collection::new(config);
//!         todos.preload().await.unwrap();
//!
//!         let tx = todos.insert(Value::object([("id", Value::from(2))])).unwrap();
//!         assert_eq!(todos.size(), 2);
//!         tx.is_persisted().await.unwrap();
//!     })
//!     .await;
//! # }
//! ```

pub mod collection;
pub mod config;
pub mod confirm;
pub mod dedupe;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod mutation;
pub mod state;
pub mod sync;
pub mod transaction;

pub use collection::{Collection, CollectionSubscription, CurrentStateOptions};
pub use config::{
    AutoIndex, CollectionConfig, CollectionConfigBuilder, CollectionOptions, CompareFn, GetKeyFn,
    RowUpdateMode, DEFAULT_GC_TIME,
};
pub use confirm::{MatchFn, DEFAULT_MATCH_TIMEOUT, DEFAULT_TXID_TIMEOUT};
pub use dedupe::{DeduplicatedLoadSubset, LoadSubsetFn, LoadSubsetResult, OnDeduplicate};
pub use error::{Error, HandlerError, HandlerKind, Result};
pub use lifecycle::CollectionStatus;
pub use mutation::PendingMutation;
pub use sync::{SyncConfig, SyncHandle, SyncMessage, SyncParams, SyncResult};
pub use transaction::{
    mutation_fn, Confirmation, MutationFn, MutationParams, Transaction, TransactionConfig,
    TransactionId, TransactionState,
};
