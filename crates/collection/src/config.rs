//! Collection configuration.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use ripple_core::{Key, Value};
use serde::Deserialize;

use crate::sync::SyncConfig;
use crate::transaction::MutationFn;

/// Default idle time before an unsubscribed collection is cleaned up.
pub const DEFAULT_GC_TIME: Duration = Duration::from_millis(300_000);

static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Extracts the key of a row. `None` means the row has no usable key.
pub type GetKeyFn = Rc<dyn Fn(&Value) -> Option<Key>>;

/// Total order used by `to_array`.
pub type CompareFn = Rc<dyn Fn(&Value, &Value) -> Ordering>;

/// Whether simple filter subscriptions get a value index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoIndex {
    Off,
    #[default]
    Eager,
}

/// How sync `update` messages are applied to an existing row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowUpdateMode {
    /// Shallow-merge the message value into the existing row.
    #[default]
    Partial,
    /// Replace the row with the message value.
    Full,
}

/// Plain-data collection options.
///
/// ```rust
/// use ripple_collection::{AutoIndex, CollectionOptions};
///
/// let options: CollectionOptions =
///     serde_json::from_str(r#"{ "id": "todos", "gc_time_ms": 0, "auto_index": "off" }"#).unwrap();
/// assert_eq!(options.auto_index, AutoIndex::Off);
/// assert!(!options.start_sync);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionOptions {
    pub id: Option<String>,
    pub gc_time_ms: u64,
    pub start_sync: bool,
    pub auto_index: AutoIndex,
    pub row_update_mode: RowUpdateMode,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            id: None,
            gc_time_ms: DEFAULT_GC_TIME.as_millis() as u64,
            start_sync: false,
            auto_index: AutoIndex::Eager,
            row_update_mode: RowUpdateMode::Partial,
        }
    }
}

/// Everything a collection is built from.
#[derive(Clone)]
pub struct CollectionConfig {
    pub(crate) id: String,
    pub(crate) get_key: GetKeyFn,
    pub(crate) sync: SyncConfig,
    pub(crate) gc_time: Duration,
    pub(crate) start_sync: bool,
    pub(crate) auto_index: AutoIndex,
    pub(crate) compare: Option<CompareFn>,
    pub(crate) row_update_mode: RowUpdateMode,
    pub(crate) on_insert: Option<MutationFn>,
    pub(crate) on_update: Option<MutationFn>,
    pub(crate) on_delete: Option<MutationFn>,
}

impl CollectionConfig {
    /// Starts a config from the two required parts.
    pub fn builder<F>(get_key: F, sync: SyncConfig) -> CollectionConfigBuilder
    where
        F: Fn(&Value) -> Option<Key> + 'static,
    {
        CollectionConfigBuilder {
            config: CollectionConfig {
                id: String::new(),
                get_key: Rc::new(get_key),
                sync,
                gc_time: DEFAULT_GC_TIME,
                start_sync: false,
                auto_index: AutoIndex::Eager,
                compare: None,
                row_update_mode: RowUpdateMode::Partial,
                on_insert: None,
                on_update: None,
                on_delete: None,
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn gc_time(&self) -> Duration {
        self.gc_time
    }

    pub fn auto_index(&self) -> AutoIndex {
        self.auto_index
    }

    pub fn row_update_mode(&self) -> RowUpdateMode {
        self.row_update_mode
    }
}

impl fmt::Debug for CollectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionConfig")
            .field("id", &self.id)
            .field("gc_time", &self.gc_time)
            .field("start_sync", &self.start_sync)
            .field("auto_index", &self.auto_index)
            .field("row_update_mode", &self.row_update_mode)
            .field("has_compare", &self.compare.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`CollectionConfig`].
pub struct CollectionConfigBuilder {
    config: CollectionConfig,
}

impl CollectionConfigBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Zero disables garbage collection.
    pub fn gc_time(mut self, gc_time: Duration) -> Self {
        self.config.gc_time = gc_time;
        self
    }

    pub fn start_sync(mut self, start_sync: bool) -> Self {
        self.config.start_sync = start_sync;
        self
    }

    pub fn auto_index(mut self, auto_index: AutoIndex) -> Self {
        self.config.auto_index = auto_index;
        self
    }

    pub fn row_update_mode(mut self, mode: RowUpdateMode) -> Self {
        self.config.row_update_mode = mode;
        self
    }

    pub fn compare<F>(mut self, compare: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + 'static,
    {
        self.config.compare = Some(Rc::new(compare));
        self
    }

    pub fn on_insert(mut self, handler: MutationFn) -> Self {
        self.config.on_insert = Some(handler);
        self
    }

    pub fn on_update(mut self, handler: MutationFn) -> Self {
        self.config.on_update = Some(handler);
        self
    }

    pub fn on_delete(mut self, handler: MutationFn) -> Self {
        self.config.on_delete = Some(handler);
        self
    }

    /// Applies plain-data options on top of the builder.
    pub fn options(mut self, options: CollectionOptions) -> Self {
        if let Some(id) = options.id {
            self.config.id = id;
        }
        self.config.gc_time = Duration::from_millis(options.gc_time_ms);
        self.config.start_sync = options.start_sync;
        self.config.auto_index = options.auto_index;
        self.config.row_update_mode = options.row_update_mode;
        self
    }

    pub fn build(mut self) -> CollectionConfig {
        if self.config.id.is_empty() {
            let n = NEXT_COLLECTION_ID.fetch_add(1, AtomicOrdering::Relaxed);
            self.config.id = format!("collection-{}", n);
        }
        self.config
    }
}
