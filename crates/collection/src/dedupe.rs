//! Deduplication of on-demand subset loads.
//!
//! [`DeduplicatedLoadSubset`] sits in front of a loader and remembers what
//! has been requested: an unlimited where clause covering every unlimited
//! request so far, the limited windows requested, and the calls still in
//! flight. Requests already covered skip the loader, requests overlapping
//! an in-flight call share its future, and unlimited requests only fetch
//! the part not already loaded.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use ripple_query::ir::{BasicExpression, LoadSubsetOptions};
use ripple_query::predicate::{
    is_predicate_subset, is_where_subset, minus_where_predicates, union_where_predicates,
};

use crate::error::Result;

/// Outcome of a load request.
pub enum LoadSubsetResult {
    /// Nothing left to wait for.
    Ready,
    /// The load completes when the future does.
    Pending(LocalBoxFuture<'static, Result<()>>),
}

impl LoadSubsetResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadSubsetResult::Ready)
    }

    /// Waits for the load to finish.
    pub async fn wait(self) -> Result<()> {
        match self {
            LoadSubsetResult::Ready => Ok(()),
            LoadSubsetResult::Pending(fut) => fut.await,
        }
    }
}

impl fmt::Debug for LoadSubsetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadSubsetResult::Ready => f.write_str("Ready"),
            LoadSubsetResult::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A subset loader supplied by a sync source.
pub type LoadSubsetFn = Rc<dyn Fn(&LoadSubsetOptions) -> LoadSubsetResult>;

/// Called with a request that was satisfied without calling the loader.
pub type OnDeduplicate = Rc<dyn Fn(&LoadSubsetOptions)>;

type SharedLoad = Shared<LocalBoxFuture<'static, Result<()>>>;

struct InflightCall {
    id: u64,
    options: LoadSubsetOptions,
    future: SharedLoad,
}

#[derive(Default)]
struct DedupeState {
    unlimited_where: Option<BasicExpression>,
    has_loaded_all_data: bool,
    limited_calls: Vec<LoadSubsetOptions>,
    inflight: Vec<InflightCall>,
    generation: u64,
    next_call_id: u64,
}

impl DedupeState {
    fn covers(&self, options: &LoadSubsetOptions) -> bool {
        if self.has_loaded_all_data {
            return true;
        }
        if let (Some(where_), Some(loaded)) = (&options.where_, &self.unlimited_where) {
            if is_where_subset(Some(where_), Some(loaded)) {
                return true;
            }
        }
        options.limit.is_some()
            && self
                .limited_calls
                .iter()
                .any(|call| is_predicate_subset(options, call))
    }

    fn record(&mut self, options: &LoadSubsetOptions) {
        if options.limit.is_some() {
            self.limited_calls.push(options.clone());
            return;
        }
        match &options.where_ {
            None => {
                self.has_loaded_all_data = true;
                self.unlimited_where = None;
                self.limited_calls.clear();
                self.inflight.clear();
            }
            Some(where_) => {
                self.unlimited_where = Some(match self.unlimited_where.take() {
                    Some(loaded) => union_where_predicates(&[loaded, where_.clone()]),
                    None => where_.clone(),
                });
            }
        }
    }
}

/// Deduplicating wrapper around a [`LoadSubsetFn`].
pub struct DeduplicatedLoadSubset {
    load: LoadSubsetFn,
    on_deduplicate: Option<OnDeduplicate>,
    state: Rc<RefCell<DedupeState>>,
}

impl DeduplicatedLoadSubset {
    pub fn new(load: LoadSubsetFn) -> Self {
        Self {
            load,
            on_deduplicate: None,
            state: Rc::new(RefCell::new(DedupeState::default())),
        }
    }

    pub fn with_on_deduplicate(mut self, callback: OnDeduplicate) -> Self {
        self.on_deduplicate = Some(callback);
        self
    }

    /// Loads `options` unless it is already covered.
    ///
    /// A pending result only makes progress while it is polled.
    pub fn load_subset(&self, options: &LoadSubsetOptions) -> LoadSubsetResult {
        if self.state.borrow().covers(options) {
            tracing::trace!("load_subset covered by earlier loads");
            if let Some(callback) = &self.on_deduplicate {
                callback(options);
            }
            return LoadSubsetResult::Ready;
        }

        let shared = self
            .state
            .borrow()
            .inflight
            .iter()
            .find(|call| is_predicate_subset(options, &call.options))
            .map(|call| call.future.clone());
        if let Some(shared) = shared {
            tracing::trace!("load_subset joined an in-flight load");
            let callback = self.on_deduplicate.clone();
            let request = options.clone();
            return LoadSubsetResult::Pending(
                async move {
                    shared.await?;
                    if let Some(callback) = callback {
                        callback(&request);
                    }
                    Ok(())
                }
                .boxed_local(),
            );
        }

        let request = self.narrow(options);
        match (self.load)(&request) {
            LoadSubsetResult::Ready => {
                self.state.borrow_mut().record(options);
                LoadSubsetResult::Ready
            }
            LoadSubsetResult::Pending(fut) => {
                LoadSubsetResult::Pending(self.track_inflight(options.clone(), fut).boxed_local())
            }
        }
    }

    // Unlimited requests only fetch rows outside what unlimited loads
    // already brought in. A request without a filter becomes `not(loaded)`.
    fn narrow(&self, options: &LoadSubsetOptions) -> LoadSubsetOptions {
        let state = self.state.borrow();
        match (&state.unlimited_where, options.limit) {
            (Some(loaded), None) => {
                match minus_where_predicates(options.where_.as_ref(), Some(loaded)) {
                    Some(rest) => LoadSubsetOptions {
                        where_: Some(rest),
                        ..options.clone()
                    },
                    None => options.clone(),
                }
            }
            _ => options.clone(),
        }
    }

    fn track_inflight(
        &self,
        options: LoadSubsetOptions,
        fut: LocalBoxFuture<'static, Result<()>>,
    ) -> SharedLoad {
        let state = Rc::clone(&self.state);
        let (id, generation) = {
            let mut s = self.state.borrow_mut();
            s.next_call_id += 1;
            (s.next_call_id, s.generation)
        };
        let tracked = options.clone();
        let shared = async move {
            let result = fut.await;
            let mut s = state.borrow_mut();
            if result.is_ok() && s.generation == generation {
                s.record(&tracked);
            }
            s.inflight.retain(|call| call.id != id);
            result
        }
        .boxed_local()
        .shared();

        self.state.borrow_mut().inflight.push(InflightCall {
            id,
            options,
            future: shared.clone(),
        });
        shared
    }

    /// Forgets everything loaded so far. Loads still in flight finish but
    /// no longer update the tracking.
    pub fn reset(&self) {
        let mut s = self.state.borrow_mut();
        s.unlimited_where = None;
        s.has_loaded_all_data = false;
        s.limited_calls.clear();
        s.inflight.clear();
        s.generation += 1;
    }

    pub fn has_loaded_all_data(&self) -> bool {
        self.state.borrow().has_loaded_all_data
    }

    pub fn unlimited_where(&self) -> Option<BasicExpression> {
        self.state.borrow().unlimited_where.clone()
    }
}
