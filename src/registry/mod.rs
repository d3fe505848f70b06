//! The dispatch table: sorted collections of data, middleware and
//! error-handler entries.
//!
//! # Data Flow
//! ```text
//! Indexer (startup)
//!     → insert_* (collections re-sorted by specificity on every insert)
//!     → Freeze as Arc<Registry>
//!
//! Dispatcher (per request)
//!     → middleware_for / data_for / error_handler_for
//! ```
//!
//! # Design Decisions
//! - An explicit value built by the indexer, passed by reference — no
//!   process-wide collections; hot reload swaps a fresh registry in
//! - Immutable after construction, read concurrently by all requests
//! - Terminal middleware always sorts after pass-through middleware, so
//!   observers run before whichever handler wins the URL

pub mod entry;

use std::sync::Arc;

pub use entry::{
    BoxedHandler, ComponentFn, DataEntry, ErrorHandlerEntry, HandlerFuture, MethodFilter,
    MiddlewareEntry, Payload, RenderFn, RenderFuture, RenderSource, StateMap,
};

use crate::pattern::specificity::compare;
use crate::pattern::Params;

/// Sorted registry of every entry discovered in the routes tree.
#[derive(Default)]
pub struct Registry {
    data: Vec<DataEntry>,
    middleware: Vec<Arc<MiddlewareEntry>>,
    error_handlers: Vec<Arc<ErrorHandlerEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a data entry, keeping the collection sorted outer scope
    /// first. A bag with no values is a no-op.
    pub fn insert_data(&mut self, entry: DataEntry) {
        if entry.values.is_empty() {
            return;
        }
        self.data.push(entry);
        self.data.sort_by(|a, b| compare(&a.pattern, &b.pattern));
    }

    /// Insert a middleware entry. Pass-through middleware sorts before all
    /// terminal handlers; within each group, outer scope first.
    pub fn insert_middleware(&mut self, entry: MiddlewareEntry) {
        self.middleware.push(Arc::new(entry));
        self.middleware.sort_by(|a, b| {
            a.initialises_response
                .cmp(&b.initialises_response)
                .then_with(|| compare(&a.pattern, &b.pattern))
        });
    }

    /// Insert an error handler. The innermost handler takes priority, so
    /// the collection is kept in reverse specificity order.
    pub fn insert_error_handler(&mut self, entry: ErrorHandlerEntry) {
        self.error_handlers.push(Arc::new(entry));
        self.error_handlers
            .sort_by(|a, b| compare(&a.pattern, &b.pattern));
        self.error_handlers.reverse();
    }

    /// Every middleware entry whose pattern matches the URL path, in chain
    /// execution order, each with its own captured params.
    pub fn middleware_for(&self, path: &str) -> Vec<(Arc<MiddlewareEntry>, Params)> {
        self.middleware
            .iter()
            .filter_map(|mw| mw.pattern.matches(path).map(|params| (Arc::clone(mw), params)))
            .collect()
    }

    /// Every data entry whose pattern matches the URL path, outer scope
    /// first (so inner values win on key collision when merged in order).
    pub fn data_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a DataEntry> {
        self.data.iter().filter(move |d| d.pattern.matches(path).is_some())
    }

    /// The innermost error handler registered for the given status whose
    /// pattern matches the URL path.
    pub fn error_handler_for(&self, status: u16, path: &str) -> Option<Arc<ErrorHandlerEntry>> {
        self.error_handlers
            .iter()
            .find(|h| h.status == status && h.pattern.matches(path).is_some())
            .map(Arc::clone)
    }

    /// Pattern strings of every middleware entry in sorted order. Used to
    /// verify indexing determinism.
    pub fn middleware_order(&self) -> Vec<String> {
        self.middleware.iter().map(|m| m.pattern.to_string()).collect()
    }

    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub fn middleware_len(&self) -> usize {
        self.middleware.len()
    }
}
