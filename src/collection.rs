//! Binding of parsed queries to a [`DataStore`].
//!
//! Every operation here is deliberately one delegation deep: the predicate
//! work happens in [`ParsedQuery`] and [`StatsRequest`], the I/O in the
//! store. The collection only contributes its options.

use crate::errors::CollectionError;
use crate::query::{ParsedQuery, Projection};
use crate::stats::StatsRequest;
use crate::store::{DataStore, FindSpec, UpdateAck};

pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// Execution-time hint handed to the store with every read, in
    /// milliseconds.
    pub query_timeout_ms: u64,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self { query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS }
    }
}

pub struct Collection<S> {
    store: S,
    options: CollectionOptions,
}

impl<S: DataStore> Collection<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, CollectionOptions::default())
    }

    pub fn with_options(store: S, options: CollectionOptions) -> Self {
        Self { store, options }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    /// Counts the documents matched by the merged predicate.
    pub fn count(&self, query: &ParsedQuery) -> Result<u64, CollectionError<S::Error>> {
        self.store.count(query.query.as_ref()).map_err(CollectionError::Store)
    }

    /// The read spec a [`ParsedQuery`] turns into: limit always applies,
    /// skip defaults to 0 at parse time, projection and sort only when the
    /// request carried them, plus this collection's timeout hint.
    #[must_use]
    pub fn find_spec(&self, query: &ParsedQuery) -> FindSpec {
        FindSpec {
            filter: query.query.clone(),
            projection: query.select.as_ref().map(Projection::to_document),
            sort: query.sort.clone(),
            limit: query.limit,
            skip: query.skip,
            timeout_ms: Some(self.options.query_timeout_ms),
        }
    }

    /// Opens a cursor over the documents matched by `query`.
    pub fn find(&self, query: &ParsedQuery) -> Result<S::Cursor, CollectionError<S::Error>> {
        self.store.find(&self.find_spec(query)).map_err(CollectionError::Store)
    }

    /// Validates `request`, expands its bucketed counter paths and applies
    /// them to the first document matching the request's predicate.
    pub fn update_stats(
        &self,
        request: &StatsRequest,
    ) -> Result<UpdateAck, CollectionError<S::Error>> {
        let plan = request.build_plan()?;
        self.store
            .update_one(&plan.query, &plan.update_document())
            .map_err(CollectionError::Store)
    }
}
