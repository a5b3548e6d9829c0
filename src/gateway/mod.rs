//! The search backend that transaction documents are queried from.
//!
//! [SearchBackend] is the seam between query translation and the search
//! engine. [ElasticBackend] talks to Elasticsearch over HTTP and
//! [InMemoryBackend] evaluates queries against documents held in memory.

mod elastic;
mod in_memory;

pub use elastic::{ElasticBackend, ElasticCursor};
pub use in_memory::{InMemoryBackend, InMemoryCursor};

use std::future::Future;

use serde_json::Value;

use crate::{
    pagination::PageWindow,
    transaction::{SearchPredicate, SortDirection},
};

/// A document returned by the search backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// The ID the backend stores the document under.
    pub id: String,
    /// The stored document.
    pub source: Value,
}

impl Hit {
    /// Create a hit for the document `source` stored under `id`.
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

/// One page or batch of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    /// The documents in this page or batch.
    pub hits: Vec<Hit>,
    /// The number of documents matching the query across all pages.
    ///
    /// This is the overall total, not the size of this batch.
    pub total: i64,
}

/// A request for a single sorted page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedSearch {
    /// The filter documents must satisfy.
    pub predicate: SearchPredicate,
    /// The order of results by creation date.
    pub sort: SortDirection,
    /// Which slice of the sorted results to return.
    pub window: PageWindow,
}

/// The errors a [SearchBackend] may report.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum GatewayError {
    /// The backend could not be contacted.
    #[error("search backend is not reachable: {0}")]
    Unreachable(String),

    /// The backend did not answer in time.
    #[error("request to the search backend timed out")]
    Timeout,

    /// The backend answered with an error status.
    #[error("search backend responded with status {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, usually a JSON error description.
        body: String,
    },

    /// The backend's response could not be understood.
    #[error("could not decode search backend response: {0}")]
    Decode(String),

    /// The query could not be expressed in the backend's query language.
    #[error("could not translate query: {0}")]
    InvalidQuery(String),

    /// The request failed for a reason other than reaching the backend.
    #[error("request to the search backend failed: {0}")]
    Request(String),
}

impl GatewayError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unreachable(_) | GatewayError::Timeout)
    }
}

/// Executes translated queries against a search engine.
///
/// Cursors are single use: open one per logical query, call
/// [SearchBackend::next_batch] until it returns `None`, then hand it back via
/// [SearchBackend::release_cursor]. Cursors must not be shared between
/// requests.
pub trait SearchBackend: Clone + Send + Sync + 'static {
    /// Backend-held iteration state for [SearchBackend::next_batch].
    type Cursor: Send;

    /// Fetch one sorted page of documents matching `request.predicate`.
    fn search(
        &self,
        request: &BoundedSearch,
    ) -> impl Future<Output = Result<SearchResult, GatewayError>> + Send;

    /// Prepare a cursor over every document matching `predicate`, fetched
    /// `batch_size` documents at a time.
    ///
    /// No request is made until the first call to [SearchBackend::next_batch].
    fn open_cursor(&self, predicate: &SearchPredicate, batch_size: u64) -> Self::Cursor;

    /// Fetch the next batch for `cursor`.
    ///
    /// Returns `Ok(None)` once every matching document has been returned.
    fn next_batch(
        &self,
        cursor: &mut Self::Cursor,
    ) -> impl Future<Output = Result<Option<SearchResult>, GatewayError>> + Send;

    /// Free any backend resources held by `cursor`.
    fn release_cursor(
        &self,
        cursor: Self::Cursor,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
