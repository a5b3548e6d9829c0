//! Runs validated transaction queries against the search backend.

use crate::{
    Error,
    gateway::{BoundedSearch, SearchBackend},
    pagination::{PaginationConfig, resolve_page_window},
};

use super::{
    models::{Transaction, TransactionsResponse},
    params::QueryIntent,
    predicate::build_predicate,
    scroll::count_all,
};

/// Answers transaction queries using a [SearchBackend].
///
/// The backend is optional so the server can start while the search engine
/// is down. Every query then fails with [Error::ServiceUnavailable].
#[derive(Debug, Clone)]
pub struct TransactionService<B> {
    backend: Option<B>,
    pagination: PaginationConfig,
}

impl<B: SearchBackend> TransactionService<B> {
    /// Create a service that queries `backend`, if there is one.
    pub fn new(backend: Option<B>, pagination: PaginationConfig) -> Self {
        Self {
            backend,
            pagination,
        }
    }

    fn backend(&self) -> Result<&B, Error> {
        self.backend.as_ref().ok_or(Error::ServiceUnavailable)
    }

    /// Get one page of a single user's transactions.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::ServiceUnavailable] if there is no backend or it cannot be reached,
    /// - [Error::InvalidArgument] if `intent` has no user ID or asks for too large a page,
    /// - [Error::BackendFailure] if the search fails.
    pub async fn get_by_user(&self, intent: &QueryIntent) -> Result<TransactionsResponse, Error> {
        let backend = self.backend()?;

        if intent.user_id.as_deref().is_none_or(str::is_empty) {
            return Err(Error::invalid_argument("invalid parameter 'user_id'"));
        }

        let request = BoundedSearch {
            predicate: build_predicate(intent),
            sort: intent.sort,
            window: resolve_page_window(intent.page_size, intent.page, self.pagination)?,
        };

        let result = backend
            .search(&request)
            .await
            .map_err(|error| Error::backend("search", error))?;

        Ok(TransactionsResponse {
            transactions: result.hits.into_iter().map(Transaction::from).collect(),
            total: result.total,
        })
    }

    /// Count every transaction in a date range, across all users.
    ///
    /// The matching transactions are scrolled through in batches of
    /// [PaginationConfig::default_page_size] but not returned, so the
    /// response always has an empty transaction list.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::ServiceUnavailable] if there is no backend or it cannot be reached,
    /// - [Error::InvalidArgument] if neither date bound is set,
    /// - [Error::BackendFailure] if a batch cannot be fetched.
    pub async fn get_by_date_range(
        &self,
        intent: &QueryIntent,
    ) -> Result<TransactionsResponse, Error> {
        let backend = self.backend()?;

        if intent.date_from.is_none() && intent.date_to.is_none() {
            return Err(Error::invalid_argument(
                "at least one of the date range boundaries must be set",
            ));
        }

        let intent = QueryIntent {
            user_id: None,
            ..intent.clone()
        };
        let predicate = build_predicate(&intent);

        let summary = count_all(backend, &predicate, self.pagination.default_page_size)
            .await
            .map_err(|error| Error::backend("scroll", error))?;

        tracing::debug!(
            "counted {} transactions in {} batches",
            summary.total,
            summary.batches
        );

        Ok(TransactionsResponse {
            transactions: Vec::new(),
            total: summary.total,
        })
    }
}
