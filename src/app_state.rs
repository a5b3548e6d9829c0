//! Implements a struct that holds the state of the REST server.

use crate::{
    gateway::SearchBackend,
    pagination::PaginationConfig,
    transaction::{TransactionService, TransactionTypes},
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState<B> {
    /// Runs transaction queries against the search backend.
    pub transaction_service: TransactionService<B>,

    /// The type tags clients may filter transactions by.
    pub transaction_types: TransactionTypes,
}

impl<B> AppState<B>
where
    B: SearchBackend,
{
    /// Create a new [AppState].
    ///
    /// Pass `None` for `backend` if the search backend could not be reached
    /// at startup. Every query will then fail with a 503 response.
    pub fn new(
        backend: Option<B>,
        pagination_config: PaginationConfig,
        transaction_types: TransactionTypes,
    ) -> Self {
        Self {
            transaction_service: TransactionService::new(backend, pagination_config),
            transaction_types,
        }
    }
}
