//! Response models for the transaction routes.

use serde::{Deserialize, Serialize};

use crate::gateway::Hit;

/// A financial transaction as returned to API clients.
///
/// Only the document ID is exposed for now, the rest of the stored document
/// is not part of the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the document in the search backend.
    pub id: String,
}

impl From<Hit> for Transaction {
    fn from(hit: Hit) -> Self {
        Self { id: hit.id }
    }
}

/// The body of a successful response from the transaction routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionsResponse {
    /// The transactions in the requested page, may be empty even when `total` is not.
    pub transactions: Vec<Transaction>,
    /// The number of transactions matching the query across all pages.
    pub total: i64,
}

/// The order to sort transactions by creation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Oldest first.
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}

impl SortDirection {
    /// The value used for this direction in query strings and backend queries.
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}
