//! HTTP handlers for the transaction routes.

use axum::{
    Json,
    extract::{FromRef, Path, RawQuery, State},
};

use crate::{AppState, Error, gateway::SearchBackend};

use super::{
    models::TransactionsResponse,
    params::{RawParams, TransactionTypes, validate_range_scoped, validate_user_scoped},
    service::TransactionService,
};

/// The state needed to answer transaction queries.
#[derive(Debug, Clone)]
pub struct TransactionQueryState<B> {
    /// Runs the validated queries.
    pub service: TransactionService<B>,
    /// The type tags clients may filter by.
    pub transaction_types: TransactionTypes,
}

impl<B> FromRef<AppState<B>> for TransactionQueryState<B>
where
    B: SearchBackend,
{
    fn from_ref(state: &AppState<B>) -> Self {
        Self {
            service: state.transaction_service.clone(),
            transaction_types: state.transaction_types.clone(),
        }
    }
}

/// A route handler for getting a page of a single user's transactions.
///
/// Accepts the query parameters `type` (repeatable), `sort`, `page`,
/// `page_size`, `date_from`, `date_to` and `open`.
///
/// # Errors
/// Responds with a JSON error if a parameter is invalid or the search fails.
pub async fn get_user_transactions<B: SearchBackend>(
    State(state): State<TransactionQueryState<B>>,
    user_id: Option<Path<String>>,
    RawQuery(query): RawQuery,
) -> Result<Json<TransactionsResponse>, Error> {
    let params = RawParams::from_query(query.as_deref())?;
    let user_id = user_id.map(|Path(user_id)| user_id);
    let intent = validate_user_scoped(user_id.as_deref(), &params, &state.transaction_types)?;

    tracing::debug!("querying transactions for user {:?}", intent.user_id);

    state.service.get_by_user(&intent).await.map(Json)
}

/// A route handler for counting every transaction in a date range.
///
/// Accepts the query parameters `type` (repeatable), `date_from` and
/// `date_to`. At least one of the date bounds must be given.
///
/// # Errors
/// Responds with a JSON error if a parameter is invalid or the scroll fails.
pub async fn get_transactions<B: SearchBackend>(
    State(state): State<TransactionQueryState<B>>,
    RawQuery(query): RawQuery,
) -> Result<Json<TransactionsResponse>, Error> {
    let params = RawParams::from_query(query.as_deref())?;
    let intent = validate_range_scoped(&params, &state.transaction_types)?;

    tracing::debug!(
        "counting transactions from {:?} to {:?}",
        intent.date_from,
        intent.date_to
    );

    state.service.get_by_date_range(&intent).await.map(Json)
}
