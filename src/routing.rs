//! Application router configuration.

use axum::{
    Router,
    http::{StatusCode, Uri},
    middleware,
    routing::get,
};

use crate::{
    AppState, Error,
    endpoints::{self, without_trailing_slash},
    gateway::SearchBackend,
    logging::logging_middleware,
    transaction::{get_transactions, get_user_transactions},
};

/// Return a router with all the app's routes.
///
/// The transaction routes answer with and without their trailing slash.
pub fn build_router<B>(state: AppState<B>) -> Router
where
    B: SearchBackend,
{
    Router::new()
        .route(endpoints::ROOT, get(get_welcome))
        .route(endpoints::HEALTH, get(get_health))
        .route(
            endpoints::USER_TRANSACTIONS,
            get(get_user_transactions::<B>),
        )
        .route(
            without_trailing_slash(endpoints::USER_TRANSACTIONS),
            get(get_user_transactions::<B>),
        )
        .route(endpoints::TRANSACTIONS, get(get_transactions::<B>))
        .route(
            without_trailing_slash(endpoints::TRANSACTIONS),
            get(get_transactions::<B>),
        )
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

async fn get_welcome() -> &'static str {
    "Welcome to the transaction API!\n"
}

async fn get_health() -> StatusCode {
    StatusCode::OK
}

async fn get_404_not_found(uri: Uri) -> Error {
    Error::RouteNotFound(uri.path().to_owned())
}
